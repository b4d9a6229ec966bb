use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use crossbeam_channel::{select, Receiver};
use futures::channel::oneshot;
use parking_lot::Mutex;
use slog::{debug, trace};

use super::request::Request;
use super::response::{strip_chroot_from, Response};
use super::tree::{parent_path, Tree};
use super::watch::Watch;
use super::RequestInfo;
use crate::{KeeperState, WatchedEvent, WatchedEventType};

/// The single mutator: owns the store, both watch registries, and the zxid counter.
///
/// Nothing else ever touches these; clients only reach the processor through the request queue,
/// which is what makes the ordering of operations and callbacks total without any further locking.
pub(super) struct Processor {
    requests: Receiver<RequestInfo>,
    shutdown: Receiver<()>,
    expired: Arc<Mutex<bool>>,
    chroot: String,
    tree: Tree,
    data_watches: HashMap<String, Vec<oneshot::Sender<WatchedEvent>>>,
    child_watches: HashMap<String, Vec<oneshot::Sender<WatchedEvent>>>,
    zxid: i64,
    logger: slog::Logger,
}

impl Processor {
    pub(super) fn new(
        requests: Receiver<RequestInfo>,
        shutdown: Receiver<()>,
        expired: Arc<Mutex<bool>>,
        chroot: String,
        logger: slog::Logger,
    ) -> Self {
        Processor {
            requests,
            shutdown,
            expired,
            chroot,
            tree: Tree::new(),
            data_watches: HashMap::new(),
            child_watches: HashMap::new(),
            zxid: 0,
            logger,
        }
    }

    /// Drain the queue until the session expires or every handle is gone, then notify the
    /// remaining data watches that the session is over.
    pub(super) fn run(mut self) {
        let requests = self.requests.clone();
        let shutdown = self.shutdown.clone();
        loop {
            let info = select! {
                recv(requests) -> envelope => match envelope {
                    Ok(info) => info,
                    // Every handle has been dropped.
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            };
            if *self.expired.lock() {
                break;
            }
            self.handle(info);
        }
        self.expire();
    }

    fn handle(&mut self, mut info: RequestInfo) {
        info.request.prepend_chroot(&self.chroot);

        // Watches go into the registry before the request is evaluated, and regardless of whether
        // it will succeed; an exists watch on a missing node is the canonical use.
        match info.request {
            Request::Exists {
                ref path,
                ref mut watch,
            }
            | Request::GetData {
                ref path,
                ref mut watch,
            } => {
                if let Watch::Custom(_) = *watch {
                    if let Watch::Custom(tx) = mem::replace(watch, Watch::None) {
                        self.data_watches.entry(path.clone()).or_default().push(tx);
                    }
                }
            }
            Request::GetChildren {
                ref path,
                ref mut watch,
            } => {
                if let Watch::Custom(_) = *watch {
                    if let Watch::Custom(tx) = mem::replace(watch, Watch::None) {
                        self.child_watches.entry(path.clone()).or_default().push(tx);
                    }
                }
            }
            _ => {}
        }

        self.zxid += 1;
        trace!(self.logger, "processing request {:?}", info.request;
               "zxid" => self.zxid, "queued_for" => ?info.submitted.elapsed());

        let mut result = self.tree.process(&info.request, self.zxid);
        if committed(&result) {
            self.fire_watches(&info.request);
        }
        if let Ok(ref mut response) = result {
            response.strip_chroot(&self.chroot);
        }

        // A client that dropped its handle before the response arrived is not an error.
        let _ = info.completion.send(result);
    }

    /// Deliver and remove the one-shot watches touched by a committed mutation: node watches on
    /// the written path, child watches on its parent. A committed `multi` notifies for each of its
    /// sub-requests, in sub-request order.
    ///
    /// Sequential creates notify under the path the client *asked for*, not the suffixed path that
    /// was created, matching the service this emulates.
    fn fire_watches(&mut self, request: &Request) {
        match *request {
            Request::Create { ref path, .. }
            | Request::Delete { ref path, .. }
            | Request::SetData { ref path, .. } => self.notify(path),
            Request::Multi(ref requests) => {
                for request in requests {
                    self.fire_watches(request);
                }
            }
            _ => {}
        }
    }

    fn notify(&mut self, path: &str) {
        if let Some(watchers) = self.data_watches.remove(path) {
            trace!(self.logger, "notifying node watches"; "path" => path, "n" => watchers.len());
            for watcher in watchers {
                let _ = watcher.send(self.event(path));
            }
        }

        let parent = parent_path(path);
        if let Some(watchers) = self.child_watches.remove(parent) {
            trace!(self.logger, "notifying child watches"; "path" => parent, "n" => watchers.len());
            for watcher in watchers {
                let _ = watcher.send(self.event(parent));
            }
        }
    }

    fn event(&self, path: &str) -> WatchedEvent {
        let mut path = path.to_string();
        strip_chroot_from(&mut path, &self.chroot);
        WatchedEvent {
            event_type: WatchedEventType::None,
            keeper_state: KeeperState::SyncConnected,
            path,
        }
    }

    /// Session teardown: every registered node watch learns that the session expired. Child
    /// watches are only dropped, never notified; the service this emulates has the same asymmetry.
    fn expire(&mut self) {
        debug!(self.logger, "session over; expiring node watches";
               "paths" => self.data_watches.len());
        for (_, watchers) in self.data_watches.drain() {
            for watcher in watchers {
                let _ = watcher.send(WatchedEvent::session_expired());
            }
        }
        self.child_watches.clear();
    }
}

/// Did this request commit a change to the store? A `multi` whose result list contains a failure
/// rolled back and must not fire anything.
fn committed(result: &Result<Response, super::ZkError>) -> bool {
    match *result {
        Ok(Response::Multi(ref responses)) => responses.iter().all(|r| r.is_ok()),
        Ok(_) => true,
        Err(_) => false,
    }
}
