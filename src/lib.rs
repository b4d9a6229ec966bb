//! This crate provides a deterministic, in-process stand-in for [Apache
//! ZooKeeper](https://zookeeper.apache.org/): the same hierarchical store, the same client
//! operations and error taxonomy, the same one-shot watch semantics, and the same atomic `multi`
//! batches -- but backed by a single in-memory tree instead of a replicated ensemble. It is meant
//! for tests and embedded scenarios where spinning up a real cluster is impractical and where
//! deterministic, totally ordered behavior is worth more than durability.
//!
//! # The data model
//!
//! Keys look like paths (e.g. `/key/subkey`), and every item along a path is called a *znode*.
//! Each znode carries a blob of data, a set of counters summarized in its [`Stat`] (creation and
//! modification transaction ids and times, a data version, a child version, a child count), and
//! two informational flags: *ephemeral* nodes may not have children, and *sequential* nodes get a
//! zero-padded monotonic counter appended to their name at creation time.
//!
//! Every mutation is stamped with a session-wide, strictly increasing transaction id (*zxid*). An
//! atomic `multi` batch consumes exactly one zxid for all of its operations.
//!
//! # Operations
//!
//! The API consists of the operations you would expect from a file-system-like store:
//! [`create`](MemKeeper::create), [`delete`](MemKeeper::delete), [`exists`](MemKeeper::exists),
//! [`get_data`](MemKeeper::get_data) and [`set_data`](MemKeeper::set_data),
//! [`get_children`](MemKeeper::get_children), [`check`](MemKeeper::check), and atomic batches via
//! [`multi`](MemKeeper::multi). The version-guarded operations accept an expected version and fail
//! with a bad-version error when it does not match; passing `None` disables the guard.
//!
//! ACL arguments are accepted wherever the real client takes them, and ignored: every session is
//! almighty.
//!
//! # Watches
//!
//! The read operations can leave a one-time *watch* through [`with_watcher`](MemKeeper::with_watcher).
//! A watch registered by `exists` or `get_data` triggers on the next successful create, delete, or
//! data write of the watched path; a watch registered by `get_children` triggers on the next
//! successful create or delete of a direct child. Watches are registered before the reading
//! request is evaluated and stay registered even if it fails, so watching a node that does not
//! exist yet is fine. When the session ends, every pending node watch receives a final event with
//! [`KeeperState::Expired`].
//!
//! # This implementation
//!
//! All requests funnel through a bounded queue into one dedicated processor thread that owns the
//! store. That single-threading is the correctness device: requests are applied and answered in
//! submission order, every response reflects all earlier operations, and no two completions ever
//! run concurrently. There is no networking, no persistence, and no replication; the store lives
//! and dies with the session.
//!
//! # A quick tour
//!
//! ```
//! use memkeeper::{Acl, CreateMode, MemKeeper};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let zk = MemKeeper::new().unwrap();
//!
//! // the store starts out with nothing but the root
//! let (zk, stat) = zk.exists("/example").await.unwrap();
//! assert_eq!(stat, None);
//!
//! // creating a node hands back the path that was actually created
//! let (zk, path) = zk
//!     .create(
//!         "/example",
//!         &b"Hello world"[..],
//!         Acl::open_unsafe(),
//!         CreateMode::Persistent,
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(path.as_deref(), Ok("/example"));
//!
//! let (zk, res) = zk.get_data("/example").await.unwrap();
//! let (data, stat) = res.unwrap();
//! assert_eq!(data, b"Hello world");
//! assert_eq!(stat.data_length as usize, data.len());
//! # let _ = zk;
//! # }
//! ```

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]

use failure::{bail, format_err};
use futures::channel::oneshot;
use slog::{debug, o, trace};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Per-operation error types.
pub mod error;
mod session;
mod transform;
mod types;

use crate::session::{Session, Watch};
pub use crate::types::{
    Acl, CreateMode, KeeperState, MultiResponse, Permission, Stat, WatchedEvent, WatchedEventType,
};

/// An in-memory coordination session.
///
/// All interactions go through the methods of a `MemKeeper` instance. All clones of the same
/// instance share the same underlying store and session; cloning a handle is how several tasks or
/// threads talk to one session concurrently. Operations are applied in submission order on a
/// single internal processor thread, so two requests submitted one after the other from the same
/// task always observe that ordering.
///
/// The session ends when [`close`](MemKeeper::close) is called or the last handle is dropped. At
/// that point every queued request is answered with a session-expired error and every registered
/// node watch receives a final session event; nothing is silently forgotten.
#[derive(Debug, Clone)]
pub struct MemKeeper {
    session: Arc<Session>,
    logger: slog::Logger,
}

/// Builder that allows customizing options for in-memory sessions.
#[derive(Debug, Clone)]
pub struct MemKeeperBuilder {
    chroot: String,
    operation_timeout: Duration,
    queue_capacity: usize,
    logger: slog::Logger,
}

impl Default for MemKeeperBuilder {
    fn default() -> Self {
        let drain = slog::Discard;
        let root = slog::Logger::root(drain, o!());

        MemKeeperBuilder {
            chroot: String::new(),
            operation_timeout: Duration::from_secs(10),
            queue_capacity: 1024,
            logger: root,
        }
    }
}

impl MemKeeperBuilder {
    /// Start the session with the configured options.
    ///
    /// This seeds the store with the root node `/` and spawns the processor thread. The session is
    /// usable immediately; there is no connection handshake.
    pub fn build(self) -> Result<MemKeeper, failure::Error> {
        let chroot = self.chroot.trim_end_matches('/').to_string();
        if !chroot.is_empty() && !chroot.starts_with('/') {
            bail!("chroot must be an absolute path, got {:?}", self.chroot);
        }
        debug!(self.logger, "starting in-memory session";
               "chroot" => chroot.as_str(), "timeout" => ?self.operation_timeout);

        let session = Session::spawn(
            chroot,
            self.operation_timeout,
            self.queue_capacity,
            self.logger.clone(),
        )?;
        Ok(MemKeeper {
            session: Arc::new(session),
            logger: self.logger,
        })
    }

    /// Rewrite all paths of this session to live under the given prefix.
    ///
    /// Incoming paths have the prefix prepended before they touch the store, and outgoing paths
    /// (in responses and watch events) have it stripped again, so the session behaves as if the
    /// prefix were its root. A trailing slash is trimmed. Note that the store does not start out
    /// with the prefix node; it can be created through the session itself by creating `/`.
    pub fn set_chroot(&mut self, chroot: &str) {
        self.chroot = chroot.to_string();
    }

    /// Set how long a submission may wait for space in the request queue.
    ///
    /// A submission that cannot be queued within this window fails and, like a real client that
    /// overran its operation timeout, takes the session down with it. The default is 10 seconds.
    pub fn set_operation_timeout(&mut self, t: Duration) {
        self.operation_timeout = t;
    }

    /// Set the capacity of the request queue. The default is 1024.
    pub fn set_queue_capacity(&mut self, capacity: usize) {
        self.queue_capacity = capacity;
    }

    /// Set the logger that should be used internally by the session.
    ///
    /// By default, all logging is disabled. See also [the `slog`
    /// documentation](https://docs.rs/slog).
    pub fn set_logger(&mut self, l: slog::Logger) {
        self.logger = l;
    }
}

impl MemKeeper {
    /// Start a session with default options.
    ///
    /// See [`MemKeeperBuilder::build`].
    pub fn new() -> Result<MemKeeper, failure::Error> {
        MemKeeperBuilder::default().build()
    }

    /// End the session.
    ///
    /// Every request still in the queue is answered with a session-expired error, and every
    /// registered node watch receives a final event with [`KeeperState::Expired`]. Closing twice
    /// is a no-op, as is closing a session that other clones are still holding; once closed, all
    /// clones observe the session as expired and further submissions fail.
    pub fn close(&self) {
        debug!(self.logger, "closing session");
        self.session.finalize();
    }

    /// Create a node with the given `path` with `data` as its contents.
    ///
    /// The `mode` argument specifies additional options for the newly created node; see
    /// [`CreateMode`]. For the sequential modes, the actual path name of the created node will be
    /// the given `path` plus a suffix `i`, where `i` is the parent's current sequential counter:
    /// always ten digits, 0 padded. The newly created node's full name is returned.
    ///
    /// If a node with the same actual path already exists, the result is
    /// [`error::Create::NodeExists`]. If the parent node does not exist, the result is
    /// [`error::Create::NoNode`]; if the parent node is ephemeral, the result is
    /// [`error::Create::NoChildrenForEphemerals`].
    ///
    /// If a node is created successfully, node watches left on the `path` by `exists` and
    /// `get_data` calls, and child watches left on the parent by `get_children` calls, are
    /// triggered.
    ///
    /// The `acl` argument is accepted for API compatibility and ignored.
    pub async fn create<D, A>(
        self,
        path: &str,
        data: D,
        acl: A,
        mode: CreateMode,
    ) -> Result<(Self, Result<String, error::Create>), failure::Error>
    where
        D: Into<Cow<'static, [u8]>>,
        A: Into<Cow<'static, [Acl]>>,
    {
        let data = data.into();
        trace!(self.logger, "create"; "path" => path, "mode" => ?mode, "dlen" => data.len());
        self.session
            .enqueue(session::Request::Create {
                path: path.to_string(),
                data,
                acl: acl.into(),
                mode,
            })
            .await
            .and_then(transform::create)
            .map(move |r| (self, r))
    }

    /// Set the data for the node at the given `path`.
    ///
    /// The call will succeed if such a node exists, and the given `version` matches the version of
    /// the node (if the given `version` is `None`, it matches any version). On success, the
    /// updated [`Stat`] of the node is returned, and node watches left on the `path` by `exists`
    /// and `get_data` calls are triggered.
    pub async fn set_data<D>(
        self,
        path: &str,
        version: Option<i32>,
        data: D,
    ) -> Result<(Self, Result<Stat, error::SetData>), failure::Error>
    where
        D: Into<Cow<'static, [u8]>>,
    {
        let data = data.into();
        trace!(self.logger, "set_data"; "path" => path, "version" => ?version, "dlen" => data.len());
        let version = version.unwrap_or(-1);
        self.session
            .enqueue(session::Request::SetData {
                path: path.to_string(),
                version,
                data,
            })
            .await
            .and_then(move |r| transform::set_data(version, r))
            .map(move |r| (self, r))
    }

    /// Delete the node at the given `path`.
    ///
    /// The call will succeed if such a node exists, and the given `version` matches the node's
    /// version (if the given `version` is `None`, it matches any version). Nodes with children
    /// cannot be deleted; neither can the root.
    ///
    /// This operation, if successful, triggers node watches on the `path` and child watches on its
    /// parent.
    pub async fn delete(
        self,
        path: &str,
        version: Option<i32>,
    ) -> Result<(Self, Result<(), error::Delete>), failure::Error> {
        trace!(self.logger, "delete"; "path" => path, "version" => ?version);
        let version = version.unwrap_or(-1);
        self.session
            .enqueue(session::Request::Delete {
                path: path.to_string(),
                version,
            })
            .await
            .and_then(move |r| transform::delete(version, r))
            .map(move |r| (self, r))
    }

    /// Check that the node at the given `path` exists and carries the given `version` (`None`
    /// matches any version).
    ///
    /// This is the same test a `check` operation performs inside a [`multi`](MemKeeper::multi)
    /// batch, exposed as a standalone request.
    pub async fn check(
        self,
        path: &str,
        version: Option<i32>,
    ) -> Result<(Self, Result<(), error::Check>), failure::Error> {
        trace!(self.logger, "check"; "path" => path, "version" => ?version);
        let version = version.unwrap_or(-1);
        self.session
            .enqueue(session::Request::Check {
                path: path.to_string(),
                version,
            })
            .await
            .and_then(move |r| transform::check(version, r))
            .map(move |r| (self, r))
    }

    async fn exists_w(
        self,
        path: &str,
        watch: Watch,
    ) -> Result<(Self, Option<Stat>), failure::Error> {
        trace!(self.logger, "exists"; "path" => path, "watch" => ?watch);
        self.session
            .enqueue(session::Request::Exists {
                path: path.to_string(),
                watch,
            })
            .await
            .and_then(transform::exists)
            .map(move |r| (self, r))
    }

    /// Return the [`Stat`] of the node of the given `path`, or `None` if the node does not exist.
    pub async fn exists(self, path: &str) -> Result<(Self, Option<Stat>), failure::Error> {
        self.exists_w(path, Watch::None).await
    }

    async fn get_children_w(
        self,
        path: &str,
        watch: Watch,
    ) -> Result<(Self, Option<(Vec<String>, Stat)>), failure::Error> {
        trace!(self.logger, "get_children"; "path" => path, "watch" => ?watch);
        self.session
            .enqueue(session::Request::GetChildren {
                path: path.to_string(),
                watch,
            })
            .await
            .and_then(transform::get_children)
            .map(move |r| (self, r))
    }

    /// Return the names of the children of the node at the given `path` along with the node's
    /// [`Stat`], or `None` if the node does not exist.
    ///
    /// The returned list of children is not sorted and no guarantee is provided as to its natural
    /// or lexical order.
    pub async fn get_children(
        self,
        path: &str,
    ) -> Result<(Self, Option<(Vec<String>, Stat)>), failure::Error> {
        self.get_children_w(path, Watch::None).await
    }

    async fn get_data_w(
        self,
        path: &str,
        watch: Watch,
    ) -> Result<(Self, Option<(Vec<u8>, Stat)>), failure::Error> {
        trace!(self.logger, "get_data"; "path" => path, "watch" => ?watch);
        self.session
            .enqueue(session::Request::GetData {
                path: path.to_string(),
                watch,
            })
            .await
            .and_then(transform::get_data)
            .map(move |r| (self, r))
    }

    /// Return the data and the [`Stat`] of the node at the given `path`, or `None` if it does not
    /// exist.
    pub async fn get_data(
        self,
        path: &str,
    ) -> Result<(Self, Option<(Vec<u8>, Stat)>), failure::Error> {
        self.get_data_w(path, Watch::None).await
    }

    /// Add a watch for the next chained operation, and return a future for any received event
    /// along with the operation's (successful) result.
    pub fn with_watcher(self) -> WithWatcher {
        WithWatcher(self)
    }

    /// Start building a multi request. Multi requests batch several operations into one atomic
    /// unit.
    pub fn multi(self) -> MultiBuilder {
        MultiBuilder {
            zk: self,
            requests: Vec::new(),
        }
    }
}

/// Proxy for [`MemKeeper`] that adds watches for initiated operations.
///
/// Events from triggered watches are yielded through returned `oneshot` channels. Every watch
/// fires exactly once over the life of the session: either because the watched state changed, or
/// with a [`KeeperState::Expired`] event when the session ends (node watches only; the service
/// never notifies child watches on expiry, and neither does the emulator).
#[derive(Debug, Clone)]
pub struct WithWatcher(MemKeeper);

impl WithWatcher {
    /// Return the [`Stat`] of the node of the given `path`, or `None` if the node does not exist.
    ///
    /// A watch is left on the node at the given `path` whether or not it exists. The watch is
    /// triggered by any successful operation that creates or deletes the node, or sets its data,
    /// and in turn causes the included `oneshot::Receiver` to resolve.
    pub async fn exists(
        self,
        path: &str,
    ) -> Result<(MemKeeper, oneshot::Receiver<WatchedEvent>, Option<Stat>), failure::Error> {
        let (tx, rx) = oneshot::channel();
        self.0
            .exists_w(path, Watch::Custom(tx))
            .await
            .map(|r| (r.0, rx, r.1))
    }

    /// Return the names of the children of the node at the given `path` along with the node's
    /// [`Stat`], or `None` if the node does not exist.
    ///
    /// The returned list of children is not sorted and no guarantee is provided as to its natural
    /// or lexical order.
    ///
    /// A watch is left on the node at the given `path`. The watch is triggered by any successful
    /// operation that creates or deletes a child of that node, or deletes the node itself, and in
    /// turn causes the included `oneshot::Receiver` to resolve.
    pub async fn get_children(
        self,
        path: &str,
    ) -> Result<
        (
            MemKeeper,
            Option<(oneshot::Receiver<WatchedEvent>, Vec<String>, Stat)>,
        ),
        failure::Error,
    > {
        let (tx, rx) = oneshot::channel();
        self.0
            .get_children_w(path, Watch::Custom(tx))
            .await
            .map(|r| (r.0, r.1.map(move |(c, s)| (rx, c, s))))
    }

    /// Return the data and the [`Stat`] of the node at the given `path`, or `None` if it does not
    /// exist.
    ///
    /// A watch is left on the node at the given `path`. The watch is triggered by any successful
    /// operation that sets the node's data, or deletes it, and in turn causes the included
    /// `oneshot::Receiver` to resolve.
    pub async fn get_data(
        self,
        path: &str,
    ) -> Result<
        (
            MemKeeper,
            Option<(oneshot::Receiver<WatchedEvent>, Vec<u8>, Stat)>,
        ),
        failure::Error,
    > {
        let (tx, rx) = oneshot::channel();
        self.0
            .get_data_w(path, Watch::Custom(tx))
            .await
            .map(|r| (r.0, r.1.map(move |(b, s)| (rx, b, s))))
    }
}

/// Proxy for [`MemKeeper`] that batches operations into an atomic "multi" request.
///
/// The batch either commits as a whole or leaves the store exactly as it was: on the first failing
/// operation everything already applied is rolled back. The returned per-operation results cover
/// the operations that were attempted, in order, ending with the failure; operations after the
/// failing one yield no result at all.
#[derive(Debug)]
pub struct MultiBuilder {
    zk: MemKeeper,
    requests: Vec<session::Request>,
}

impl MultiBuilder {
    /// Attach a create operation to this multi request.
    ///
    /// See [`MemKeeper::create`] for details.
    pub fn create<D, A>(mut self, path: &str, data: D, acl: A, mode: CreateMode) -> Self
    where
        D: Into<Cow<'static, [u8]>>,
        A: Into<Cow<'static, [Acl]>>,
    {
        self.requests.push(session::Request::Create {
            path: path.to_string(),
            data: data.into(),
            acl: acl.into(),
            mode,
        });
        self
    }

    /// Attach a set data operation to this multi request.
    ///
    /// See [`MemKeeper::set_data`] for details.
    pub fn set_data<D>(mut self, path: &str, version: Option<i32>, data: D) -> Self
    where
        D: Into<Cow<'static, [u8]>>,
    {
        self.requests.push(session::Request::SetData {
            path: path.to_string(),
            version: version.unwrap_or(-1),
            data: data.into(),
        });
        self
    }

    /// Attach a delete operation to this multi request.
    ///
    /// See [`MemKeeper::delete`] for details.
    pub fn delete(mut self, path: &str, version: Option<i32>) -> Self {
        self.requests.push(session::Request::Delete {
            path: path.to_string(),
            version: version.unwrap_or(-1),
        });
        self
    }

    /// Attach a check operation to this multi request.
    ///
    /// See [`MemKeeper::check`] for details.
    pub fn check(mut self, path: &str, version: i32) -> Self {
        self.requests.push(session::Request::Check {
            path: path.to_string(),
            version,
        });
        self
    }

    /// Run executes the attached requests in one atomic unit.
    pub async fn run(
        self,
    ) -> Result<(MemKeeper, Vec<Result<MultiResponse, error::Multi>>), failure::Error> {
        let (zk, requests) = (self.zk, self.requests);
        let reqs_lite: Vec<transform::RequestMarker> = requests.iter().map(|r| r.into()).collect();
        zk.session
            .enqueue(session::Request::Multi(requests))
            .await
            .and_then(move |r| match r {
                Ok(session::Response::Multi(responses)) => reqs_lite
                    .iter()
                    .zip(responses)
                    .map(|(req, res)| transform::multi(req, res))
                    .collect(),
                Ok(r) => bail!("got non-multi response to multi: {:?}", r),
                Err(e) => Err(format_err!("multi call failed: {:?}", e)),
            })
            .map(move |r| (zk, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use slog::Drain;

    fn keeper() -> MemKeeper {
        let mut builder = MemKeeperBuilder::default();
        builder.set_logger(test_logger());
        builder.build().unwrap()
    }

    fn test_logger() -> slog::Logger {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!())
    }

    #[tokio::test]
    async fn it_works() {
        let zk = keeper();
        let (zk, exists_w, stat) = zk.with_watcher().exists("/foo").await.unwrap();
        assert_eq!(stat, None);
        let (zk, path) = zk
            .create(
                "/foo",
                &b"Hello world"[..],
                Acl::open_unsafe(),
                CreateMode::Persistent,
            )
            .await
            .unwrap();
        assert_eq!(path.as_deref(), Ok("/foo"));
        let event = exists_w.await.unwrap();
        assert_eq!(
            event,
            WatchedEvent {
                event_type: WatchedEventType::None,
                keeper_state: KeeperState::SyncConnected,
                path: String::from("/foo"),
            }
        );
        let (zk, stat) = zk.exists("/foo").await.unwrap();
        assert_eq!(stat.unwrap().data_length as usize, b"Hello world".len());
        let (zk, res) = zk.get_data("/foo").await.unwrap();
        let data = b"Hello world";
        let res = res.unwrap();
        assert_eq!(res.0, data);
        assert_eq!(res.1.data_length as usize, data.len());
        let (zk, stat) = zk
            .set_data("/foo", Some(res.1.version), &b"Bye world"[..])
            .await
            .unwrap();
        assert_eq!(stat.unwrap().data_length as usize, "Bye world".len());
        let (zk, res) = zk.get_data("/foo").await.unwrap();
        let data = b"Bye world";
        let res = res.unwrap();
        assert_eq!(res.0, data);
        assert_eq!(res.1.version, 1);
        let (zk, path) = zk
            .create(
                "/foo/bar",
                &b"Hello bar"[..],
                Acl::open_unsafe(),
                CreateMode::Persistent,
            )
            .await
            .unwrap();
        assert_eq!(path.as_deref(), Ok("/foo/bar"));
        let (zk, children) = zk.get_children("/foo").await.unwrap();
        let (children, stat) = children.unwrap();
        assert_eq!(children, vec!["bar".to_string()]);
        assert_eq!(stat.num_children, 1);
        let (zk, res) = zk.delete("/foo", None).await.unwrap();
        assert_eq!(res, Err(error::Delete::NotEmpty));
        let (zk, res) = zk.delete("/foo/bar", None).await.unwrap();
        assert_eq!(res, Ok(()));
        let (zk, res) = zk.delete("/foo", None).await.unwrap();
        assert_eq!(res, Ok(()));
        let (_, stat) = zk.exists("/foo").await.unwrap();
        assert_eq!(stat, None);
    }

    #[tokio::test]
    async fn set_data_guards_on_version() {
        let zk = keeper();
        let (zk, _) = zk
            .create("/k", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let (zk, stat) = zk.set_data("/k", Some(0), &b"v1"[..]).await.unwrap();
        assert_eq!(stat.unwrap().version, 1);
        let (zk, stat) = zk.set_data("/k", Some(0), &b"v2"[..]).await.unwrap();
        assert_eq!(stat, Err(error::SetData::BadVersion { expected: 0 }));
        let (_, res) = zk.get_data("/k").await.unwrap();
        assert_eq!(res.unwrap().0, b"v1");
    }

    #[tokio::test]
    async fn sequential_creates_count_up() {
        let zk = keeper();
        let (mut zk, _) = zk
            .create("/seq", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        for expected in &[
            "/seq/n-0000000000",
            "/seq/n-0000000001",
            "/seq/n-0000000002",
        ] {
            let (zk2, path) = zk
                .create(
                    "/seq/n-",
                    &b""[..],
                    Acl::open_unsafe(),
                    CreateMode::PersistentSequential,
                )
                .await
                .unwrap();
            assert_eq!(path.as_deref(), Ok(*expected));
            zk = zk2;
        }
        let (_, children) = zk.get_children("/seq").await.unwrap();
        assert_eq!(children.unwrap().1.num_children, 3);
    }

    #[tokio::test]
    async fn ephemeral_nodes_reject_children() {
        let zk = keeper();
        let (zk, _) = zk
            .create("/e", &b""[..], Acl::open_unsafe(), CreateMode::Ephemeral)
            .await
            .unwrap();
        let (_, res) = zk
            .create("/e/x", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        assert_eq!(res, Err(error::Create::NoChildrenForEphemerals));
    }

    #[tokio::test]
    async fn data_watch_fires_once_on_set() {
        let zk = keeper();
        let (zk, _) = zk
            .create("/k", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let (zk, res) = zk.with_watcher().get_data("/k").await.unwrap();
        let (watch, _, _) = res.unwrap();
        let (zk, _) = zk.set_data("/k", None, &b"v"[..]).await.unwrap();
        let event = watch.await.unwrap();
        assert_eq!(event.path, "/k");
        assert_eq!(event.keeper_state, KeeperState::SyncConnected);
        // the watch was consumed by the first set; later writes go unobserved
        let (_, stat) = zk.set_data("/k", None, &b"v2"[..]).await.unwrap();
        assert_eq!(stat.unwrap().version, 2);
    }

    #[tokio::test]
    async fn child_watch_fires_on_create() {
        let zk = keeper();
        let (zk, res) = zk.with_watcher().get_children("/").await.unwrap();
        let (watch, children, _) = res.unwrap();
        assert_eq!(children, Vec::<String>::new());
        let (_, _) = zk
            .create("/kid", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let event = watch.await.unwrap();
        assert_eq!(event.path, "/");
    }

    #[tokio::test]
    async fn multi_commits_as_one_unit() {
        let zk = keeper();
        let (zk, res) = zk
            .multi()
            .create("/b", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .create("/b/c", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .set_data("/b", Some(0), &b"v"[..])
            .check("/b", 1)
            .run()
            .await
            .unwrap();
        assert_eq!(res.len(), 4);
        assert_eq!(res[0], Ok(MultiResponse::Create("/b".to_string())));
        assert_eq!(res[1], Ok(MultiResponse::Create("/b/c".to_string())));
        assert!(matches!(res[2], Ok(MultiResponse::SetData(_))));
        assert_eq!(res[3], Ok(MultiResponse::Check));
        let (_, res) = zk.get_data("/b").await.unwrap();
        assert_eq!(res.unwrap().0, b"v");
    }

    #[tokio::test]
    async fn failed_multi_leaves_no_trace() {
        let zk = keeper();
        let (zk, res) = zk
            .multi()
            .create("/a", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .create("/a", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .delete("/never-attempted", None)
            .run()
            .await
            .unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res[0], Ok(MultiResponse::Create("/a".to_string())));
        assert_eq!(res[1], Err(error::Multi::Create(error::Create::NodeExists)));
        let (_, stat) = zk.exists("/a").await.unwrap();
        assert_eq!(stat, None);
    }

    #[tokio::test]
    async fn multi_shares_one_zxid() {
        let zk = keeper();
        let (zk, _) = zk
            .create("/a", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let (zk, _) = zk
            .multi()
            .create("/b", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .create("/c", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .run()
            .await
            .unwrap();
        let (zk, _) = zk
            .create("/d", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let (zk, a) = zk.exists("/a").await.unwrap();
        let (zk, b) = zk.exists("/b").await.unwrap();
        let (zk, c) = zk.exists("/c").await.unwrap();
        let (_, d) = zk.exists("/d").await.unwrap();
        let (a, b, c, d) = (a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap());
        assert!(a.czxid < b.czxid);
        assert_eq!(b.czxid, c.czxid);
        assert!(c.czxid < d.czxid);
    }

    #[tokio::test]
    async fn check_works_standalone() {
        let zk = keeper();
        let (zk, _) = zk
            .create("/c", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let (zk, res) = zk.check("/c", Some(0)).await.unwrap();
        assert_eq!(res, Ok(()));
        let (zk, res) = zk.check("/c", Some(3)).await.unwrap();
        assert_eq!(res, Err(error::Check::BadVersion { expected: 3 }));
        let (_, res) = zk.check("/missing", None).await.unwrap();
        assert_eq!(res, Err(error::Check::NoNode));
    }

    #[tokio::test]
    async fn close_expires_watches_and_rejects_requests() {
        let zk = keeper();
        let (zk, watch, stat) = zk.with_watcher().exists("/z").await.unwrap();
        assert_eq!(stat, None);
        zk.close();
        let event = watch.await.unwrap();
        assert_eq!(event.keeper_state, KeeperState::Expired);
        assert_eq!(event.path, "");
        assert!(zk
            .create("/z", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn chroot_rewrites_both_ways() {
        let mut builder = MemKeeperBuilder::default();
        builder.set_logger(test_logger());
        builder.set_chroot("/app/");
        let zk = builder.build().unwrap();

        // under a chroot, creating "/" creates the chroot node itself
        let (zk, path) = zk
            .create("/", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        assert_eq!(path.as_deref(), Ok("/"));
        let (zk, path) = zk
            .create("/x", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        assert_eq!(path.as_deref(), Ok("/x"));

        let (zk, res) = zk.with_watcher().get_data("/x").await.unwrap();
        let (watch, _, _) = res.unwrap();
        let (zk, _) = zk.set_data("/x", None, &b"v"[..]).await.unwrap();
        assert_eq!(watch.await.unwrap().path, "/x");

        let (_, children) = zk.get_children("/").await.unwrap();
        assert_eq!(children.unwrap().0, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn clones_share_the_session() {
        let zk = keeper();
        let other = zk.clone();
        let (_, _) = zk
            .create("/shared", &b""[..], Acl::open_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
        let (_, stat) = other.exists("/shared").await.unwrap();
        assert!(stat.is_some());
    }
}
