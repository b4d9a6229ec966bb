use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use failure::format_err;
use futures::channel::oneshot;
use futures::future::{self, Either};
use futures::FutureExt;
use parking_lot::Mutex;
use slog::{debug, error, o};

mod error;
mod processor;
mod request;
mod response;
mod tree;
mod watch;

pub(crate) use self::error::ZkError;
pub(crate) use self::request::Request;
pub(crate) use self::response::Response;
pub(crate) use self::watch::Watch;

use self::processor::Processor;

/// What travels through the queue: the request, the completion to resolve with its outcome, and
/// when it was submitted.
#[derive(Debug)]
pub(crate) struct RequestInfo {
    pub(crate) request: Request,
    pub(crate) completion: oneshot::Sender<Result<Response, ZkError>>,
    pub(crate) submitted: Instant,
}

/// One emulated session: a bounded request queue feeding a dedicated processor thread.
///
/// The expired flag and the queue push are guarded by one mutex so that expiry and submission are
/// serialized: once the flag is set, no envelope can enter the queue, and the teardown drain
/// therefore observes every outstanding submission.
#[derive(Debug)]
pub(crate) struct Session {
    expired: Arc<Mutex<bool>>,
    requests: Sender<RequestInfo>,
    /// Drain side of the queue, used during teardown only.
    backlog: Receiver<RequestInfo>,
    shutdown: Sender<()>,
    processor: Mutex<Option<thread::JoinHandle<()>>>,
    operation_timeout: Duration,
    logger: slog::Logger,
}

impl Session {
    /// Start a session: seed the store, spawn the processor thread, and hand back the shared
    /// handle state.
    pub(crate) fn spawn(
        chroot: String,
        operation_timeout: Duration,
        queue_capacity: usize,
        logger: slog::Logger,
    ) -> Result<Session, failure::Error> {
        let (requests, incoming) = crossbeam_channel::bounded(queue_capacity);
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
        let expired = Arc::new(Mutex::new(false));

        let processor = Processor::new(
            incoming.clone(),
            shutdown_rx,
            Arc::clone(&expired),
            chroot,
            logger.new(o!("thread" => "processor")),
        );
        let handle = thread::Builder::new()
            .name("memkeeper".to_string())
            .spawn(move || processor.run())
            .map_err(|e| format_err!("cannot spawn processor thread: {}", e))?;

        Ok(Session {
            expired,
            requests,
            backlog: incoming,
            shutdown,
            processor: Mutex::new(Some(handle)),
            operation_timeout,
            logger,
        })
    }

    /// Submit a request and get a future for its outcome.
    ///
    /// The submission itself is synchronous and can wait up to the operation timeout for queue
    /// space; the returned future resolves once the processor has handled the request.
    pub(crate) fn enqueue(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Result<Response, ZkError>, failure::Error>> {
        let (tx, rx) = oneshot::channel();
        let info = RequestInfo {
            request,
            completion: tx,
            submitted: Instant::now(),
        };
        match self.push(info) {
            Ok(()) => Either::Left(rx.map(|r| {
                r.map_err(|e| format_err!("session closed before the request was processed: {:?}", e))
            })),
            Err(e) => Either::Right(future::ready(Err(format_err!(
                "failed to enqueue new request: {:?}",
                e
            )))),
        }
    }

    fn push(&self, info: RequestInfo) -> Result<(), ZkError> {
        let pushed = {
            let expired = self.expired.lock();
            if *expired {
                Err(ZkError::SessionExpired)
            } else {
                // The lock is held across the timed push on purpose; pushes and expiry must not
                // interleave, or a request could land in a queue nobody will ever drain.
                self.requests
                    .send_timeout(info, self.operation_timeout)
                    .map_err(|e| match e {
                        SendTimeoutError::Timeout(_) => ZkError::OperationTimeout,
                        SendTimeoutError::Disconnected(_) => ZkError::SessionExpired,
                    })
            }
        };
        if pushed.is_err() {
            // A submission the session could not accept ends the session, like the service this
            // emulates; the error is reported to the caller after the drain.
            self.finalize();
        }
        pushed
    }

    /// Expire the session: no-op if it is already expired, otherwise stop the processor (which
    /// notifies registered node watches on its way out) and fail everything still in the queue.
    pub(crate) fn finalize(&self) {
        {
            let mut expired = self.expired.lock();
            if *expired {
                return;
            }
            *expired = true;
        }
        debug!(self.logger, "finalizing session");
        let _ = self.shutdown.try_send(());

        if let Some(processor) = self.processor.lock().take() {
            if processor.join().is_err() {
                error!(self.logger, "processor thread panicked during session teardown");
            }
        }

        // The processor is gone, so the queue is stable; everything still in it gets a terminal
        // answer exactly once.
        while let Ok(mut info) = self.backlog.try_recv() {
            if let Watch::Custom(tx) = info.request.take_watch() {
                let _ = tx.send(crate::WatchedEvent::session_expired());
            }
            let _ = info.completion.send(Err(ZkError::SessionExpired));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.finalize();
    }
}
