use crate::WatchedEvent;
use futures::channel::oneshot;

/// A watch attached to a read request.
///
/// The sender is consumed when the watch fires, which is what makes every watch one-shot.
#[derive(Debug)]
pub(crate) enum Watch {
    None,
    Custom(oneshot::Sender<WatchedEvent>),
}
