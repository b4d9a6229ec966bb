/// Error codes of the coordination service, with the wire values the real server uses.
///
/// This is the subset the emulator can actually produce. `Ok` has no representation here; a
/// successful operation is an `Ok` at the `Result` level.
#[derive(Debug, Eq, PartialEq)]
#[repr(i32)]
pub(crate) enum ZkError {
    /// Invalid arguments, such as a malformed path or an operation that is not allowed inside a
    /// `multi` batch.
    BadArguments = -8,
    /// Version conflict: the expected version passed to the operation does not match the node's
    /// current version.
    BadVersion = -103,
    /// Ephemeral nodes may not have children.
    NoChildrenForEphemerals = -108,
    /// Request to create a node that already exists.
    NodeExists = -110,
    /// Attempted to operate on a node that does not exist.
    NoNode = -101,
    /// The node has children and cannot be deleted.
    NotEmpty = -111,
    /// The request could not be queued within the operation timeout.
    OperationTimeout = -7,
    /// The session has been expired.
    SessionExpired = -112,
}
