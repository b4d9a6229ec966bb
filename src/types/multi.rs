use super::Stat;

/// An individual response in a `multi` request.
///
/// A failed `multi` batch yields responses only for the operations that were attempted before the
/// failure; operations after the failing one produce no response at all.
#[derive(Debug, PartialEq)]
pub enum MultiResponse {
    /// The response to a `create` request within a `multi` batch, carrying the created path.
    Create(String),
    /// The response to a `set_data` request within a `multi` batch.
    SetData(Stat),
    /// The response to a `delete` request within a `multi` batch.
    Delete,
    /// The response to a `check` request within a `multi` batch.
    Check,
}
