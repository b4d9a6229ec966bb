use super::error::ZkError;
use crate::Stat;

/// The result payload of a processed request, before it is mapped into the typed public API.
#[derive(Debug, PartialEq)]
pub(crate) enum Response {
    Stat(Stat),
    String(String),
    Empty,
    Strings {
        children: Vec<String>,
        stat: Stat,
    },
    GetData {
        bytes: Vec<u8>,
        stat: Stat,
    },
    /// Per-sub-request outcomes of a `multi` batch, in submission order, truncated at the first
    /// failure.
    Multi(Vec<Result<Response, ZkError>>),
}

impl Response {
    /// Rewrite contained paths back into the client's view of the tree.
    pub(super) fn strip_chroot(&mut self, chroot: &str) {
        if chroot.is_empty() {
            return;
        }

        match *self {
            Response::String(ref mut path) => strip_chroot_from(path, chroot),
            Response::Multi(ref mut responses) => {
                for response in responses.iter_mut().flatten() {
                    response.strip_chroot(chroot);
                }
            }
            _ => {}
        }
    }
}

/// Remove the session's chroot from a path produced by the processor.
pub(super) fn strip_chroot_from(path: &mut String, chroot: &str) {
    if let Some(rest) = path.strip_prefix(chroot) {
        *path = if rest.is_empty() {
            "/".to_string()
        } else {
            rest.to_string()
        };
    }
}
