use std::borrow::Cow;
use std::mem;

use super::watch::Watch;
use crate::{Acl, CreateMode};

/// One client request, as it travels through the queue to the processor.
///
/// Watches ride inside the read variants; the processor moves them out into its registries before
/// the request is evaluated.
#[derive(Debug)]
pub(crate) enum Request {
    Create {
        path: String,
        data: Cow<'static, [u8]>,
        acl: Cow<'static, [Acl]>,
        mode: CreateMode,
    },
    Delete {
        path: String,
        version: i32,
    },
    Exists {
        path: String,
        watch: Watch,
    },
    GetData {
        path: String,
        watch: Watch,
    },
    SetData {
        path: String,
        version: i32,
        data: Cow<'static, [u8]>,
    },
    GetChildren {
        path: String,
        watch: Watch,
    },
    Check {
        path: String,
        version: i32,
    },
    Multi(Vec<Request>),
}

impl Request {
    /// Rewrite the request to address the session's subtree.
    pub(super) fn prepend_chroot(&mut self, chroot: &str) {
        if chroot.is_empty() {
            return;
        }

        match *self {
            Request::Create { ref mut path, .. }
            | Request::Delete { ref mut path, .. }
            | Request::Exists { ref mut path, .. }
            | Request::GetData { ref mut path, .. }
            | Request::SetData { ref mut path, .. }
            | Request::GetChildren { ref mut path, .. }
            | Request::Check { ref mut path, .. } => {
                // "/" addresses the chroot node itself.
                if path == "/" {
                    *path = chroot.to_string();
                } else {
                    path.insert_str(0, chroot);
                }
            }
            Request::Multi(ref mut requests) => {
                for request in requests {
                    request.prepend_chroot(chroot);
                }
            }
        }
    }

    /// Detach the watch from a read request, leaving `Watch::None` behind.
    pub(super) fn take_watch(&mut self) -> Watch {
        match *self {
            Request::Exists { ref mut watch, .. }
            | Request::GetData { ref mut watch, .. }
            | Request::GetChildren { ref mut watch, .. } => mem::replace(watch, Watch::None),
            _ => Watch::None,
        }
    }
}
