use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::ZkError;
use super::request::Request;
use super::response::Response;
use crate::{CreateMode, Stat};

/// Everything up to the last `/`, or `/` for first-level nodes and the root itself.
pub(super) fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// The segment after the last `/`.
fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

fn valid_path(path: &str) -> bool {
    path == "/" || (path.starts_with('/') && !path.ends_with('/'))
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct Znode {
    data: Vec<u8>,
    ephemeral: bool,
    sequential: bool,
    /// Suffix counter for sequential children created under this node.
    seq_num: i32,
    stat: Stat,
}

/// The hierarchical store: an ordered map from full path to node record.
///
/// Keeping the map ordered by path string means all descendants of a node follow it directly, so
/// child enumeration is a bounded prefix walk rather than a full scan.
#[derive(Debug)]
pub(super) struct Tree {
    nodes: BTreeMap<String, Znode>,
}

impl Tree {
    pub(super) fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Znode::default());
        Tree { nodes }
    }

    /// Apply one request at the given zxid and report its outcome.
    ///
    /// Every path through here returns; failures are codes, never panics, so a misbehaving client
    /// cannot take the processor down.
    pub(super) fn process(&mut self, request: &Request, zxid: i64) -> Result<Response, ZkError> {
        match *request {
            Request::Create {
                ref path,
                ref data,
                mode,
                ..
            } => self.create(path, data, mode, zxid),
            Request::Delete { ref path, version } => self.delete(path, version),
            Request::Exists { ref path, .. } => self.exists(path),
            Request::GetData { ref path, .. } => self.get_data(path),
            Request::SetData {
                ref path,
                ref data,
                version,
            } => self.set_data(path, data, version, zxid),
            Request::GetChildren { ref path, .. } => self.get_children(path),
            Request::Check { ref path, version } => self.check(path, version),
            Request::Multi(ref requests) => self.multi(requests, zxid),
        }
    }

    fn create(
        &mut self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        zxid: i64,
    ) -> Result<Response, ZkError> {
        if !valid_path(path) {
            return Err(ZkError::BadArguments);
        }
        if self.nodes.contains_key(path) {
            return Err(ZkError::NodeExists);
        }
        let parent = match self.nodes.get_mut(parent_path(path)) {
            None => return Err(ZkError::NoNode),
            Some(parent) if parent.ephemeral => return Err(ZkError::NoChildrenForEphemerals),
            Some(parent) => parent,
        };

        let mut created_path = path.to_string();
        if mode.is_sequential() {
            created_path.push_str(&format!("{:010}", parent.seq_num));
            parent.seq_num += 1;
        }
        parent.stat.cversion += 1;
        parent.stat.num_children += 1;

        let now = now_ms();
        self.nodes.insert(
            created_path.clone(),
            Znode {
                data: data.to_vec(),
                ephemeral: mode.is_ephemeral(),
                sequential: mode.is_sequential(),
                seq_num: 0,
                stat: Stat {
                    czxid: zxid,
                    mzxid: zxid,
                    ctime: now,
                    mtime: now,
                    data_length: data.len() as i32,
                    ..Stat::default()
                },
            },
        );
        Ok(Response::String(created_path))
    }

    fn delete(&mut self, path: &str, version: i32) -> Result<Response, ZkError> {
        // The root is never deletable; everything else must keep a live parent.
        if !valid_path(path) || path == "/" {
            return Err(ZkError::BadArguments);
        }
        let node = match self.nodes.get(path) {
            None => return Err(ZkError::NoNode),
            Some(node) => node,
        };
        if version != -1 && version != node.stat.version {
            return Err(ZkError::BadVersion);
        }
        if node.stat.num_children > 0 {
            return Err(ZkError::NotEmpty);
        }
        self.nodes.remove(path);
        let parent = self
            .nodes
            .get_mut(parent_path(path))
            .expect("parent of a live node is always present");
        parent.stat.num_children -= 1;
        parent.stat.cversion += 1;
        Ok(Response::Empty)
    }

    fn exists(&self, path: &str) -> Result<Response, ZkError> {
        match self.nodes.get(path) {
            Some(node) => Ok(Response::Stat(node.stat)),
            None => Err(ZkError::NoNode),
        }
    }

    fn get_data(&self, path: &str) -> Result<Response, ZkError> {
        match self.nodes.get(path) {
            Some(node) => Ok(Response::GetData {
                bytes: node.data.clone(),
                stat: node.stat,
            }),
            None => Err(ZkError::NoNode),
        }
    }

    fn set_data(
        &mut self,
        path: &str,
        data: &[u8],
        version: i32,
        zxid: i64,
    ) -> Result<Response, ZkError> {
        if !valid_path(path) {
            return Err(ZkError::BadArguments);
        }
        let node = match self.nodes.get_mut(path) {
            None => return Err(ZkError::NoNode),
            Some(node) => node,
        };
        if version != -1 && version != node.stat.version {
            return Err(ZkError::BadVersion);
        }
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = now_ms();
        node.stat.data_length = data.len() as i32;

        // A data write also counts as a child change from the parent's point of view.
        self.nodes
            .get_mut(parent_path(path))
            .expect("parent of a live node is always present")
            .stat
            .cversion += 1;
        Ok(Response::Stat(self.nodes[path].stat))
    }

    fn get_children(&self, path: &str) -> Result<Response, ZkError> {
        let node = match self.nodes.get(path) {
            None => return Err(ZkError::NoNode),
            Some(node) => node,
        };

        let mut prefix = path.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        let children = self
            .nodes
            .range::<str, _>((Bound::Excluded(prefix.as_str()), Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| parent_path(p) == path)
            .map(|(p, _)| base_name(p).to_string())
            .collect();

        Ok(Response::Strings {
            children,
            stat: node.stat,
        })
    }

    fn check(&self, path: &str, version: i32) -> Result<Response, ZkError> {
        let node = match self.nodes.get(path) {
            None => return Err(ZkError::NoNode),
            Some(node) => node,
        };
        if version != -1 && version != node.stat.version {
            return Err(ZkError::BadVersion);
        }
        Ok(Response::Empty)
    }

    /// Apply a batch all-or-nothing: on the first failing sub-request the whole store is restored
    /// to its pre-batch state, and sub-requests after the failing one are not attempted.
    fn multi(&mut self, requests: &[Request], zxid: i64) -> Result<Response, ZkError> {
        let snapshot = self.nodes.clone();
        let mut responses = Vec::with_capacity(requests.len());

        for request in requests {
            let result = match *request {
                Request::Create { .. }
                | Request::Delete { .. }
                | Request::SetData { .. }
                | Request::Check { .. } => self.process(request, zxid),
                _ => Err(ZkError::BadArguments),
            };
            match result {
                Ok(response) => responses.push(Ok(response)),
                Err(e) => {
                    responses.push(Err(e));
                    self.nodes = snapshot;
                    return Ok(Response::Multi(responses));
                }
            }
        }
        Ok(Response::Multi(responses))
    }

    #[cfg(test)]
    fn stat(&self, path: &str) -> Stat {
        self.nodes[path].stat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn root_exists_from_birth() {
        let tree = Tree::new();
        assert!(matches!(tree.exists("/"), Ok(Response::Stat(_))));
    }

    #[test]
    fn create_then_list_parent() {
        let mut tree = Tree::new();
        assert_eq!(
            tree.create("/a", b"x", CreateMode::Persistent, 1),
            Ok(Response::String("/a".to_string()))
        );
        match tree.get_children("/") {
            Ok(Response::Strings { children, stat }) => {
                assert_eq!(children, vec!["a".to_string()]);
                assert_eq!(stat.num_children, 1);
                assert_eq!(stat.cversion, 1);
            }
            r => panic!("unexpected response: {:?}", r),
        }
    }

    #[test]
    fn listing_skips_grandchildren() {
        let mut tree = Tree::new();
        tree.create("/a", b"", CreateMode::Persistent, 1).unwrap();
        tree.create("/a/b", b"", CreateMode::Persistent, 2).unwrap();
        tree.create("/a/b/c", b"", CreateMode::Persistent, 3).unwrap();
        tree.create("/ab", b"", CreateMode::Persistent, 4).unwrap();
        match tree.get_children("/a") {
            Ok(Response::Strings { children, .. }) => assert_eq!(children, vec!["b".to_string()]),
            r => panic!("unexpected response: {:?}", r),
        }
        match tree.get_children("/") {
            Ok(Response::Strings { children, .. }) => {
                assert_eq!(children, vec!["a".to_string(), "ab".to_string()])
            }
            r => panic!("unexpected response: {:?}", r),
        }
    }

    #[test]
    fn create_requires_parent() {
        let mut tree = Tree::new();
        assert_eq!(
            tree.create("/a/b", b"", CreateMode::Persistent, 1),
            Err(ZkError::NoNode)
        );
    }

    #[test]
    fn create_rejects_duplicates_and_junk() {
        let mut tree = Tree::new();
        tree.create("/a", b"", CreateMode::Persistent, 1).unwrap();
        assert_eq!(
            tree.create("/a", b"", CreateMode::Persistent, 2),
            Err(ZkError::NodeExists)
        );
        assert_eq!(
            tree.create("a", b"", CreateMode::Persistent, 3),
            Err(ZkError::BadArguments)
        );
        assert_eq!(
            tree.create("/a/", b"", CreateMode::Persistent, 4),
            Err(ZkError::BadArguments)
        );
        assert_eq!(
            tree.create("", b"", CreateMode::Persistent, 5),
            Err(ZkError::BadArguments)
        );
    }

    #[test]
    fn ephemeral_nodes_reject_children() {
        let mut tree = Tree::new();
        tree.create("/e", b"", CreateMode::Ephemeral, 1).unwrap();
        assert_eq!(
            tree.create("/e/x", b"", CreateMode::Persistent, 2),
            Err(ZkError::NoChildrenForEphemerals)
        );
        assert_eq!(tree.stat("/e").num_children, 0);
    }

    #[test]
    fn sequential_create_appends_padded_counter() {
        let mut tree = Tree::new();
        tree.create("/seq", b"", CreateMode::Persistent, 1).unwrap();
        for (zxid, expected) in &[
            (2, "/seq/n-0000000000"),
            (3, "/seq/n-0000000001"),
            (4, "/seq/n-0000000002"),
        ] {
            assert_eq!(
                tree.create("/seq/n-", b"", CreateMode::PersistentSequential, *zxid),
                Ok(Response::String(expected.to_string()))
            );
        }
        assert_eq!(tree.nodes["/seq"].seq_num, 3);
        assert_eq!(tree.stat("/seq").num_children, 3);
    }

    #[test]
    fn create_stamps_stat() {
        let mut tree = Tree::new();
        tree.create("/a", b"abc", CreateMode::Persistent, 7).unwrap();
        let stat = tree.stat("/a");
        assert_eq!(stat.czxid, 7);
        assert_eq!(stat.mzxid, 7);
        assert_eq!(stat.version, 0);
        assert_eq!(stat.cversion, 0);
        assert_eq!(stat.data_length, 3);
        assert_eq!(stat.ctime, stat.mtime);
    }

    #[test]
    fn set_data_guards_version() {
        let mut tree = Tree::new();
        tree.create("/k", b"", CreateMode::Persistent, 1).unwrap();
        match tree.set_data("/k", b"v1", 0, 2) {
            Ok(Response::Stat(stat)) => {
                assert_eq!(stat.version, 1);
                assert_eq!(stat.mzxid, 2);
                assert_eq!(stat.data_length, 2);
            }
            r => panic!("unexpected response: {:?}", r),
        }
        assert_eq!(tree.set_data("/k", b"v2", 0, 3), Err(ZkError::BadVersion));
        match tree.get_data("/k") {
            Ok(Response::GetData { bytes, .. }) => assert_eq!(bytes, b"v1"),
            r => panic!("unexpected response: {:?}", r),
        }
        assert!(tree.set_data("/k", b"v2", -1, 4).is_ok());
        assert_eq!(tree.stat("/k").version, 2);
    }

    #[test]
    fn set_data_bumps_parent_cversion() {
        let mut tree = Tree::new();
        tree.create("/k", b"", CreateMode::Persistent, 1).unwrap();
        let before = tree.stat("/").cversion;
        tree.set_data("/k", b"v", -1, 2).unwrap();
        assert_eq!(tree.stat("/").cversion, before + 1);
    }

    #[test]
    fn set_data_on_root_reports_its_own_bump() {
        let mut tree = Tree::new();
        match tree.set_data("/", b"v", -1, 1) {
            Ok(Response::Stat(stat)) => assert_eq!(stat.cversion, 1),
            r => panic!("unexpected response: {:?}", r),
        }
    }

    #[test]
    fn delete_checks_version_before_children() {
        let mut tree = Tree::new();
        tree.create("/a", b"", CreateMode::Persistent, 1).unwrap();
        tree.create("/a/b", b"", CreateMode::Persistent, 2).unwrap();
        assert_eq!(tree.delete("/a", 5), Err(ZkError::BadVersion));
        assert_eq!(tree.delete("/a", -1), Err(ZkError::NotEmpty));
        assert_eq!(tree.delete("/a/b", -1), Ok(Response::Empty));
        assert_eq!(tree.delete("/a", -1), Ok(Response::Empty));
        assert_eq!(tree.exists("/a"), Err(ZkError::NoNode));
        assert_eq!(tree.stat("/").num_children, 0);
    }

    #[test]
    fn delete_of_missing_node_and_root() {
        let mut tree = Tree::new();
        assert_eq!(tree.delete("/nope", -1), Err(ZkError::NoNode));
        assert_eq!(tree.delete("/", -1), Err(ZkError::BadArguments));
        assert!(tree.exists("/").is_ok());
    }

    #[test]
    fn check_matches_versions() {
        let mut tree = Tree::new();
        tree.create("/c", b"", CreateMode::Persistent, 1).unwrap();
        assert_eq!(tree.check("/c", 0), Ok(Response::Empty));
        assert_eq!(tree.check("/c", -1), Ok(Response::Empty));
        assert_eq!(tree.check("/c", 3), Err(ZkError::BadVersion));
        assert_eq!(tree.check("/missing", -1), Err(ZkError::NoNode));
    }

    fn multi_create(path: &str) -> Request {
        Request::Create {
            path: path.to_string(),
            data: Cow::Borrowed(b""),
            acl: Cow::Borrowed(&[]),
            mode: CreateMode::Persistent,
        }
    }

    #[test]
    fn multi_commits_all_or_nothing() {
        let mut tree = Tree::new();
        let batch = vec![multi_create("/a"), multi_create("/a/b")];
        match tree.multi(&batch, 1) {
            Ok(Response::Multi(responses)) => {
                assert_eq!(responses.len(), 2);
                assert!(responses.iter().all(|r| r.is_ok()));
            }
            r => panic!("unexpected response: {:?}", r),
        }
        assert!(tree.exists("/a/b").is_ok());
    }

    #[test]
    fn failed_multi_restores_the_store() {
        let mut tree = Tree::new();
        tree.create("/x", b"seed", CreateMode::Persistent, 1).unwrap();
        let before = tree.nodes.clone();

        let batch = vec![multi_create("/a"), multi_create("/a"), multi_create("/c")];
        match tree.multi(&batch, 2) {
            Ok(Response::Multi(responses)) => {
                assert_eq!(responses.len(), 2);
                assert_eq!(responses[0], Ok(Response::String("/a".to_string())));
                assert_eq!(responses[1], Err(ZkError::NodeExists));
            }
            r => panic!("unexpected response: {:?}", r),
        }
        assert_eq!(tree.nodes, before);
        assert_eq!(tree.exists("/a"), Err(ZkError::NoNode));
    }

    #[test]
    fn multi_rejects_read_requests() {
        let mut tree = Tree::new();
        let batch = vec![Request::GetData {
            path: "/".to_string(),
            watch: super::super::watch::Watch::None,
        }];
        match tree.multi(&batch, 1) {
            Ok(Response::Multi(responses)) => {
                assert_eq!(responses, vec![Err(ZkError::BadArguments)])
            }
            r => panic!("unexpected response: {:?}", r),
        }
    }

    #[test]
    fn parent_and_base_of_paths() {
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(parent_path("/a/b"), "/a");
        assert_eq!(parent_path("/a/b/c"), "/a/b");
        assert_eq!(base_name("/"), "");
        assert_eq!(base_name("/a"), "a");
        assert_eq!(base_name("/a/b"), "b");
    }
}
