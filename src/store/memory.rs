// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-process tree store.
//!
//! Keeps the whole tree in memory with the same node semantics as the
//! ZooKeeper backend: creation fails on existing nodes, leaf creation fails on
//! missing parents, and non-recursive deletion fails on nodes with children.
//!
//! Sessions handed out by a [`MemoryConnector`] are counted, so callers can
//! verify that every acquired session was released. Connection loss can be
//! injected after a fixed number of requests to exercise partial failures, and
//! a concurrent writer can be imitated by removing a node right after a given
//! path is listed.

use crate::store::{
    ancestors, child_path, Connector, SessionMode, Result, StoreError, TreeRead, TreeWrite,
};

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};
use tracing::trace;
use zookeeper::ZkError;

#[derive(Debug, Default)]
struct MemoryTree {
    nodes: BTreeMap<String, Vec<u8>>,
    open_sessions: usize,
    sessions_opened: usize,
    requests_left: Option<usize>,
    removal_after_listing: Option<(String, String)>,
}

impl MemoryTree {
    fn contains(&self, path: &str) -> bool {
        path == "/" || self.nodes.contains_key(path)
    }

    fn children(&self, path: &str) -> BTreeSet<String> {
        let prefix = child_path(path, "");
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.contains('/')).then(|| rest.to_owned())
            })
            .collect()
    }

    fn remove_subtree(&mut self, path: &str) {
        let prefix = child_path(path, "");
        self.nodes.retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    // INVARIANT: Every request burns one unit of the injected budget.
    fn request(&mut self, path: &str) -> Result<()> {
        match self.requests_left.as_mut() {
            Some(0) => Err(StoreError::Request {
                path: path.into(),
                source: ZkError::ConnectionLoss,
            }),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Hands out sessions to a shared in-process tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    tree: Rc<RefCell<MemoryTree>>,
}

impl MemoryConnector {
    /// Construct new empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held open.
    pub fn open_sessions(&self) -> usize {
        self.tree.borrow().open_sessions
    }

    /// Number of sessions acquired over the lifetime of the tree.
    pub fn sessions_opened(&self) -> usize {
        self.tree.borrow().sessions_opened
    }

    /// Fail every request after the next `requests` ones with connection loss.
    pub fn disconnect_after(&self, requests: usize) {
        self.tree.borrow_mut().requests_left = Some(requests);
    }

    /// Restore connectivity.
    pub fn reconnect(&self) {
        self.tree.borrow_mut().requests_left = None;
    }

    /// Remove `victim` and its descendants once, right after `listed` has its
    /// children listed.
    pub fn remove_after_listing(&self, listed: impl Into<String>, victim: impl Into<String>) {
        self.tree.borrow_mut().removal_after_listing = Some((listed.into(), victim.into()));
    }

    /// Copy of every node path and its value decoded as UTF-8.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.tree
            .borrow()
            .nodes
            .iter()
            .map(|(path, value)| (path.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect()
    }

    fn open(&self, mode: SessionMode) -> Result<MemorySession> {
        let mut tree = self.tree.borrow_mut();
        tree.request("/")?;
        tree.open_sessions += 1;
        tree.sessions_opened += 1;
        trace!("open {mode:?} memory session");

        Ok(MemorySession {
            tree: Rc::clone(&self.tree),
            mode,
            closed: false,
        })
    }
}

impl Connector for MemoryConnector {
    type Reader = MemorySession;
    type Writer = MemorySession;

    fn read_only(&self) -> Result<Self::Reader> {
        self.open(SessionMode::ReadOnly)
    }

    fn read_write(&self) -> Result<Self::Writer> {
        self.open(SessionMode::ReadWrite)
    }
}

/// Session to an in-process tree.
#[derive(Debug)]
pub struct MemorySession {
    tree: Rc<RefCell<MemoryTree>>,
    mode: SessionMode,
    closed: bool,
}

impl MemorySession {
    fn ensure_writable(&self, path: &str) -> Result<()> {
        match self.mode {
            SessionMode::ReadWrite => Ok(()),
            SessionMode::ReadOnly => Err(StoreError::ReadOnly { path: path.into() }),
        }
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.tree.borrow_mut().open_sessions -= 1;
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}

impl TreeRead for MemorySession {
    fn exists(&self, path: &str) -> Result<bool> {
        let mut tree = self.tree.borrow_mut();
        tree.request(path)?;
        Ok(tree.contains(path))
    }

    fn get_value(&self, path: &str) -> Result<Vec<u8>> {
        let mut tree = self.tree.borrow_mut();
        tree.request(path)?;
        tree.nodes
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NoNode { path: path.into() })
    }

    fn list_children(&self, path: &str) -> Result<BTreeSet<String>> {
        let mut tree = self.tree.borrow_mut();
        tree.request(path)?;
        if !tree.contains(path) {
            return Err(StoreError::NoNode { path: path.into() });
        }

        let children = tree.children(path);
        if let Some((_, victim)) = tree
            .removal_after_listing
            .take_if(|(listed, _)| *listed == path)
        {
            trace!("remove {victim} behind listing of {path}");
            tree.remove_subtree(&victim);
        }

        Ok(children)
    }

    fn close(mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl TreeWrite for MemorySession {
    fn create_path(&self, path: &str, value: &[u8], with_parents: bool) -> Result<()> {
        self.ensure_writable(path)?;
        let mut tree = self.tree.borrow_mut();
        tree.request(path)?;

        if tree.contains(path) {
            return Err(StoreError::NodeExists { path: path.into() });
        }

        for ancestor in ancestors(path) {
            if tree.contains(ancestor) {
                continue;
            }

            if !with_parents {
                return Err(StoreError::NoNode {
                    path: ancestor.into(),
                });
            }

            tree.nodes.insert(ancestor.into(), Vec::new());
        }

        trace!("create {path}");
        tree.nodes.insert(path.into(), value.to_vec());

        Ok(())
    }

    fn set_value(&self, path: &str, value: &[u8]) -> Result<()> {
        self.ensure_writable(path)?;
        let mut tree = self.tree.borrow_mut();
        tree.request(path)?;
        match tree.nodes.get_mut(path) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(())
            }
            None => Err(StoreError::NoNode { path: path.into() }),
        }
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        self.ensure_writable(path)?;
        let mut tree = self.tree.borrow_mut();
        tree.request(path)?;

        if !tree.nodes.contains_key(path) {
            return Err(StoreError::NoNode { path: path.into() });
        }

        if !recursive && !tree.children(path).is_empty() {
            return Err(StoreError::NotEmpty { path: path.into() });
        }

        trace!("delete {path}");
        tree.remove_subtree(path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_requires_parents_unless_asked() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        let session = connector.read_write()?;

        let result = session.create("/inv/hosts/pg01", b"");
        assert!(matches!(result, Err(StoreError::NoNode { path }) if path == "/inv"));

        session.create_path("/inv/hosts/pg01", b"", true)?;
        session.create("/inv/hosts/pg01/region", b"eu")?;
        let result = session.create("/inv/hosts/pg01/region", b"us");
        assert!(matches!(result, Err(StoreError::NodeExists { .. })));

        assert_eq!(session.get_value("/inv/hosts/pg01/region")?, b"eu".to_vec());
        session.close()?;

        Ok(())
    }

    #[test]
    fn list_children_returns_direct_children_only() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        let session = connector.read_write()?;
        session.create_path("/inv/groups/db/pg01", b"", true)?;
        session.create_path("/inv/groups/db/pg02", b"", true)?;
        session.create_path("/inv/groups/dbx/pg03", b"", true)?;

        let result = session.list_children("/inv/groups")?;
        let expect = BTreeSet::from(["db".to_string(), "dbx".to_string()]);
        assert_eq!(result, expect);

        let result = session.list_children("/inv/groups/db")?;
        let expect = BTreeSet::from(["pg01".to_string(), "pg02".to_string()]);
        assert_eq!(result, expect);

        let result = session.list_children("/");
        assert_eq!(result?, BTreeSet::from(["inv".to_string()]));

        Ok(())
    }

    #[test]
    fn delete_respects_recursion_flag() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        let session = connector.read_write()?;
        session.create_path("/inv/groups/db/pg01", b"", true)?;
        session.create_path("/inv/groups/dbx", b"", true)?;

        let result = session.delete("/inv/groups/db", false);
        assert!(matches!(result, Err(StoreError::NotEmpty { .. })));

        session.delete("/inv/groups/db", true)?;
        assert!(!session.exists("/inv/groups/db/pg01")?);
        assert!(!session.exists("/inv/groups/db")?);
        assert!(session.exists("/inv/groups/dbx")?);

        Ok(())
    }

    #[test]
    fn read_only_session_rejects_writes() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        let session = connector.read_only()?;

        let result = session.create_path("/inv", b"", true);
        assert!(matches!(result, Err(StoreError::ReadOnly { .. })));
        assert!(connector.snapshot().is_empty());

        Ok(())
    }

    #[test]
    fn sessions_are_counted_until_released() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        let first = connector.read_only()?;
        let second = connector.read_write()?;
        assert_eq!(connector.open_sessions(), 2);

        first.close()?;
        assert_eq!(connector.open_sessions(), 1);

        drop(second);
        assert_eq!(connector.open_sessions(), 0);
        assert_eq!(connector.sessions_opened(), 2);

        Ok(())
    }

    #[test]
    fn removal_after_listing_fires_once() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        let session = connector.read_write()?;
        session.create_path("/inv/hosts/pg01/region", b"eu", true)?;
        session.create_path("/inv/hosts/pg02", b"", true)?;
        connector.remove_after_listing("/inv/hosts/pg01", "/inv/hosts/pg01/region");

        session.list_children("/inv/hosts")?;
        assert!(session.exists("/inv/hosts/pg01/region")?);

        let result = session.list_children("/inv/hosts/pg01")?;
        assert_eq!(result, BTreeSet::from(["region".to_string()]));
        assert!(!session.exists("/inv/hosts/pg01/region")?);

        session.create("/inv/hosts/pg01/region", b"us")?;
        session.list_children("/inv/hosts/pg01")?;
        assert!(session.exists("/inv/hosts/pg01/region")?);

        Ok(())
    }

    #[test]
    fn injected_disconnect_fails_later_requests() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        connector.disconnect_after(2);
        let session = connector.read_write()?;
        session.create_path("/inv", b"", true)?;

        let result = session.exists("/inv");
        assert!(matches!(
            result,
            Err(StoreError::Request {
                source: ZkError::ConnectionLoss,
                ..
            })
        ));

        connector.reconnect();
        assert!(session.exists("/inv")?);

        Ok(())
    }
}
