// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! ZooKeeper backed tree store.
//!
//! Every session is its own client connection to the ensemble, opened on
//! acquisition and closed on release. The ensemble is addressed by a comma
//! separated list of `host:port` pairs.

use crate::{
    config::StoreSettings,
    store::{
        ancestors, child_path, Connector, Result, SessionMode, StoreError, TreeRead, TreeWrite,
    },
};

use std::{collections::BTreeSet, time::Duration};
use tracing::{debug, instrument, trace};
use zookeeper::{Acl, CreateMode, WatchedEvent, Watcher, ZkError, ZooKeeper};

/// Hands out sessions to a ZooKeeper ensemble.
#[derive(Debug, Clone)]
pub struct ZkConnector {
    servers: String,
    timeout: Duration,
}

impl ZkConnector {
    /// Construct new connector from store settings.
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            servers: settings.servers.clone(),
            timeout: Duration::from_millis(settings.session_timeout_ms),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn connect(&self, mode: SessionMode) -> Result<ZkSession> {
        debug!("open {mode:?} session to {}", self.servers);
        let client = ZooKeeper::connect(&self.servers, self.timeout, SessionWatcher).map_err(
            |source| StoreError::Connect {
                servers: self.servers.clone(),
                source,
            },
        )?;

        Ok(ZkSession { client, mode })
    }
}

impl Connector for ZkConnector {
    type Reader = ZkSession;
    type Writer = ZkSession;

    fn read_only(&self) -> Result<Self::Reader> {
        self.connect(SessionMode::ReadOnly)
    }

    fn read_write(&self) -> Result<Self::Writer> {
        self.connect(SessionMode::ReadWrite)
    }
}

/// Live session to a ZooKeeper ensemble.
///
/// The client crate closes the connection on drop as well, so a session lost
/// to an early return is still released.
pub struct ZkSession {
    client: ZooKeeper,
    mode: SessionMode,
}

impl ZkSession {
    fn ensure_writable(&self, path: &str) -> Result<()> {
        match self.mode {
            SessionMode::ReadWrite => Ok(()),
            SessionMode::ReadOnly => Err(StoreError::ReadOnly { path: path.into() }),
        }
    }

    fn create_node(&self, path: &str, value: &[u8]) -> Result<()> {
        trace!("create {path}");
        self.client
            .create(
                path,
                value.to_vec(),
                Acl::open_unsafe().clone(),
                CreateMode::Persistent,
            )
            .map(|_| ())
            .map_err(|err| map_zk_error(path, err))
    }

    fn delete_tree(&self, path: &str) -> Result<()> {
        for child in self.list_children(path)? {
            self.delete_tree(&child_path(path, &child))?;
        }

        trace!("delete {path}");
        self.client
            .delete(path, None)
            .map_err(|err| map_zk_error(path, err))
    }
}

impl TreeRead for ZkSession {
    fn exists(&self, path: &str) -> Result<bool> {
        self.client
            .exists(path, false)
            .map(|stat| stat.is_some())
            .map_err(|err| map_zk_error(path, err))
    }

    fn get_value(&self, path: &str) -> Result<Vec<u8>> {
        self.client
            .get_data(path, false)
            .map(|(data, _)| data)
            .map_err(|err| map_zk_error(path, err))
    }

    fn list_children(&self, path: &str) -> Result<BTreeSet<String>> {
        self.client
            .get_children(path, false)
            .map(|children| children.into_iter().collect())
            .map_err(|err| map_zk_error(path, err))
    }

    fn close(self) -> Result<()> {
        debug!("close {:?} session", self.mode);
        self.client.close().map_err(StoreError::Close)
    }
}

impl TreeWrite for ZkSession {
    fn create_path(&self, path: &str, value: &[u8], with_parents: bool) -> Result<()> {
        self.ensure_writable(path)?;
        if with_parents {
            for ancestor in ancestors(path) {
                match self.create_node(ancestor, &[]) {
                    Ok(()) | Err(StoreError::NodeExists { .. }) => continue,
                    Err(err) => return Err(err),
                }
            }
        }

        self.create_node(path, value)
    }

    fn set_value(&self, path: &str, value: &[u8]) -> Result<()> {
        self.ensure_writable(path)?;
        trace!("set {path}");
        self.client
            .set_data(path, value.to_vec(), None)
            .map(|_| ())
            .map_err(|err| map_zk_error(path, err))
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        self.ensure_writable(path)?;
        if recursive {
            return self.delete_tree(path);
        }

        trace!("delete {path}");
        self.client
            .delete(path, None)
            .map_err(|err| map_zk_error(path, err))
    }
}

/// Log session state changes reported by the client.
struct SessionWatcher;

impl Watcher for SessionWatcher {
    fn handle(&self, event: WatchedEvent) {
        debug!("session event: {event:?}");
    }
}

fn map_zk_error(path: &str, err: ZkError) -> StoreError {
    let path = path.to_owned();
    match err {
        ZkError::NodeExists => StoreError::NodeExists { path },
        ZkError::NoNode => StoreError::NoNode { path },
        ZkError::NotEmpty => StoreError::NotEmpty { path },
        source => StoreError::Request { path, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zk_errors_map_to_node_conditions() {
        let result = map_zk_error("/a", ZkError::NodeExists);
        assert!(matches!(result, StoreError::NodeExists { path } if path == "/a"));

        let result = map_zk_error("/a", ZkError::NoNode);
        assert!(matches!(result, StoreError::NoNode { .. }));

        let result = map_zk_error("/a", ZkError::NotEmpty);
        assert!(matches!(result, StoreError::NotEmpty { .. }));

        let result = map_zk_error("/a", ZkError::ConnectionLoss);
        assert_eq!(result.to_string(), "store request on /a failed");
    }
}
