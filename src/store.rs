// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree store client.
//!
//! Minimal capability surface over the hierarchical coordination store that
//! holds the inventory tree. Everything above this module only ever sees
//! [`TreeRead`], [`TreeWrite`], and [`Connector`], so the inventory logic can
//! run against a live ZooKeeper ensemble or an in-process tree alike.
//!
//! # Sessions
//!
//! A session is acquired per operation and released when that operation is
//! over, no matter how it ended. Pure reads acquire a read-only session, any
//! mutation acquires a read-write one. Sessions are never cached or shared
//! between operations.
//!
//! # Atomicity
//!
//! The store only guarantees atomicity per node. Composite operations built on
//! top of this surface can be interrupted half way through.

pub mod memory;
pub mod zk;

pub use memory::{MemoryConnector, MemorySession};
pub use zk::{ZkConnector, ZkSession};

use std::collections::BTreeSet;

/// Session access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    ReadOnly,
    ReadWrite,
}

/// Read access to the store tree.
pub trait TreeRead {
    /// Check if node exists.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Read value stored at node.
    fn get_value(&self, path: &str) -> Result<Vec<u8>>;

    /// List names of the direct children of node.
    fn list_children(&self, path: &str) -> Result<BTreeSet<String>>;

    /// Release the session.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Write access to the store tree.
pub trait TreeWrite: TreeRead {
    /// Create node with value.
    ///
    /// When `with_parents` is set, missing intermediate nodes are created with
    /// an empty value.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NodeExists`] if the node already exists.
    fn create_path(&self, path: &str, value: &[u8], with_parents: bool) -> Result<()>;

    /// Create leaf node with value.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NodeExists`] if the node already exists.
    /// - Return [`StoreError::NoNode`] if the parent is missing.
    fn create(&self, path: &str, value: &[u8]) -> Result<()> {
        self.create_path(path, value, false)
    }

    /// Overwrite value stored at node.
    fn set_value(&self, path: &str, value: &[u8]) -> Result<()>;

    /// Delete node.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotEmpty`] if node has children and `recursive`
    ///   is unset.
    fn delete(&self, path: &str, recursive: bool) -> Result<()>;
}

/// Layer of indirection for session acquisition.
pub trait Connector {
    /// Session handed out for pure reads.
    type Reader: TreeRead;

    /// Session handed out for mutations.
    type Writer: TreeWrite;

    /// Acquire read-only session.
    fn read_only(&self) -> Result<Self::Reader>;

    /// Acquire read-write session.
    fn read_write(&self) -> Result<Self::Writer>;
}

/// Split a path into its ancestors, shallowest first, excluding the path
/// itself.
pub(crate) fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .map(|(idx, _)| &path[..idx])
        .filter(|ancestor| !ancestor.is_empty())
        .collect()
}

/// Join a child name onto a parent path.
pub(crate) fn child_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// All possible error types for store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Session could not be established.
    #[error("failed to connect to store at {servers}")]
    Connect {
        servers: String,
        #[source]
        source: zookeeper::ZkError,
    },

    /// Node targeted for creation already exists.
    #[error("node {path} already exists")]
    NodeExists { path: String },

    /// Node does not exist.
    #[error("node {path} does not exist")]
    NoNode { path: String },

    /// Node still has children.
    #[error("node {path} is not empty")]
    NotEmpty { path: String },

    /// Mutation attempted through a read-only session.
    #[error("read-only session cannot modify {path}")]
    ReadOnly { path: String },

    /// Request failed for connectivity or session reasons.
    #[error("store request on {path} failed")]
    Request {
        path: String,
        #[source]
        source: zookeeper::ZkError,
    },

    /// Session could not be released cleanly.
    #[error("failed to close store session")]
    Close(#[source] zookeeper::ZkError),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
