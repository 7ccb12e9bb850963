// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dynamic Ansible inventory kept in a ZooKeeper tree.
//!
//! Hosts, their variables, and the groups they belong to live as nodes of a
//! hierarchical coordination store. Ansible-keeper manages that tree through a
//! compact operation grammar, and serves it back to Ansible as a dynamic
//! inventory document.
//!
//! - [`path`] resolves operation strings into tree locations.
//! - [`store`] is the capability surface over the tree store.
//! - [`inventory`] mutates and queries the inventory tree.
//! - [`format`] bridges the inventory to flat TOML and INI files.
//! - [`config`] loads where the store lives.

pub mod config;
pub mod format;
pub mod inventory;
pub mod path;
pub mod store;

pub use config::{KeeperConfig, StoreSettings};
pub use format::{FileFormat, FormatError};
pub use inventory::{DumpMode, ErrorKind, Inventory, InventoryError, Outcome};
pub use path::{PathResolver, TreeLayout};
pub use store::{Connector, MemoryConnector, StoreError, ZkConnector};
