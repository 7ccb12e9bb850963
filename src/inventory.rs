// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory tree model.
//!
//! An __inventory__ is a set of hosts, each carrying string variables, sorted
//! into named groups. It is kept as two flat registries inside the store tree
//! that are cross-linked through __membership markers__:
//!
//! ```text
//! <root>/hosts/pg01/region = "eu"
//! <root>/hosts/pg01/role   = "primary"
//! <root>/groups/db/pg01            (marker, no data)
//! ```
//!
//! # Consistency
//!
//! Hosts and groups are unique by name within their registry. A host may be a
//! member of many groups but holds at most one marker per group. Markers may
//! only be created for existing hosts. Integrity is enforced procedurally,
//! with two known gaps that are reported rather than repaired:
//!
//! - Deleting a host on its own leaves markers that reference it in place.
//! - Renaming a host only relinks the first group holding a marker for it.
//!
//! # Sessions
//!
//! Every operation acquires exactly one store session and releases it before
//! returning, whether the operation succeeded, was refused, or failed inside
//! the store. Reads use read-only sessions.
//!
//! # Atomicity
//!
//! Each operation is a sequence of single-node store requests. Existence checks
//! are best effort against concurrent operators, and an operation interrupted
//! half way through leaves its partial effects in the tree.

pub mod mutate;
pub mod read;

pub use mutate::{ImportReport, UpdateReport, UpdateStatus};
pub use read::{AllDump, AutomationInventory, Dump, DumpMode, GroupEntry, HostVars, Meta};

use crate::{
    path::{ParseError, PathResolver, TreeLayout},
    store::{Connector, StoreError, TreeRead},
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::warn;

/// Inventory kept inside a tree store.
#[derive(Debug, Clone)]
pub struct Inventory<C>
where
    C: Connector,
{
    connector: C,
    resolver: PathResolver,
}

impl<C> Inventory<C>
where
    C: Connector,
{
    /// Construct new inventory over a store connector and tree layout.
    pub fn new(connector: C, layout: TreeLayout) -> Self {
        Self {
            connector,
            resolver: PathResolver::new(layout),
        }
    }

    /// Resolver for operation strings against this inventory's layout.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Tree layout of this inventory.
    pub fn layout(&self) -> &TreeLayout {
        self.resolver.layout()
    }

    /// Connector sessions are acquired from.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run operation inside a read-only session.
    pub(crate) fn with_reader<T>(
        &self,
        operation: impl FnOnce(&C::Reader) -> Result<T>,
    ) -> Result<T> {
        let session = self.connector.read_only()?;
        let result = operation(&session);
        release(session, result)
    }

    /// Run operation inside a read-write session.
    pub(crate) fn with_writer<T>(
        &self,
        operation: impl FnOnce(&C::Writer) -> Result<T>,
    ) -> Result<T> {
        let session = self.connector.read_write()?;
        let result = operation(&session);
        release(session, result)
    }
}

// INVARIANT: Session is closed on every exit path, and the operation's own
// failure takes precedence over a failure to close.
fn release<S, T>(session: S, result: Result<T>) -> Result<T>
where
    S: TreeRead,
{
    match (session.close(), result) {
        (Ok(()), result) => result,
        (Err(err), Ok(_)) => Err(err.into()),
        (Err(err), Err(original)) => {
            warn!("failed to close session after error: {err}");
            Err(original)
        }
    }
}

/// Successful inventory operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Host was added to group.
    Added { host: String, group: String },

    /// Membership of host in group was removed.
    ///
    /// The group itself is removed too when the host was its only member.
    DeletedMember {
        host: String,
        group: String,
        group_collapsed: bool,
    },

    /// Group and all its markers were removed.
    DeletedGroup { group: String },

    /// Host and all its variables were removed.
    ///
    /// Lists groups still holding a marker for the removed host.
    DeletedHost { host: String, dangling: Vec<String> },

    /// Variables of a host were updated.
    Updated(UpdateReport),

    /// Host was renamed.
    ///
    /// Only the first group holding a marker for the old name is relinked.
    /// Other groups still holding such a marker are listed as unrelinked.
    RenamedHost {
        old: String,
        new: String,
        relinked: Option<String>,
        unrelinked: Vec<String>,
    },

    /// Group was renamed.
    RenamedGroup { old: String, new: String },

    /// Inventory document was applied.
    Imported(ImportReport),
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Added { host, group } => {
                write!(fmt, "ADDED  ==> host: {host} to group: {group}")
            }
            Self::DeletedMember {
                host,
                group,
                group_collapsed,
            } => {
                write!(fmt, "DELETED ==> host: {host} in group: {group}")?;
                if *group_collapsed {
                    write!(fmt, " (last member, group: {group} deleted)")?;
                }
                Ok(())
            }
            Self::DeletedGroup { group } => write!(fmt, "DELETED ==> group: {group}"),
            Self::DeletedHost { host, dangling } => {
                write!(fmt, "DELETED ==> host: {host}")?;
                if !dangling.is_empty() {
                    write!(fmt, " (still listed in groups: {})", dangling.join(", "))?;
                }
                Ok(())
            }
            Self::Updated(report) => write!(fmt, "{report}"),
            Self::RenamedHost {
                old,
                new,
                relinked,
                unrelinked,
            } => {
                write!(fmt, "RENAMED {old} --> {new}")?;
                if let Some(group) = relinked {
                    write!(fmt, " (in group {group})")?;
                }
                if !unrelinked.is_empty() {
                    write!(
                        fmt,
                        " (NOT RENAMED in groups: {})",
                        unrelinked.join(", ")
                    )?;
                }
                Ok(())
            }
            Self::RenamedGroup { old, new } => write!(fmt, "RENAMED group {old} --> {new}"),
            Self::Imported(report) => write!(fmt, "{report}"),
        }
    }
}

/// Coarse classification of inventory errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation string was malformed.
    Parse,

    /// Referenced host, group, marker, or variable is absent.
    NotFound,

    /// Target of a creation or rename already exists.
    Conflict,

    /// Store connectivity or session failure.
    Store,
}

/// All possible error types for inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Operation string was malformed.
    #[error("ERROR  ==> {0}")]
    Parse(#[from] ParseError),

    /// Host exists already.
    #[error("ERROR  ==> host: {host} exists !!!")]
    HostExists { host: String },

    /// Host is a member of group already.
    #[error("ERROR  ==> host: {host} in group {group} exists !!!")]
    HostExistsInGroup { host: String, group: String },

    /// Host does not exist.
    #[error("ERROR  ==> host: {host} does not exist !!!")]
    HostDoesNotExist { host: String },

    /// Host is not a member of group.
    #[error("ERROR  ==> host: {host} does not exist in group: {group} !!!")]
    HostDoesNotExistInGroup { host: String, group: String },

    /// Group does not exist.
    #[error("ERROR  ==> group: {group} does not exist !!!")]
    GroupDoesNotExist { group: String },

    /// Rename source does not exist.
    #[error("ERROR  ==> could not rename nonexistent path: {path} !!!")]
    PathDoesNotExist { path: String },

    /// Rename target exists already.
    #[error("ERROR  ==> new path already exist: {path} !!!")]
    PathExists { path: String },

    /// Variable listed for a host vanished before it could be checked.
    #[error("ERROR  ==> hostvar: {var} for host {host} does not exist !!!")]
    VariableVanished { host: String, var: String },

    /// Store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl InventoryError {
    /// Classify error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::HostDoesNotExist { .. }
            | Self::HostDoesNotExistInGroup { .. }
            | Self::GroupDoesNotExist { .. }
            | Self::PathDoesNotExist { .. }
            | Self::VariableVanished { .. } => ErrorKind::NotFound,
            Self::HostExists { .. } | Self::HostExistsInGroup { .. } | Self::PathExists { .. } => {
                ErrorKind::Conflict
            }
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Check if error must abort the whole invocation.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Store
    }
}

/// Friendly result alias :3
pub type Result<T, E = InventoryError> = std::result::Result<T, E>;
