// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Flat file bridges.
//!
//! Export the inventory tree into a flat file, or import a flat file back into
//! the tree. Two formats are supported, TOML and INI. Both are built purely on
//! top of [`Inventory::automation_dump`] and [`Inventory::import`], so a file
//! always carries the same content as the Ansible dynamic inventory document.
//!
//! # TOML Layout
//!
//! ```toml
//! [db]
//! hosts = ["pg01", "pg02"]
//!
//! [db.vars]
//!
//! [_meta.hostvars.pg01]
//! region = "eu"
//! ```
//!
//! Non-string host variables are accepted on import and stored as their TOML
//! text, e.g. `port = 5432` becomes `"5432"`.
//!
//! # INI Layout
//!
//! See [`ini`].

pub mod ini;

pub use ini::IniDocument;

use crate::{
    inventory::{AutomationInventory, GroupEntry, Inventory, InventoryError, Meta, Outcome},
    store::Connector,
};

use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Supported flat file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Ini,
}

/// Serialize inventory document as TOML.
///
/// # Errors
///
/// - Return [`FormatError::TomlSerialize`] if document cannot be serialized.
pub fn to_toml(document: &AutomationInventory) -> Result<String> {
    Ok(toml::ser::to_string_pretty(document)?)
}

/// Deserialize inventory document from TOML.
///
/// # Errors
///
/// - Return [`FormatError::TomlDeserialize`] if data is not valid TOML or does
///   not have the inventory shape.
pub fn from_toml(data: &str) -> Result<AutomationInventory> {
    let table: toml::Table = toml::de::from_str(data)?;
    let mut document = AutomationInventory::default();

    for (key, value) in table {
        if key == "_meta" {
            let meta: RawMeta = value.try_into()?;
            document.meta = Meta {
                hostvars: meta
                    .hostvars
                    .into_iter()
                    .map(|(host, vars)| (host, stringify(vars)))
                    .collect(),
            };
        } else {
            let group: RawGroup = value.try_into()?;
            document.groups.insert(
                key,
                GroupEntry {
                    hosts: group.hosts,
                    vars: stringify(group.vars),
                },
            );
        }
    }

    Ok(document)
}

/// Serialize inventory document as INI.
///
/// # Errors
///
/// - Return [`FormatError::Ini`] if a group, host, or variable name cannot be
///   expressed in INI.
pub fn to_ini(document: &AutomationInventory) -> Result<String> {
    Ok(IniDocument::try_from(document)?.to_string())
}

/// Deserialize inventory document from INI.
///
/// # Errors
///
/// - Return [`FormatError::Ini`] if data is not valid INI.
pub fn from_ini(data: &str) -> Result<AutomationInventory> {
    Ok(data.parse::<IniDocument>()?.into())
}

#[derive(Debug, Default, Deserialize)]
struct RawGroup {
    #[serde(default)]
    hosts: Vec<String>,

    #[serde(default)]
    vars: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    #[serde(default)]
    hostvars: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

fn stringify(vars: BTreeMap<String, toml::Value>) -> BTreeMap<String, String> {
    vars.into_iter()
        .map(|(var, value)| match value {
            toml::Value::String(value) => (var, value),
            value => (var, value.to_string()),
        })
        .collect()
}

impl<C> Inventory<C>
where
    C: Connector,
{
    /// Export whole inventory into a flat file.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::Inventory`] if inventory cannot be read.
    /// - Return [`FormatError::Ini`] if inventory cannot be expressed in INI.
    /// - Return [`FormatError::Write`] if file cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn export_file(&self, format: FileFormat, path: impl AsRef<Path>) -> Result<usize> {
        let document = self.automation_dump()?;
        let data = match format {
            FileFormat::Toml => to_toml(&document)?,
            FileFormat::Ini => to_ini(&document)?,
        };

        debug!("export {format:?} inventory to {:?}", path.as_ref().display());
        write(path.as_ref(), data.as_bytes()).map_err(|err| FormatError::Write {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        Ok(document.meta.hostvars.len())
    }

    /// Import flat file into inventory.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::Read`] if file cannot be read.
    /// - Return [`FormatError::TomlDeserialize`] or [`FormatError::Ini`] if
    ///   file content is malformed.
    /// - Return [`FormatError::Inventory`] if document cannot be applied.
    #[instrument(skip(self, path), level = "debug")]
    pub fn import_file(&self, format: FileFormat, path: impl AsRef<Path>) -> Result<Outcome> {
        debug!("import {format:?} inventory from {:?}", path.as_ref().display());
        let data = read_to_string(path.as_ref()).map_err(|err| FormatError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        let document = match format {
            FileFormat::Toml => from_toml(&data)?,
            FileFormat::Ini => from_ini(&data)?,
        };

        Ok(self.import(&document)?)
    }
}

/// All possible error types for flat file bridges.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Failed to read flat file.
    #[error("failed to read inventory file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write flat file.
    #[error("failed to write inventory file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize TOML inventory.
    #[error(transparent)]
    TomlDeserialize(#[from] toml::de::Error),

    /// Failed to serialize TOML inventory.
    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),

    /// Malformed or unrepresentable INI inventory.
    #[error(transparent)]
    Ini(#[from] ini::IniError),

    /// Inventory operation failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

impl FormatError {
    /// Check if error must abort the whole invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inventory(err) if err.is_fatal())
    }
}

/// Friendly result alias :3
pub type Result<T, E = FormatError> = std::result::Result<T, E>;
