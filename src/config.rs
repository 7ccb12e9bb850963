// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that tells ansible-keeper
//! where its ZooKeeper ensemble lives, and under which root path the inventory
//! tree is kept. The configuration is loaded once per invocation and handed to
//! every component at construction.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Default comma separated list of ZooKeeper servers.
pub const DEFAULT_SERVERS: &str = "con1:2181,con2:2181,con3:2181";

/// Default root path of the inventory tree.
pub const DEFAULT_ROOT: &str = "/ansible-test";

/// Default session timeout in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 10_000;

/// Ansible-keeper configuration layout.
///
/// # General Layout
///
/// ```toml
/// [store]
/// servers = "con1:2181,con2:2181,con3:2181"
/// root = "/ansible-test"
/// session_timeout_ms = 10000
/// ```
///
/// Both `servers` and `root` go through shell expansion, so they can refer to
/// environment variables.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Coordination store settings.
    #[serde(default)]
    pub store: StoreSettings,
}

impl KeeperConfig {
    /// Load configuration from file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not valid.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        debug!("load configuration from {:?}", path.as_ref().display());
        read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            })?
            .parse()
    }

    /// Load configuration from default location, or fall back to defaults if
    /// no configuration file exists there.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if configuration directory cannot
    ///   be determined.
    /// - Return [`ConfigError::Read`] or [`ConfigError::Deserialize`] if an
    ///   existing file cannot be loaded.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path()?;
        if !path.exists() {
            debug!("no configuration at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load(path)
    }
}

impl FromStr for KeeperConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: KeeperConfig =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on server list and root path.
        config.store.servers = shellexpand::full(config.store.servers.as_str())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();
        config.store.root = shellexpand::full(config.store.root.as_str())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();

        Ok(config)
    }
}

impl Display for KeeperConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Coordination store settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Comma separated `host:port` list of ZooKeeper servers.
    pub servers: String,

    /// Root path that holds the `hosts` and `groups` registries.
    pub root: String,

    /// Session timeout in milliseconds.
    pub session_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            servers: DEFAULT_SERVERS.into(),
            root: DEFAULT_ROOT.into(),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }
}

/// Determine default absolute path to configuration file.
///
/// Uses `$XDG_CONFIG_HOME/ansible-keeper/config.toml`. Does not check if the
/// path returned actually exists.
///
/// # Errors
///
/// - Return [`ConfigError::NoWayHome`] if configuration directory cannot be
///   determined.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("ansible-keeper").join("config.toml"))
        .ok_or(ConfigError::NoWayHome)
}

/// Expand `~` and environment variables in a user supplied path.
///
/// # Errors
///
/// - Return [`ConfigError::ShellExpansion`] if a variable is undefined.
pub fn expand_path(path: impl AsRef<str>) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Cannot determine configuration directory.
    #[error("cannot determine absolute path to user's configuration directory")]
    NoWayHome,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
