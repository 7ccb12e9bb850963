// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use ansible_keeper::{
    config::{expand_path, KeeperConfig},
    format::{FileFormat, FormatError},
    inventory::{DumpMode, Inventory, InventoryError},
    path::TreeLayout,
    store::{StoreError, ZkConnector},
};

use anyhow::Result;
use clap::{ArgGroup, Parser, ValueEnum};
use serde::Serialize;
use std::{io::stderr, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    version,
    group(ArgGroup::new("action").required(true).multiple(false))
)]
struct Cli {
    /// Add new host with hostvars to group.
    #[arg(
        short = 'A',
        long = "add",
        group = "action",
        value_name = "group:host,var:value,..."
    )]
    pub add: Option<String>,

    /// Add existing host to group.
    #[arg(short = 'G', long = "add-to-group", group = "action", value_name = "group:host")]
    pub add_to_group: Option<String>,

    /// Delete group, host in group, or host.
    #[arg(
        short = 'D',
        long = "delete",
        group = "action",
        value_name = "group | group:host | hosts:host"
    )]
    pub delete: Option<String>,

    /// Update existing hostvars of host.
    #[arg(
        short = 'U',
        long = "update",
        group = "action",
        value_name = "group:host,var:value,..."
    )]
    pub update: Option<String>,

    /// Rename group or host.
    #[arg(
        short = 'R',
        long = "rename",
        group = "action",
        value_name = "groups:old:new | hosts:old:new"
    )]
    pub rename: Option<String>,

    /// Show hostvars of group, host in group, or host.
    #[arg(
        short = 'S',
        long = "show",
        group = "action",
        value_name = "group | group:host | hosts:host"
    )]
    pub show: Option<String>,

    /// Dump inventory.
    #[arg(short = 'I', long = "inventory", group = "action", value_enum)]
    pub inventory: Option<InventoryMode>,

    /// Dump hostvars of a single host.
    #[arg(long, group = "action", value_name = "hostname")]
    pub host: Option<String>,

    /// Import inventory from TOML file.
    #[arg(long, group = "action", value_name = "path")]
    pub import_toml: Option<PathBuf>,

    /// Export inventory to TOML file.
    #[arg(long, group = "action", value_name = "path")]
    pub export_toml: Option<PathBuf>,

    /// Import inventory from INI file.
    #[arg(long, group = "action", value_name = "path")]
    pub import_ini: Option<PathBuf>,

    /// Export inventory to INI file.
    #[arg(long, group = "action", value_name = "path")]
    pub export_ini: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(long, value_name = "path")]
    pub config: Option<String>,

    /// Comma separated list of ZooKeeper servers.
    #[arg(long, value_name = "host:port,...")]
    pub servers: Option<String>,

    /// Root path of the inventory tree.
    #[arg(long, value_name = "path")]
    pub root: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InventoryMode {
    /// Hosts, groups, and the members of each group.
    All,

    /// Group names.
    Groups,

    /// Host names.
    Hosts,

    /// Ansible dynamic inventory document.
    Ansible,
}

impl Cli {
    fn load_config(&self) -> Result<KeeperConfig> {
        let mut config = match &self.config {
            Some(path) => KeeperConfig::load(expand_path(path)?)?,
            None => KeeperConfig::load_default()?,
        };

        if let Some(servers) = &self.servers {
            config.store.servers = servers.clone();
        }

        if let Some(root) = &self.root {
            config.store.root = root.clone();
        }

        Ok(config)
    }

    fn run(self) -> Result<()> {
        let config = self.load_config()?;
        let inventory = Inventory::new(
            ZkConnector::new(&config.store),
            TreeLayout::new(&config.store.root),
        );
        inventory.ping()?;
        let resolver = inventory.resolver();

        if let Some(input) = self.add {
            println!("{}", inventory.add_host(&resolver.host_vars(&input)?)?);
        } else if let Some(input) = self.add_to_group {
            println!("{}", inventory.add_to_group(&resolver.member(&input)?)?);
        } else if let Some(input) = self.delete {
            println!("{}", inventory.delete(&resolver.selector(&input)?)?);
        } else if let Some(input) = self.update {
            println!("{}", inventory.update(&resolver.host_vars(&input)?)?);
        } else if let Some(input) = self.rename {
            println!("{}", inventory.rename(&resolver.rename(&input)?)?);
        } else if let Some(input) = self.show {
            print_json(&inventory.show_host_vars(&resolver.selector(&input)?)?)?;
        } else if let Some(mode) = self.inventory {
            match mode {
                InventoryMode::All => print_json(&inventory.dump(DumpMode::All)?)?,
                InventoryMode::Groups => print_json(&inventory.dump(DumpMode::Groups)?)?,
                InventoryMode::Hosts => print_json(&inventory.dump(DumpMode::Hosts)?)?,
                InventoryMode::Ansible => print_json(&inventory.automation_dump()?)?,
            }
        } else if let Some(host) = self.host {
            print_json(&inventory.single_host_dump(&host)?)?;
        } else if let Some(path) = self.import_toml {
            println!("{}", inventory.import_file(FileFormat::Toml, path)?);
        } else if let Some(path) = self.import_ini {
            println!("{}", inventory.import_file(FileFormat::Ini, path)?);
        } else if let Some(path) = self.export_toml {
            let hosts = inventory.export_file(FileFormat::Toml, &path)?;
            println!("EXPORTED ==> {hosts} hosts to {}", path.display());
        } else if let Some(path) = self.export_ini {
            let hosts = inventory.export_file(FileFormat::Ini, &path)?;
            println!("EXPORTED ==> {hosts} hosts to {}", path.display());
        }

        Ok(())
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn is_fatal(error: &anyhow::Error) -> bool {
    if let Some(error) = error.downcast_ref::<InventoryError>() {
        return error.is_fatal();
    }

    if let Some(error) = error.downcast_ref::<FormatError>() {
        return error.is_fatal();
    }

    error.is::<StoreError>()
}

fn carries_error_banner(error: &anyhow::Error) -> bool {
    error.is::<InventoryError>()
        || matches!(error.downcast_ref::<FormatError>(), Some(FormatError::Inventory(_)))
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    let Err(error) = Cli::parse().run() else {
        exit(0);
    };

    if is_fatal(&error) {
        error!("{error:?}");
        exit(2);
    }

    if carries_error_banner(&error) {
        println!("{error}");
    } else {
        println!("ERROR  ==> {error:#}");
    }

    exit(1)
}
