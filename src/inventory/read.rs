// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory queries.
//!
//! Every query runs inside a read-only session. Registries that do not exist
//! yet read as empty.

use crate::{
    inventory::{Inventory, InventoryError, Result},
    path::{check_name, Selector, TreeLayout, META_KEYWORD},
    store::{self, Connector, StoreError, TreeRead},
};

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
};
use tracing::{debug, instrument, warn};

/// Variables of a single host, keyed by variable name.
pub type HostVars = BTreeMap<String, String>;

impl<C> Inventory<C>
where
    C: Connector,
{
    /// Check that the store is reachable.
    ///
    /// Opens and releases a read-write session, and reports whether the
    /// inventory root exists yet.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Store`] if no session can be established.
    #[instrument(skip(self), level = "debug")]
    pub fn ping(&self) -> Result<bool> {
        let root = self.layout().root();
        self.with_writer(|session| {
            let exists = session.exists(root)?;
            debug!("inventory root {root} exists: {exists}");
            Ok(exists)
        })
    }

    /// Show variables of the hosts a selector points at.
    ///
    /// A group selector yields every member. Members without a host node are
    /// reported with no variables.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::GroupDoesNotExist`],
    ///   [`InventoryError::HostDoesNotExist`], or
    ///   [`InventoryError::HostDoesNotExistInGroup`] if the target is missing.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self), level = "debug")]
    pub fn show_host_vars(&self, selector: &Selector) -> Result<BTreeMap<String, HostVars>> {
        let layout = self.layout();
        self.with_reader(|session| {
            let mut shown = BTreeMap::new();
            match selector {
                Selector::Group(group) => {
                    if !session.exists(&group.path)? {
                        return Err(InventoryError::GroupDoesNotExist {
                            group: group.name.clone(),
                        });
                    }

                    for host in session.list_children(&group.path)? {
                        let vars = if session.exists(&layout.host(&host))? {
                            host_vars(session, layout, &host)?
                        } else {
                            warn!("group {} lists missing host {host}", group.name);
                            HostVars::new()
                        };
                        shown.insert(host, vars);
                    }
                }
                Selector::Member(member) => {
                    if !session.exists(&member.host.path)? {
                        return Err(InventoryError::HostDoesNotExist {
                            host: member.host.name.clone(),
                        });
                    }

                    if !session.exists(&member.marker)? {
                        return Err(InventoryError::HostDoesNotExistInGroup {
                            host: member.host.name.clone(),
                            group: member.group.name.clone(),
                        });
                    }

                    shown.insert(
                        member.host.name.clone(),
                        host_vars(session, layout, &member.host.name)?,
                    );
                }
                Selector::Host(host) => {
                    if !session.exists(&host.path)? {
                        return Err(InventoryError::HostDoesNotExist {
                            host: host.name.clone(),
                        });
                    }

                    shown.insert(host.name.clone(), host_vars(session, layout, &host.name)?);
                }
            }

            Ok(shown)
        })
    }

    /// Dump registry listing.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self), level = "debug")]
    pub fn dump(&self, mode: DumpMode) -> Result<Dump> {
        let layout = self.layout();
        self.with_reader(|session| {
            let dump = match mode {
                DumpMode::Hosts => {
                    Dump::Hosts(registry(session, &layout.hosts())?.into_iter().collect())
                }
                DumpMode::Groups => {
                    Dump::Groups(registry(session, &layout.groups())?.into_iter().collect())
                }
                DumpMode::All => {
                    let hosts = registry(session, &layout.hosts())?.into_iter().collect();
                    let mut groups = Vec::new();
                    for group in registry(session, &layout.groups())? {
                        let members = session.list_children(&layout.group(&group))?;
                        groups.push(BTreeMap::from([(group, members.into_iter().collect())]));
                    }
                    Dump::All(AllDump { hosts, groups })
                }
            };

            Ok(dump)
        })
    }

    /// Dump the whole inventory in Ansible's dynamic inventory shape.
    ///
    /// A stored group named `_meta` cannot be expressed next to the host
    /// variables, so it is left out with a warning.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self), level = "debug")]
    pub fn automation_dump(&self) -> Result<AutomationInventory> {
        let layout = self.layout();
        self.with_reader(|session| {
            let mut document = AutomationInventory::default();
            for group in registry(session, &layout.groups())? {
                if group == META_KEYWORD {
                    warn!("leave out group {group}, its name is reserved");
                    continue;
                }

                let hosts = session.list_children(&layout.group(&group))?;
                document.groups.insert(
                    group,
                    GroupEntry {
                        hosts: hosts.into_iter().collect(),
                        vars: BTreeMap::new(),
                    },
                );
            }

            for host in registry(session, &layout.hosts())? {
                let vars = host_vars(session, layout, &host)?;
                document.meta.hostvars.insert(host, vars);
            }

            Ok(document)
        })
    }

    /// Variables of a single host for Ansible's `--host` call.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Parse`] if host is not a usable name.
    /// - Return [`InventoryError::HostDoesNotExist`] if host is missing.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self), level = "debug")]
    pub fn single_host_dump(&self, host: &str) -> Result<HostVars> {
        let host = check_name(host, host)?;
        let layout = self.layout();
        self.with_reader(|session| {
            if !session.exists(&layout.host(host))? {
                return Err(InventoryError::HostDoesNotExist { host: host.into() });
            }

            Ok(host_vars(session, layout, host)?)
        })
    }
}

/// Names below a registry node, or nothing if the registry is missing.
pub(crate) fn registry<S>(session: &S, path: &str) -> store::Result<BTreeSet<String>>
where
    S: TreeRead,
{
    match session.list_children(path) {
        Ok(names) => Ok(names),
        Err(StoreError::NoNode { .. }) => Ok(BTreeSet::new()),
        Err(err) => Err(err),
    }
}

/// Read every variable of a host.
pub(crate) fn host_vars<S>(session: &S, layout: &TreeLayout, host: &str) -> store::Result<HostVars>
where
    S: TreeRead,
{
    let mut vars = HostVars::new();
    for var in session.list_children(&layout.host(host))? {
        let value = session.get_value(&layout.var(host, &var))?;
        vars.insert(var, String::from_utf8_lossy(&value).into_owned());
    }

    Ok(vars)
}

/// Groups holding a marker for host, in name order.
pub(crate) fn groups_holding<S>(
    session: &S,
    layout: &TreeLayout,
    host: &str,
) -> store::Result<Vec<String>>
where
    S: TreeRead,
{
    let mut groups = Vec::new();
    for group in registry(session, &layout.groups())? {
        if session.exists(&layout.marker(&group, host))? {
            groups.push(group);
        }
    }

    Ok(groups)
}

/// Registry listing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    Hosts,
    Groups,
    All,
}

impl FromStr for DumpMode {
    type Err = String;

    fn from_str(data: &str) -> std::result::Result<Self, Self::Err> {
        match data {
            "hosts" => Ok(Self::Hosts),
            "groups" => Ok(Self::Groups),
            "all" => Ok(Self::All),
            _ => Err(format!("{data} <-- expected [all|groups|hosts]")),
        }
    }
}

/// Registry listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Dump {
    Hosts(Vec<String>),
    Groups(Vec<String>),
    All(AllDump),
}

/// Both registries, with the members of every group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllDump {
    pub hosts: Vec<String>,
    pub groups: Vec<BTreeMap<String, Vec<String>>>,
}

/// Ansible dynamic inventory document.
///
/// ```json
/// {
///   "db": { "hosts": ["pg01"], "vars": {} },
///   "_meta": { "hostvars": { "pg01": { "region": "eu" } } }
/// }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationInventory {
    #[serde(flatten)]
    pub groups: BTreeMap<String, GroupEntry>,

    #[serde(rename = "_meta", default)]
    pub meta: Meta,
}

/// Group entry of an Ansible dynamic inventory document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

/// Reserved `_meta` entry of an Ansible dynamic inventory document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub hostvars: BTreeMap<String, HostVars>,
}
