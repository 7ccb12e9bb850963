// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory mutation protocol.
//!
//! Add, delete, update, rename, and import operations over the inventory tree.
//! Each operation checks its preconditions, refuses with a descriptive
//! [`InventoryError`] when they do not hold, and otherwise applies its effects
//! one node at a time inside a single read-write session.

use crate::{
    inventory::{
        read::{groups_holding, AutomationInventory},
        Inventory, InventoryError, Outcome, Result,
    },
    path::{check_group_name, check_name, HostVarsSpec, MemberLocation, RenameSpec, Selector},
    store::{Connector, TreeRead, TreeWrite},
};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{info, instrument, warn};

impl<C> Inventory<C>
where
    C: Connector,
{
    /// Add new host with variables to group.
    ///
    /// Creates the host node, its membership marker, and one child per
    /// variable. The group is created on demand.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::HostExists`] if host exists already.
    /// - Return [`InventoryError::HostExistsInGroup`] if a marker for host
    ///   exists in group already.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self, spec), level = "debug")]
    pub fn add_host(&self, spec: &HostVarsSpec) -> Result<Outcome> {
        let member = &spec.member;
        self.with_writer(|session| {
            if session.exists(&member.host.path)? {
                return Err(InventoryError::HostExists {
                    host: member.host.name.clone(),
                });
            }

            if session.exists(&member.marker)? {
                return Err(InventoryError::HostExistsInGroup {
                    host: member.host.name.clone(),
                    group: member.group.name.clone(),
                });
            }

            session.create_path(&member.host.path, &[], true)?;
            session.create_path(&member.marker, &[], true)?;
            for (var, value) in &spec.vars {
                session.create(&self.layout().var(&member.host.name, var), value.as_bytes())?;
            }

            info!(
                "add host {} with {} hostvars to group {}",
                member.host.name,
                spec.vars.len(),
                member.group.name
            );

            Ok(Outcome::Added {
                host: member.host.name.clone(),
                group: member.group.name.clone(),
            })
        })
    }

    /// Add existing host to group.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::HostExistsInGroup`] if host is a member of
    ///   group already.
    /// - Return [`InventoryError::HostDoesNotExist`] if host was never added.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self, member), level = "debug")]
    pub fn add_to_group(&self, member: &MemberLocation) -> Result<Outcome> {
        self.with_writer(|session| {
            if session.exists(&member.marker)? {
                return Err(InventoryError::HostExistsInGroup {
                    host: member.host.name.clone(),
                    group: member.group.name.clone(),
                });
            }

            if !session.exists(&member.host.path)? {
                return Err(InventoryError::HostDoesNotExist {
                    host: member.host.name.clone(),
                });
            }

            session.create_path(&member.marker, &[], true)?;
            info!(
                "add host {} to group {}",
                member.host.name, member.group.name
            );

            Ok(Outcome::Added {
                host: member.host.name.clone(),
                group: member.group.name.clone(),
            })
        })
    }

    /// Delete membership, group, or host.
    ///
    /// - `group:host` removes the marker. If the host was the only member,
    ///   the whole group goes with it.
    /// - `group` removes the group and its markers. Hosts stay untouched.
    /// - `hosts:host` removes the host and its variables. Markers referencing
    ///   the host in any group stay behind and are reported.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::HostDoesNotExist`],
    ///   [`InventoryError::HostDoesNotExistInGroup`], or
    ///   [`InventoryError::GroupDoesNotExist`] if the target is missing.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self), level = "debug")]
    pub fn delete(&self, selector: &Selector) -> Result<Outcome> {
        match selector {
            Selector::Member(member) => self.with_writer(|session| {
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

                // INVARIANT: Never leave an empty group behind implicitly.
                let group_collapsed = session.list_children(&member.group.path)?.len() == 1;
                if group_collapsed {
                    session.delete(&member.group.path, true)?;
                    info!(
                        "delete group {} along with its last host {}",
                        member.group.name, member.host.name
                    );
                } else {
                    session.delete(&member.marker, true)?;
                    info!(
                        "delete host {} from group {}",
                        member.host.name, member.group.name
                    );
                }

                Ok(Outcome::DeletedMember {
                    host: member.host.name.clone(),
                    group: member.group.name.clone(),
                    group_collapsed,
                })
            }),
            Selector::Group(group) => self.with_writer(|session| {
                if !session.exists(&group.path)? {
                    return Err(InventoryError::GroupDoesNotExist {
                        group: group.name.clone(),
                    });
                }

                session.delete(&group.path, true)?;
                info!("delete group {}", group.name);

                Ok(Outcome::DeletedGroup {
                    group: group.name.clone(),
                })
            }),
            Selector::Host(host) => self.with_writer(|session| {
                if !session.exists(&host.path)? {
                    return Err(InventoryError::HostDoesNotExist {
                        host: host.name.clone(),
                    });
                }

                session.delete(&host.path, true)?;
                info!("delete host {}", host.name);

                let dangling = groups_holding(session, self.layout(), &host.name)?;
                if !dangling.is_empty() {
                    warn!(
                        "groups {} still list deleted host {}",
                        dangling.join(", "),
                        host.name
                    );
                }

                Ok(Outcome::DeletedHost {
                    host: host.name.clone(),
                    dangling,
                })
            }),
        }
    }

    /// Update existing variables of host.
    ///
    /// Requested variables the host does not carry are skipped, never created.
    /// Variables absent from the request are never touched. The group part of
    /// the request is not consulted.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::HostDoesNotExist`] if host is missing.
    /// - Return [`InventoryError::VariableVanished`] if a listed variable
    ///   disappears before it can be checked.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self, spec), level = "debug")]
    pub fn update(&self, spec: &HostVarsSpec) -> Result<Outcome> {
        let host = &spec.member.host;
        self.with_writer(|session| {
            if !session.exists(&host.path)? {
                return Err(InventoryError::HostDoesNotExist {
                    host: host.name.clone(),
                });
            }

            let existing = session.list_children(&host.path)?;
            for var in &existing {
                if !session.exists(&self.layout().var(&host.name, var))? {
                    return Err(InventoryError::VariableVanished {
                        host: host.name.clone(),
                        var: var.clone(),
                    });
                }
            }

            let mut report = UpdateReport::new(host.name.clone());
            for (var, value) in &spec.vars {
                if existing.contains(var) {
                    session.set_value(&self.layout().var(&host.name, var), value.as_bytes())?;
                    report.updated.insert(var.clone(), value.clone());
                } else {
                    report.skipped.push(var.clone());
                }
            }

            info!(
                "update host {}: {} updated, {} skipped",
                host.name,
                report.updated.len(),
                report.skipped.len()
            );

            Ok(Outcome::Updated(report))
        })
    }

    /// Rename host or group.
    ///
    /// A renamed host keeps all of its variables. Only the first group (in
    /// name order) holding a marker for the old host name gets its marker
    /// moved over, any further group keeps pointing at the old name and is
    /// reported as unrelinked.
    ///
    /// A renamed group keeps all of its members.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::PathDoesNotExist`] if old name is missing.
    /// - Return [`InventoryError::PathExists`] if new name is taken.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self), level = "debug")]
    pub fn rename(&self, spec: &RenameSpec) -> Result<Outcome> {
        let (old_path, new_path) = match spec {
            RenameSpec::Host { old, new } => (&old.path, &new.path),
            RenameSpec::Group { old, new } => (&old.path, &new.path),
        };

        self.with_writer(|session| {
            if !session.exists(old_path)? {
                return Err(InventoryError::PathDoesNotExist {
                    path: old_path.clone(),
                });
            }

            if session.exists(new_path)? {
                return Err(InventoryError::PathExists {
                    path: new_path.clone(),
                });
            }

            match spec {
                RenameSpec::Host { old, new } => {
                    let layout = self.layout();
                    let vars = session.list_children(&old.path)?;
                    if vars.is_empty() {
                        session.create_path(&new.path, &[], true)?;
                    } else {
                        let mut values = BTreeMap::new();
                        for var in &vars {
                            values.insert(var, session.get_value(&layout.var(&old.name, var))?);
                        }

                        session.create_path(&new.path, &[], true)?;
                        for (var, value) in &values {
                            session.create(&layout.var(&new.name, var), value)?;
                        }
                    }

                    // INVARIANT: Relink the first group holding the old marker only.
                    let mut relinked = None;
                    let mut unrelinked = Vec::new();
                    for group in groups_holding(session, layout, &old.name)? {
                        if relinked.is_some() {
                            unrelinked.push(group);
                            continue;
                        }

                        let new_marker = layout.marker(&group, &new.name);
                        if !session.exists(&new_marker)? {
                            session.create_path(&new_marker, &[], true)?;
                        }
                        session.delete(&layout.marker(&group, &old.name), false)?;
                        info!("relink host {} --> {} in group {group}", old.name, new.name);
                        relinked = Some(group);
                    }

                    if !unrelinked.is_empty() {
                        warn!(
                            "groups {} still list renamed host {}",
                            unrelinked.join(", "),
                            old.name
                        );
                    }

                    session.delete(&old.path, true)?;
                    info!("rename host {} --> {}", old.name, new.name);

                    Ok(Outcome::RenamedHost {
                        old: old.name.clone(),
                        new: new.name.clone(),
                        relinked,
                        unrelinked,
                    })
                }
                RenameSpec::Group { old, new } => {
                    let members = session.list_children(&old.path)?;
                    session.create_path(&new.path, &[], true)?;
                    for member in &members {
                        session.create(&self.layout().marker(&new.name, member), &[])?;
                    }

                    session.delete(&old.path, true)?;
                    info!(
                        "rename group {} --> {} with {} members",
                        old.name,
                        new.name,
                        members.len()
                    );

                    Ok(Outcome::RenamedGroup {
                        old: old.name.clone(),
                        new: new.name.clone(),
                    })
                }
            }
        })
    }

    /// Apply inventory document to the tree.
    ///
    /// Missing groups, hosts, and markers are created, existing ones are left
    /// alone. Host variables are created when missing and overwritten when
    /// present. Hosts listed only under `_meta.hostvars` are created as well.
    /// Group variables have no place in the tree and are ignored.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Parse`] if a name in the document cannot be
    ///   used as a node name, before anything is written.
    /// - Return [`InventoryError::Store`] if the store fails.
    #[instrument(skip(self, document), level = "debug")]
    pub fn import(&self, document: &AutomationInventory) -> Result<Outcome> {
        check_document(document)?;
        let layout = self.layout();
        self.with_writer(|session| {
            let mut report = ImportReport::default();

            for (group, entry) in &document.groups {
                let group = check_group_name(group, group)?;
                if ensure_node(session, &layout.group(group))? {
                    report.groups_created += 1;
                }

                if !entry.vars.is_empty() {
                    warn!("ignore {} group vars of group {group}", entry.vars.len());
                }

                for host in &entry.hosts {
                    let host = check_name(host, host)?;
                    if ensure_node(session, &layout.host(host))? {
                        report.hosts_created += 1;
                    }
                    if ensure_node(session, &layout.marker(group, host))? {
                        report.markers_created += 1;
                    }
                }
            }

            for (host, vars) in &document.meta.hostvars {
                let host = check_name(host, host)?;
                if ensure_node(session, &layout.host(host))? {
                    report.hosts_created += 1;
                }

                for (var, value) in vars {
                    let var = check_name(var, var)?;
                    let path = layout.var(host, var);
                    if session.exists(&path)? {
                        session.set_value(&path, value.as_bytes())?;
                        report.vars_updated += 1;
                    } else {
                        session.create(&path, value.as_bytes())?;
                        report.vars_created += 1;
                    }
                }
            }

            info!("{report}");
            Ok(Outcome::Imported(report))
        })
    }
}

fn check_document(document: &AutomationInventory) -> Result<()> {
    for (group, entry) in &document.groups {
        check_group_name(group, group)?;
        for host in &entry.hosts {
            check_name(host, host)?;
        }
    }

    for (host, vars) in &document.meta.hostvars {
        check_name(host, host)?;
        for var in vars.keys() {
            check_name(var, var)?;
        }
    }

    Ok(())
}

// INVARIANT: Create node with parents if and only if it is missing.
fn ensure_node<S>(session: &S, path: &str) -> Result<bool>
where
    S: TreeWrite,
{
    if session.exists(path)? {
        return Ok(false);
    }

    session.create_path(path, &[], true)?;
    Ok(true)
}

/// Overall result of a variable update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Every requested variable was updated.
    Updated,

    /// Some requested variables were updated, the rest do not exist.
    Partial,

    /// None of the requested variables exist.
    NotUpdated,
}

/// Report of a variable update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Name of updated host.
    pub host: String,

    /// Variables that were overwritten with their new value.
    pub updated: BTreeMap<String, String>,

    /// Requested variables that do not exist on host.
    pub skipped: Vec<String>,
}

impl UpdateReport {
    /// Construct new empty report for host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            updated: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Classify the update.
    pub fn status(&self) -> UpdateStatus {
        match (self.updated.is_empty(), self.skipped.is_empty()) {
            (_, true) => UpdateStatus::Updated,
            (true, false) => UpdateStatus::NotUpdated,
            (false, false) => UpdateStatus::Partial,
        }
    }
}

impl Display for UpdateReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let updated = self
            .updated
            .iter()
            .map(|(var, value)| format!("{var}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        let skipped = self.skipped.join(", ");
        let host = &self.host;

        match self.status() {
            UpdateStatus::Updated => {
                write!(fmt, "UPDATED  ==> host: {host} with new hostvars {{{updated}}}")
            }
            UpdateStatus::Partial => write!(
                fmt,
                "UPDATED  ==> host: {host} with new hostvars {{{updated}}} \
                 ===> NOT UPDATED hostvars [{skipped}] which do not exist"
            ),
            UpdateStatus::NotUpdated => write!(
                fmt,
                "NOT UPDATED  ==> host: {host} with no existing hostvars \
                 ===> NOT UPDATED hostvars [{skipped}] which do not exist"
            ),
        }
    }
}

/// Report of an inventory import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub groups_created: usize,
    pub hosts_created: usize,
    pub markers_created: usize,
    pub vars_created: usize,
    pub vars_updated: usize,
}

impl Display for ImportReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "IMPORTED ==> groups: {} new, hosts: {} new, memberships: {} new, \
             hostvars: {} new {} updated",
            self.groups_created,
            self.hosts_created,
            self.markers_created,
            self.vars_created,
            self.vars_updated
        )
    }
}
