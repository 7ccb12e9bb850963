// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory path resolution.
//!
//! Turn the compact operation strings accepted on the command line into
//! canonical node locations inside the inventory tree. Nothing in here talks
//! to the store.
//!
//! # Tree Layout
//!
//! Every inventory lives below a single __root__ path, and is split into two
//! flat registries:
//!
//! ```text
//! <root>/hosts/<host>/<var>      variable of a host, value is the node data
//! <root>/groups/<group>/<host>   membership marker, carries no data
//! ```
//!
//! # Grammar
//!
//! | string                        | meaning                               |
//! |-------------------------------|---------------------------------------|
//! | `group`                       | a group                               |
//! | `group:host`                  | membership of host in group           |
//! | `hosts:host`                  | a host on its own                     |
//! | `group:host,var:val,...`      | membership plus variables             |
//! | `groups:old:new`              | group rename                          |
//! | `hosts:old:new`               | host rename                           |

use std::collections::BTreeMap;

/// Keyword that marks the host-only selector and host renames.
pub const HOSTS_KEYWORD: &str = "hosts";

/// Keyword that marks group renames.
pub const GROUPS_KEYWORD: &str = "groups";

/// Key of host variables in the Ansible inventory document, never a group.
pub const META_KEYWORD: &str = "_meta";

/// Layout of the inventory tree below a root path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLayout {
    root: String,
}

impl TreeLayout {
    /// Construct new tree layout.
    ///
    /// Normalizes the root so it always carries a leading slash and never a
    /// trailing one. An empty root means the top of the store.
    pub fn new(root: impl AsRef<str>) -> Self {
        let trimmed = root.as_ref().trim().trim_matches('/');
        let root = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };

        Self { root }
    }

    /// Root path all registries live under.
    pub fn root(&self) -> &str {
        if self.root.is_empty() {
            "/"
        } else {
            self.root.as_str()
        }
    }

    /// Path of the hosts registry.
    pub fn hosts(&self) -> String {
        format!("{}/{HOSTS_KEYWORD}", self.root)
    }

    /// Path of the groups registry.
    pub fn groups(&self) -> String {
        format!("{}/{GROUPS_KEYWORD}", self.root)
    }

    /// Path of a host node.
    pub fn host(&self, host: &str) -> String {
        format!("{}/{host}", self.hosts())
    }

    /// Path of a group node.
    pub fn group(&self, group: &str) -> String {
        format!("{}/{group}", self.groups())
    }

    /// Path of the membership marker of a host inside a group.
    pub fn marker(&self, group: &str, host: &str) -> String {
        format!("{}/{host}", self.group(group))
    }

    /// Path of a variable node of a host.
    pub fn var(&self, host: &str, var: &str) -> String {
        format!("{}/{var}", self.host(host))
    }

    /// Locate a group.
    pub fn group_location(&self, name: impl Into<String>) -> GroupLocation {
        let name = name.into();
        GroupLocation {
            path: self.group(&name),
            name,
        }
    }

    /// Locate a host.
    pub fn host_location(&self, name: impl Into<String>) -> HostLocation {
        let name = name.into();
        HostLocation {
            path: self.host(&name),
            name,
        }
    }

    /// Locate membership of host inside group.
    pub fn member_location(
        &self,
        group: impl Into<String>,
        host: impl Into<String>,
    ) -> MemberLocation {
        let group = self.group_location(group);
        let host = self.host_location(host);
        let marker = format!("{}/{}", group.path, host.name);
        MemberLocation {
            group,
            host,
            marker,
        }
    }
}

/// Location of a group node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLocation {
    pub name: String,
    pub path: String,
}

/// Location of a host node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLocation {
    pub name: String,
    pub path: String,
}

/// Location of a membership marker, plus both sides it links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLocation {
    pub group: GroupLocation,
    pub host: HostLocation,
    pub marker: String,
}

/// Target of show and delete operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `group`
    Group(GroupLocation),

    /// `group:host`
    Member(MemberLocation),

    /// `hosts:host`
    Host(HostLocation),
}

/// Membership plus variable assignments for add and update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVarsSpec {
    pub member: MemberLocation,
    pub vars: BTreeMap<String, String>,
}

/// Rename request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameSpec {
    Host { old: HostLocation, new: HostLocation },
    Group { old: GroupLocation, new: GroupLocation },
}

/// Parse operation strings into tree locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    layout: TreeLayout,
}

impl PathResolver {
    /// Construct new resolver over a tree layout.
    pub fn new(layout: TreeLayout) -> Self {
        Self { layout }
    }

    /// Tree layout used for resolution.
    pub fn layout(&self) -> &TreeLayout {
        &self.layout
    }

    /// Resolve a `group`, `group:host`, or `hosts:host` selector.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError::ExpectedMember`] if more than one colon is given.
    /// - Return [`ParseError::EmptyName`] or [`ParseError::InvalidName`] for
    ///   unusable names.
    pub fn selector(&self, input: &str) -> Result<Selector> {
        let tokens = input.split(':').collect::<Vec<_>>();
        match tokens.as_slice() {
            [group] => Ok(Selector::Group(
                self.layout.group_location(check_group_name(input, group)?),
            )),
            [HOSTS_KEYWORD, host] => Ok(Selector::Host(
                self.layout.host_location(check_name(input, host)?),
            )),
            [group, host] => Ok(Selector::Member(
                self.layout
                    .member_location(check_group_name(input, group)?, check_name(input, host)?),
            )),
            _ => Err(ParseError::ExpectedMember {
                input: input.into(),
            }),
        }
    }

    /// Resolve a strict `group:host` membership.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError::ExpectedMember`] if input is not two names
    ///   joined by a colon.
    pub fn member(&self, input: &str) -> Result<MemberLocation> {
        match input.split(':').collect::<Vec<_>>().as_slice() {
            [group, host] => Ok(self
                .layout
                .member_location(check_group_name(input, group)?, check_name(input, host)?)),
            _ => Err(ParseError::ExpectedMember {
                input: input.into(),
            }),
        }
    }

    /// Resolve `group:host,var1:val1,var2:val2,...`.
    ///
    /// Each variable token is split at its first colon, so values may carry
    /// colons of their own. Later duplicates overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError::ExpectedMember`] if the leading token is not
    ///   `group:host`.
    /// - Return [`ParseError::MalformedVariable`] if a variable token lacks a
    ///   colon.
    pub fn host_vars(&self, input: &str) -> Result<HostVarsSpec> {
        let mut tokens = input.split(',');
        let head = tokens.next().unwrap_or_default();
        let member = match head.split(':').collect::<Vec<_>>().as_slice() {
            [group, host] => self
                .layout
                .member_location(check_group_name(input, group)?, check_name(input, host)?),
            _ => {
                return Err(ParseError::ExpectedMember {
                    input: input.into(),
                })
            }
        };

        let mut vars = BTreeMap::new();
        for token in tokens {
            let (var, value) =
                token
                    .split_once(':')
                    .ok_or_else(|| ParseError::MalformedVariable {
                        input: input.into(),
                        token: token.into(),
                    })?;
            vars.insert(check_name(input, var)?.to_owned(), value.to_owned());
        }

        Ok(HostVarsSpec { member, vars })
    }

    /// Resolve `groups:old:new` or `hosts:old:new`.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError::WrongArity`] unless exactly three tokens are
    ///   given.
    /// - Return [`ParseError::UnknownKeyword`] if the first token is neither
    ///   `hosts` nor `groups`.
    pub fn rename(&self, input: &str) -> Result<RenameSpec> {
        let tokens = input.split(':').collect::<Vec<_>>();
        let [keyword, old, new] = tokens.as_slice() else {
            return Err(ParseError::WrongArity {
                input: input.into(),
            });
        };

        match *keyword {
            HOSTS_KEYWORD => Ok(RenameSpec::Host {
                old: self.layout.host_location(check_name(input, old)?),
                new: self.layout.host_location(check_name(input, new)?),
            }),
            GROUPS_KEYWORD => Ok(RenameSpec::Group {
                old: self.layout.group_location(check_group_name(input, old)?),
                new: self.layout.group_location(check_group_name(input, new)?),
            }),
            _ => Err(ParseError::UnknownKeyword {
                input: input.into(),
            }),
        }
    }
}

/// Check that a host, group, or variable name is a single, non-empty path
/// segment.
///
/// # Errors
///
/// - Return [`ParseError::EmptyName`] if name is blank.
/// - Return [`ParseError::InvalidName`] if name contains a slash.
pub fn check_name<'a>(input: &str, candidate: &'a str) -> Result<&'a str> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(ParseError::EmptyName {
            input: input.into(),
        });
    }

    if candidate.contains('/') {
        return Err(ParseError::InvalidName {
            input: input.into(),
            name: candidate.into(),
        });
    }

    Ok(candidate)
}

/// Check a group name like [`check_name`], also refusing reserved keys of
/// the Ansible inventory document.
///
/// # Errors
///
/// - Return [`ParseError::ReservedName`] if name is `_meta`.
/// - Return any error of [`check_name`].
pub fn check_group_name<'a>(input: &str, candidate: &'a str) -> Result<&'a str> {
    let candidate = check_name(input, candidate)?;
    if candidate == META_KEYWORD {
        return Err(ParseError::ReservedName {
            input: input.into(),
            name: candidate.into(),
        });
    }

    Ok(candidate)
}

/// Malformed operation strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Rename string does not split into exactly three tokens.
    #[error("{input} <-- no valid number of keywords [keyword:keyword1:newkeyword1]")]
    WrongArity { input: String },

    /// Rename string does not start with `hosts` or `groups`.
    #[error("{input} <-- no valid keywords [groups|hosts] found")]
    UnknownKeyword { input: String },

    /// Expected `group:host`.
    #[error("{input} <-- expected [groupname:hostname]")]
    ExpectedMember { input: String },

    /// A host, group, or variable name is empty.
    #[error("{input} <-- empty name")]
    EmptyName { input: String },

    /// A name would escape its registry.
    #[error("{input} <-- name {name:?} must not contain '/'")]
    InvalidName { input: String, name: String },

    /// A group name collides with a reserved inventory key.
    #[error("{input} <-- group name {name:?} is reserved")]
    ReservedName { input: String, name: String },

    /// Variable token is not a `name:value` pair.
    #[error("{input} <-- hostvar {token:?} is not a [var:value] pair")]
    MalformedVariable { input: String, token: String },
}

/// Friendly result alias :3
pub type Result<T, E = ParseError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn resolver() -> PathResolver {
        PathResolver::new(TreeLayout::new("/ansible-test"))
    }

    #[test_case("/ansible-test", "/ansible-test"; "already normalized")]
    #[test_case("ansible-test/", "/ansible-test"; "missing leading slash")]
    #[test_case("//deep/root//", "/deep/root"; "extra slashes")]
    #[test_case("", "/"; "store top")]
    #[test]
    fn tree_layout_normalizes_root(root: &str, expect: &str) {
        pretty_assertions::assert_eq!(TreeLayout::new(root).root(), expect);
    }

    #[test]
    fn tree_layout_builds_registry_paths() {
        let layout = TreeLayout::new("/ansible-test");
        assert_eq!(layout.hosts(), "/ansible-test/hosts");
        assert_eq!(layout.groups(), "/ansible-test/groups");
        assert_eq!(layout.var("pg01", "region"), "/ansible-test/hosts/pg01/region");
        assert_eq!(layout.marker("db", "pg01"), "/ansible-test/groups/db/pg01");

        let top = TreeLayout::new("/");
        assert_eq!(top.host("pg01"), "/hosts/pg01");
    }

    #[test]
    fn selector_resolves_each_form() -> anyhow::Result<()> {
        let resolver = resolver();

        let result = resolver.selector("db")?;
        let expect = Selector::Group(GroupLocation {
            name: "db".into(),
            path: "/ansible-test/groups/db".into(),
        });
        assert_eq!(result, expect);

        let result = resolver.selector("hosts:pg01")?;
        let expect = Selector::Host(HostLocation {
            name: "pg01".into(),
            path: "/ansible-test/hosts/pg01".into(),
        });
        assert_eq!(result, expect);

        let result = resolver.selector("db:pg01")?;
        let expect = Selector::Member(MemberLocation {
            group: GroupLocation {
                name: "db".into(),
                path: "/ansible-test/groups/db".into(),
            },
            host: HostLocation {
                name: "pg01".into(),
                path: "/ansible-test/hosts/pg01".into(),
            },
            marker: "/ansible-test/groups/db/pg01".into(),
        });
        assert_eq!(result, expect);

        Ok(())
    }

    #[test_case("db:pg01:extra"; "too many tokens")]
    #[test_case("db:"; "empty host")]
    #[test_case(":pg01"; "empty group")]
    #[test_case("db:pg/01"; "slash in host")]
    #[test]
    fn selector_rejects_malformed_input(input: &str) {
        assert!(resolver().selector(input).is_err());
    }

    #[test]
    fn member_requires_group_and_host() {
        let result = resolver().member("db");
        let expect = Err(ParseError::ExpectedMember { input: "db".into() });
        assert_eq!(result, expect);
    }

    #[test]
    fn host_vars_splits_variables() -> anyhow::Result<()> {
        let result = resolver().host_vars("db:pg01,region:eu,role:primary,dsn:pg://x:5432")?;

        assert_eq!(result.member.group.name, "db");
        assert_eq!(result.member.host.name, "pg01");
        let expect = BTreeMap::from([
            ("dsn".to_string(), "pg://x:5432".to_string()),
            ("region".to_string(), "eu".to_string()),
            ("role".to_string(), "primary".to_string()),
        ]);
        assert_eq!(result.vars, expect);

        let result = resolver().host_vars("db:pg01")?;
        assert!(result.vars.is_empty());

        Ok(())
    }

    #[test]
    fn host_vars_last_duplicate_wins() -> anyhow::Result<()> {
        let result = resolver().host_vars("db:pg01,role:replica,role:primary")?;
        assert_eq!(result.vars.get("role").map(String::as_str), Some("primary"));
        Ok(())
    }

    #[test]
    fn host_vars_rejects_bare_variable() {
        let result = resolver().host_vars("db:pg01,region");
        let expect = Err(ParseError::MalformedVariable {
            input: "db:pg01,region".into(),
            token: "region".into(),
        });
        assert_eq!(result, expect);
    }

    #[test]
    fn rename_resolves_hosts_and_groups() -> anyhow::Result<()> {
        let result = resolver().rename("hosts:pg01:pg02")?;
        let expect = RenameSpec::Host {
            old: HostLocation {
                name: "pg01".into(),
                path: "/ansible-test/hosts/pg01".into(),
            },
            new: HostLocation {
                name: "pg02".into(),
                path: "/ansible-test/hosts/pg02".into(),
            },
        };
        assert_eq!(result, expect);

        let result = resolver().rename("groups:db:database")?;
        let expect = RenameSpec::Group {
            old: GroupLocation {
                name: "db".into(),
                path: "/ansible-test/groups/db".into(),
            },
            new: GroupLocation {
                name: "database".into(),
                path: "/ansible-test/groups/database".into(),
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test_case("hosts:pg01"; "two tokens")]
    #[test_case("hosts:pg01:pg02:pg03"; "four tokens")]
    #[test_case("groups"; "keyword only")]
    #[test]
    fn rename_rejects_wrong_arity(input: &str) {
        let result = resolver().rename(input);
        let expect = Err(ParseError::WrongArity {
            input: input.into(),
        });
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn rename_rejects_unknown_keyword() {
        let result = resolver().rename("servers:pg01:pg02");
        let expect = Err(ParseError::UnknownKeyword {
            input: "servers:pg01:pg02".into(),
        });
        assert_eq!(result, expect);
        assert_eq!(
            result.unwrap_err().to_string(),
            "servers:pg01:pg02 <-- no valid keywords [groups|hosts] found"
        );
    }

    #[test_case("selector", "_meta"; "group selector")]
    #[test_case("selector", "_meta:pg01"; "member selector")]
    #[test_case("member", "_meta:pg01"; "membership")]
    #[test_case("host_vars", " _meta :pg01,region:eu"; "host vars head")]
    #[test_case("rename", "groups:db:_meta"; "group rename target")]
    #[test_case("rename", "groups:_meta:db"; "group rename source")]
    #[test]
    fn reserved_group_name_is_refused(operation: &str, input: &str) {
        let resolver = resolver();
        let result = match operation {
            "selector" => resolver.selector(input).map(drop),
            "member" => resolver.member(input).map(drop),
            "host_vars" => resolver.host_vars(input).map(drop),
            _ => resolver.rename(input).map(drop),
        };
        let expect = Err(ParseError::ReservedName {
            input: input.into(),
            name: "_meta".into(),
        });
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn reserved_name_only_binds_groups() -> anyhow::Result<()> {
        let result = resolver().selector("hosts:_meta")?;
        assert!(matches!(result, Selector::Host(HostLocation { name, .. }) if name == "_meta"));
        assert_eq!(check_group_name("_metadata", "_metadata"), Ok("_metadata"));

        Ok(())
    }
}
