// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! INI inventory layout.
//!
//! ```ini
//! [db]
//! pg01
//! pg02
//!
//! [hostvars:pg01]
//! region = eu
//! motd = " hello\nworld "
//! ```
//!
//! Every plain section is a group whose keys are its member hosts. Sections
//! prefixed with `hostvars:` carry the variables of the named host. Lines
//! starting with `#` or `;` are comments. Entries may be written as `key`,
//! `key = value`, or `key: value`. Inside `hostvars:` sections a key is split
//! at its first `=` when the line has one, so variable names may hold `:`.
//!
//! Values are trimmed unless double quoted. Quoted values understand the
//! escapes `\\`, `\"`, `\n`, `\r` and `\t`. Writing quotes any value that
//! would not survive a plain read back.

use crate::inventory::{AutomationInventory, GroupEntry};

use std::{
    borrow::Cow,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::warn;

/// Section name prefix of host variable sections.
pub const HOSTVARS_PREFIX: &str = "hostvars:";

/// Parsed INI document, in file order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

/// Single `[name]` section with its entries.
///
/// Entry values are held unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<(String, Option<String>)>,
}

impl IniDocument {
    /// Sections in file order.
    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }
}

impl IniSection {
    fn holds_hostvars(&self) -> bool {
        self.name.starts_with(HOSTVARS_PREFIX)
    }
}

impl Display for IniDocument {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (idx, section) in self.sections.iter().enumerate() {
            if idx > 0 {
                writeln!(fmt)?;
            }

            writeln!(fmt, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                match value {
                    Some(value) => writeln!(fmt, "{key} = {}", encode_value(value))?,
                    None => writeln!(fmt, "{key}")?,
                }
            }
        }

        Ok(())
    }
}

impl FromStr for IniDocument {
    type Err = IniError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut sections: Vec<IniSection> = Vec::new();

        for (idx, line) in data.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| IniError::syntax(line_no, "section header lacks closing ']'"))?
                    .trim();
                if name.is_empty() {
                    return Err(IniError::syntax(line_no, "empty section name"));
                }

                sections.push(IniSection {
                    name: name.into(),
                    entries: Vec::new(),
                });
                continue;
            }

            let section = sections
                .last_mut()
                .ok_or_else(|| IniError::syntax(line_no, "entry outside of any section"))?;
            let split = if section.holds_hostvars() {
                line.split_once('=').or_else(|| line.split_once(':'))
            } else {
                line.split_once(['=', ':'])
            };
            let (key, value) = match split {
                Some((key, value)) => (key.trim(), Some(decode_value(value.trim(), line_no)?)),
                None => (line, None),
            };
            if key.is_empty() {
                return Err(IniError::syntax(line_no, "empty key"));
            }
            section.entries.push((key.to_owned(), value));
        }

        Ok(Self { sections })
    }
}

impl TryFrom<&AutomationInventory> for IniDocument {
    type Error = IniError;

    fn try_from(document: &AutomationInventory) -> Result<Self, Self::Error> {
        let mut sections = Vec::new();

        for (group, entry) in &document.groups {
            check_group(group)?;
            let mut entries = Vec::new();
            for host in &entry.hosts {
                check_key("host", host, &['=', ':'])?;
                entries.push((host.clone(), None));
            }
            sections.push(IniSection {
                name: group.clone(),
                entries,
            });
        }

        for (host, vars) in &document.meta.hostvars {
            check_key("host", host, &['=', ':'])?;
            let mut entries = Vec::new();
            for (var, value) in vars {
                check_key("variable", var, &['='])?;
                entries.push((var.clone(), Some(value.clone())));
            }
            sections.push(IniSection {
                name: format!("{HOSTVARS_PREFIX}{host}"),
                entries,
            });
        }

        Ok(Self { sections })
    }
}

impl From<IniDocument> for AutomationInventory {
    fn from(ini: IniDocument) -> Self {
        let mut document = AutomationInventory::default();

        for section in ini.sections {
            if let Some(host) = section.name.strip_prefix(HOSTVARS_PREFIX) {
                let vars = document.meta.hostvars.entry(host.trim().to_owned()).or_default();
                for (var, value) in section.entries {
                    vars.insert(var, value.unwrap_or_default());
                }
                continue;
            }

            let entry: &mut GroupEntry = document.groups.entry(section.name.clone()).or_default();
            for (host, value) in section.entries {
                if value.is_some() {
                    warn!("ignore inline value of host {host} in group {}", section.name);
                }

                if !entry.hosts.contains(&host) {
                    entry.hosts.push(host);
                }
            }
        }

        document
    }
}

fn check_group(name: &str) -> Result<(), IniError> {
    if name.starts_with(HOSTVARS_PREFIX) {
        return Err(IniError::unrepresentable("group", name, "collides with hostvars sections"));
    }

    if name.contains(['\n', '\r']) {
        return Err(IniError::unrepresentable("group", name, "contains a line break"));
    }

    if name.trim() != name {
        return Err(IniError::unrepresentable("group", name, "has surrounding whitespace"));
    }

    Ok(())
}

fn check_key(kind: &'static str, name: &str, separators: &[char]) -> Result<(), IniError> {
    let reason = if name.contains(['\n', '\r']) {
        "contains a line break"
    } else if name.starts_with(['#', ';', '[']) {
        "starts like a comment or section header"
    } else if name.contains(separators) {
        "contains a key separator"
    } else if name.trim() != name {
        "has surrounding whitespace"
    } else {
        return Ok(());
    };

    Err(IniError::unrepresentable(kind, name, reason))
}

fn encode_value(value: &str) -> Cow<'_, str> {
    let plain = !value.is_empty()
        && value.trim() == value
        && !value.starts_with(['"', '#', ';'])
        && !value.contains(['\n', '\r']);
    if plain {
        return Cow::Borrowed(value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            ch => quoted.push(ch),
        }
    }
    quoted.push('"');

    Cow::Owned(quoted)
}

fn decode_value(raw: &str, line: usize) -> Result<String, IniError> {
    let Some(quoted) = raw.strip_prefix('"') else {
        return Ok(raw.to_owned());
    };
    let inner = quoted
        .strip_suffix('"')
        .ok_or_else(|| IniError::syntax(line, "unterminated quoted value"))?;

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }

        match chars.next() {
            Some('\\') => value.push('\\'),
            Some('"') => value.push('"'),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some(other) => {
                return Err(IniError::syntax(line, format!("unknown escape '\\{other}'")))
            }
            None => return Err(IniError::syntax(line, "unterminated quoted value")),
        }
    }

    Ok(value)
}

/// INI codec failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IniError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("{kind} {name:?} cannot be written as INI: {reason}")]
    Unrepresentable {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
}

impl IniError {
    fn syntax(line: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            reason: reason.into(),
        }
    }

    fn unrepresentable(kind: &'static str, name: &str, reason: &'static str) -> Self {
        Self::Unrepresentable {
            kind,
            name: name.into(),
            reason,
        }
    }
}
