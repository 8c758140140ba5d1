//! Identity records used for permission evaluation.
//!
//! A [`Principal`] is a numeric id plus a name. [`User`] additionally owns a
//! primary group and any number of secondary groups. Instances are built
//! once per process from OS command output (`id` on Unix, `whoami` on
//! Windows) and cached on the registry.

mod parse;

pub use parse::{parse_unix_id, parse_windows_whoami};

use std::collections::BTreeMap;
use std::process::Command;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: u32,
    pub name: String,
}

impl Principal {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A named group. Equality is by name, case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group(Principal);

impl Group {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self(Principal::new(id, name))
    }

    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.0.name.eq_ignore_ascii_case(&other.0.name)
    }
}

impl Eq for Group {}

/// A user principal with a primary group and secondary group memberships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    principal: Principal,
    group: Group,
    groups: BTreeMap<u32, Group>,
}

impl User {
    pub fn new(uid: u32, name: impl Into<String>) -> Self {
        Self::with_group(uid, name, Group::new(0, "unknown"))
    }

    pub fn with_group(uid: u32, name: impl Into<String>, group: Group) -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(group.id(), group.clone());
        Self {
            principal: Principal::new(uid, name),
            group,
            groups,
        }
    }

    /// Placeholder identity used when the OS probe fails.
    pub fn unknown() -> Self {
        Self::new(0, "unknown")
    }

    pub fn id(&self) -> u32 {
        self.principal.id
    }

    pub fn name(&self) -> &str {
        &self.principal.name
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn set_group(&mut self, group: Group) {
        self.groups.insert(group.id(), group.clone());
        self.group = group;
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.insert(group.id(), group);
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn has_group(&self, id: u32) -> bool {
        self.groups.contains_key(&id)
    }

    /// Membership by name, case-insensitive; a `DOMAIN\name` qualifier on
    /// the probe side is stripped before comparing.
    pub fn has_group_named(&self, name: &str) -> bool {
        let name = name.rsplit('\\').next().unwrap_or(name);
        self.groups
            .values()
            .any(|g| g.name().eq_ignore_ascii_case(name))
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.principal.name == other.principal.name
    }
}

impl Eq for User {}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "uid={}({}) gid={}({})",
            self.id(),
            self.name(),
            self.group.id(),
            self.group.name()
        )
    }
}

/// Run the platform identity command and parse its output. Returns `None`
/// when the command is unavailable or its output is unparseable; callers
/// degrade to [`User::unknown`].
pub(crate) fn probe_local_user() -> Option<User> {
    let output = if cfg!(windows) {
        Command::new("whoami")
            .args(["/user", "/groups", "/fo", "list"])
            .output()
    } else {
        Command::new("id").output()
    };

    let output = match output {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            tracing::warn!(status = ?out.status, "identity probe exited nonzero");
            return None;
        }
        Err(e) => {
            tracing::warn!(?e, "failed to spawn identity probe");
            return None;
        }
    };

    let text = String::from_utf8_lossy(&output.stdout);
    if cfg!(windows) {
        parse_windows_whoami(&text)
    } else {
        parse_unix_id(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_equality_is_case_insensitive() {
        assert_eq!(Group::new(20, "Staff"), Group::new(99, "staff"));
    }

    #[test]
    fn has_group_named_strips_domain_qualifier() {
        let mut user = User::new(1000, "alice");
        user.add_group(Group::new(5, "Users"));
        assert!(user.has_group_named("MACHINE\\Users"));
        assert!(user.has_group_named("users"));
        assert!(!user.has_group_named("wheel"));
    }
}
