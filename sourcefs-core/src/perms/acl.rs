//! ACL-based permission strategy, Windows style.
//!
//! Platforms without POSIX bits express permissions as an ordered list of
//! access-control entries evaluated left to right. "Group" and "other" have
//! no native meaning there; they are emulated by two configurable
//! placeholder principal names. The ACL store is process-local state owned
//! by the disk factory (there is no on-disk ACL format here).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::perms::PermissionManager;
use crate::principal::Group;

/// Placeholder principal names standing in for the POSIX group/other
/// classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclConfig {
    pub group_name: String,
    pub other_name: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            group_name: "Users".to_string(),
            other_name: "Other".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclEntryKind {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclPermission {
    Read,
    Write,
    Execute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclEntry {
    pub principal: String,
    pub kind: AclEntryKind,
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl AclEntry {
    pub fn allow(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            kind: AclEntryKind::Allow,
            read: false,
            write: false,
            execute: false,
        }
    }

    pub fn deny(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            kind: AclEntryKind::Deny,
            read: false,
            write: false,
            execute: false,
        }
    }

    pub fn with(mut self, perm: AclPermission) -> Self {
        self.set(perm, true);
        self
    }

    fn has(&self, perm: AclPermission) -> bool {
        match perm {
            AclPermission::Read => self.read,
            AclPermission::Write => self.write,
            AclPermission::Execute => self.execute,
        }
    }

    fn set(&mut self, perm: AclPermission, value: bool) {
        match perm {
            AclPermission::Read => self.read = value,
            AclPermission::Write => self.write = value,
            AclPermission::Execute => self.execute = value,
        }
    }
}

/// An ordered access-control list. Order is load-bearing: entries are
/// evaluated left to right and mutation inserts at the front.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acl {
    entries: Vec<AclEntry>,
}

impl Acl {
    pub fn new(entries: Vec<AclEntry>) -> Self {
        Self { entries }
    }

    /// Full ALLOW grants for each named principal.
    pub fn allow_all<'a>(principals: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: principals
                .into_iter()
                .map(|p| {
                    AclEntry::allow(p)
                        .with(AclPermission::Read)
                        .with(AclPermission::Write)
                        .with(AclPermission::Execute)
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    /// Evaluate a principal's permission. A DENY entry for the permission
    /// wins over any ALLOW entry, wherever it sits in the list.
    pub fn is_allowed(&self, principal: &str, perm: AclPermission) -> bool {
        let mut allowed = false;
        for entry in &self.entries {
            if entry.principal != principal || !entry.has(perm) {
                continue;
            }
            match entry.kind {
                AclEntryKind::Deny => return false,
                AclEntryKind::Allow => allowed = true,
            }
        }
        allowed
    }

    /// Replace the principal's entry with a freshly built permission set
    /// and move it to the front of the list.
    pub fn set_permission(&mut self, principal: &str, perm: AclPermission, value: bool) {
        let mut entry = AclEntry::allow(principal);
        let mut rest = Vec::with_capacity(self.entries.len());
        for existing in self.entries.drain(..) {
            if existing.principal == principal {
                entry = existing;
            } else {
                rest.push(existing);
            }
        }
        entry.set(perm, value);
        rest.insert(0, entry);
        self.entries = rest;
    }

    /// Ensure the principal has an entry; used when assigning a group.
    pub fn ensure_principal(&mut self, principal: &str) {
        if self.entries.iter().any(|e| e.principal == principal) {
            return;
        }
        self.entries.insert(
            0,
            AclEntry::allow(principal)
                .with(AclPermission::Read)
                .with(AclPermission::Write)
                .with(AclPermission::Execute),
        );
    }
}

/// Process-local ACL documents keyed by path.
#[derive(Default)]
pub struct AclStore {
    acls: Mutex<HashMap<PathBuf, Acl>>,
}

impl AclStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path, default: impl FnOnce() -> Acl) -> Acl {
        let mut acls = self.acls.lock().expect("lock poisoned");
        acls.entry(path.to_path_buf()).or_insert_with(default).clone()
    }

    pub fn update<R>(
        &self,
        path: &Path,
        default: impl FnOnce() -> Acl,
        mutate: impl FnOnce(&mut Acl) -> R,
    ) -> R {
        let mut acls = self.acls.lock().expect("lock poisoned");
        let acl = acls.entry(path.to_path_buf()).or_insert_with(default);
        mutate(acl)
    }
}

/// [`PermissionManager`] over an [`AclStore`] document.
pub struct AclPermissions {
    path: PathBuf,
    owner: String,
    config: AclConfig,
    store: std::sync::Arc<AclStore>,
}

impl AclPermissions {
    pub fn new(
        path: PathBuf,
        owner: String,
        config: AclConfig,
        store: std::sync::Arc<AclStore>,
    ) -> Self {
        Self {
            path,
            owner,
            config,
            store,
        }
    }

    fn default_acl(&self) -> Acl {
        Acl::allow_all([
            self.owner.as_str(),
            self.config.group_name.as_str(),
            self.config.other_name.as_str(),
        ])
    }

    fn allowed(&self, principal: &str, perm: AclPermission) -> FsResult<bool> {
        let owner = self.default_acl();
        Ok(self
            .store
            .get(&self.path, || owner)
            .is_allowed(principal, perm))
    }

    fn set(&self, principal: &str, perm: AclPermission, value: bool) -> FsResult<bool> {
        let default = self.default_acl();
        self.store.update(
            &self.path,
            || default,
            |acl| acl.set_permission(principal, perm, value),
        );
        Ok(true)
    }
}

impl PermissionManager for AclPermissions {
    fn can_read(&self) -> FsResult<bool> {
        self.can_owner_read()
    }

    fn can_write(&self) -> FsResult<bool> {
        self.can_owner_write()
    }

    fn can_execute(&self) -> FsResult<bool> {
        self.can_owner_execute()
    }

    fn can_owner_read(&self) -> FsResult<bool> {
        self.allowed(&self.owner, AclPermission::Read)
    }

    fn can_owner_write(&self) -> FsResult<bool> {
        self.allowed(&self.owner, AclPermission::Write)
    }

    fn can_owner_execute(&self) -> FsResult<bool> {
        self.allowed(&self.owner, AclPermission::Execute)
    }

    fn can_group_read(&self) -> FsResult<bool> {
        self.allowed(&self.config.group_name, AclPermission::Read)
    }

    fn can_group_write(&self) -> FsResult<bool> {
        self.allowed(&self.config.group_name, AclPermission::Write)
    }

    fn can_group_execute(&self) -> FsResult<bool> {
        self.allowed(&self.config.group_name, AclPermission::Execute)
    }

    fn can_other_read(&self) -> FsResult<bool> {
        self.allowed(&self.config.other_name, AclPermission::Read)
    }

    fn can_other_write(&self) -> FsResult<bool> {
        self.allowed(&self.config.other_name, AclPermission::Write)
    }

    fn can_other_execute(&self) -> FsResult<bool> {
        self.allowed(&self.config.other_name, AclPermission::Execute)
    }

    fn set_owner_readable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.owner, AclPermission::Read, value)
    }

    fn set_owner_writable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.owner, AclPermission::Write, value)
    }

    fn set_owner_executable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.owner, AclPermission::Execute, value)
    }

    fn set_group_readable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.config.group_name, AclPermission::Read, value)
    }

    fn set_group_writable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.config.group_name, AclPermission::Write, value)
    }

    fn set_group_executable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.config.group_name, AclPermission::Execute, value)
    }

    fn set_other_readable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.config.other_name, AclPermission::Read, value)
    }

    fn set_other_writable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.config.other_name, AclPermission::Write, value)
    }

    fn set_other_executable(&self, value: bool) -> FsResult<bool> {
        self.set(&self.config.other_name, AclPermission::Execute, value)
    }

    fn set_accessed(&self, time: SystemTime) -> FsResult<bool> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Ok(false),
        };
        let times = std::fs::FileTimes::new().set_accessed(time);
        Ok(file.set_times(times).is_ok())
    }

    fn set_created(&self, _time: SystemTime) -> FsResult<bool> {
        Ok(false)
    }

    fn set_group(&self, group: &Group) -> FsResult<bool> {
        let default = self.default_acl();
        self.store.update(
            &self.path,
            || default,
            |acl| acl.ensure_principal(group.name()),
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_wins_over_earlier_allow() {
        let acl = Acl::new(vec![
            AclEntry::allow("Users").with(AclPermission::Read),
            AclEntry::deny("Users").with(AclPermission::Read),
        ]);
        assert!(!acl.is_allowed("Users", AclPermission::Read));
    }

    #[test]
    fn deny_wins_over_later_allow() {
        let acl = Acl::new(vec![
            AclEntry::deny("Users").with(AclPermission::Read),
            AclEntry::allow("Users").with(AclPermission::Read),
        ]);
        assert!(!acl.is_allowed("Users", AclPermission::Read));
    }

    #[test]
    fn deny_is_scoped_to_the_permission() {
        let acl = Acl::new(vec![
            AclEntry::allow("Users")
                .with(AclPermission::Read)
                .with(AclPermission::Write),
            AclEntry::deny("Users").with(AclPermission::Write),
        ]);
        assert!(acl.is_allowed("Users", AclPermission::Read));
        assert!(!acl.is_allowed("Users", AclPermission::Write));
    }

    #[test]
    fn no_entry_means_not_allowed() {
        let acl = Acl::default();
        assert!(!acl.is_allowed("Users", AclPermission::Read));
    }

    #[test]
    fn set_permission_moves_entry_to_front() {
        let mut acl = Acl::new(vec![
            AclEntry::allow("tony").with(AclPermission::Read),
            AclEntry::allow("Users").with(AclPermission::Read),
        ]);
        acl.set_permission("Users", AclPermission::Write, true);

        assert_eq!(acl.entries()[0].principal, "Users");
        assert!(acl.is_allowed("Users", AclPermission::Read));
        assert!(acl.is_allowed("Users", AclPermission::Write));
        assert!(acl.is_allowed("tony", AclPermission::Read));
    }

    #[test]
    fn set_permission_clears_a_bit() {
        let mut acl = Acl::allow_all(["Other"]);
        acl.set_permission("Other", AclPermission::Write, false);
        assert!(!acl.is_allowed("Other", AclPermission::Write));
        assert!(acl.is_allowed("Other", AclPermission::Read));
    }

    #[test]
    fn manager_round_trip_through_store() {
        let store = std::sync::Arc::new(AclStore::new());
        let perms = AclPermissions::new(
            PathBuf::from("/tmp/example.txt"),
            "tony".to_string(),
            AclConfig::default(),
            store,
        );

        assert!(perms.can_group_read().unwrap());
        assert!(perms.set_group_readable(false).unwrap());
        assert!(!perms.can_group_read().unwrap());
        assert!(perms.can_owner_read().unwrap());
    }
}
