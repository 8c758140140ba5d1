//! The cross-platform permission model.
//!
//! Backends that sit on a real filesystem delegate permission work to a
//! [`PermissionManager`] strategy: POSIX mode bits where the OS has them,
//! an ACL emulation where it does not. The in-memory backend keeps plain
//! boolean fields and does not go through a strategy.

pub mod acl;
#[cfg(unix)]
pub mod posix;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::principal::Group;

/// The nine owner/group/other × read/write/execute bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub owner_read: bool,
    pub owner_write: bool,
    pub owner_execute: bool,
    pub group_read: bool,
    pub group_write: bool,
    pub group_execute: bool,
    pub other_read: bool,
    pub other_write: bool,
    pub other_execute: bool,
}

impl PermissionSet {
    /// All nine bits set.
    pub fn all() -> Self {
        Self::from_mode(0o777)
    }

    pub fn from_mode(mode: u32) -> Self {
        Self {
            owner_read: mode & 0o400 != 0,
            owner_write: mode & 0o200 != 0,
            owner_execute: mode & 0o100 != 0,
            group_read: mode & 0o040 != 0,
            group_write: mode & 0o020 != 0,
            group_execute: mode & 0o010 != 0,
            other_read: mode & 0o004 != 0,
            other_write: mode & 0o002 != 0,
            other_execute: mode & 0o001 != 0,
        }
    }

    pub fn mode(&self) -> u32 {
        let mut mode = 0;
        for (bit, set) in [
            (0o400, self.owner_read),
            (0o200, self.owner_write),
            (0o100, self.owner_execute),
            (0o040, self.group_read),
            (0o020, self.group_write),
            (0o010, self.group_execute),
            (0o004, self.other_read),
            (0o002, self.other_write),
            (0o001, self.other_execute),
        ] {
            if set {
                mode |= bit;
            }
        }
        mode
    }

    /// Parse the `rwxr-x---` form.
    pub fn from_symbolic(s: &str) -> FsResult<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(crate::error::FsError::InvalidArgument(format!(
                "permission string must be 9 characters: {s:?}"
            )));
        }
        let expect = ['r', 'w', 'x', 'r', 'w', 'x', 'r', 'w', 'x'];
        let mut mode = 0;
        for (idx, &c) in chars.iter().enumerate() {
            if c == expect[idx] {
                mode |= 0o400 >> idx;
            } else if c != '-' {
                return Err(crate::error::FsError::InvalidArgument(format!(
                    "unexpected character {c:?} in permission string {s:?}"
                )));
            }
        }
        Ok(Self::from_mode(mode))
    }

    pub fn symbolic(&self) -> String {
        let mut out = String::with_capacity(9);
        for (set, c) in [
            (self.owner_read, 'r'),
            (self.owner_write, 'w'),
            (self.owner_execute, 'x'),
            (self.group_read, 'r'),
            (self.group_write, 'w'),
            (self.group_execute, 'x'),
            (self.other_read, 'r'),
            (self.other_write, 'w'),
            (self.other_execute, 'x'),
        ] {
            out.push(if set { c } else { '-' });
        }
        out
    }
}

impl std::fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.symbolic())
    }
}

/// Capability-check/mutate strategy consumed by the disk backend.
///
/// Setters return `Ok(false)` when the operation is not supported by the
/// platform; `Err` is reserved for real I/O failure.
pub trait PermissionManager: Send + Sync {
    fn can_read(&self) -> FsResult<bool>;
    fn can_write(&self) -> FsResult<bool>;
    fn can_execute(&self) -> FsResult<bool>;

    fn can_owner_read(&self) -> FsResult<bool>;
    fn can_owner_write(&self) -> FsResult<bool>;
    fn can_owner_execute(&self) -> FsResult<bool>;
    fn can_group_read(&self) -> FsResult<bool>;
    fn can_group_write(&self) -> FsResult<bool>;
    fn can_group_execute(&self) -> FsResult<bool>;
    fn can_other_read(&self) -> FsResult<bool>;
    fn can_other_write(&self) -> FsResult<bool>;
    fn can_other_execute(&self) -> FsResult<bool>;

    fn set_owner_readable(&self, value: bool) -> FsResult<bool>;
    fn set_owner_writable(&self, value: bool) -> FsResult<bool>;
    fn set_owner_executable(&self, value: bool) -> FsResult<bool>;
    fn set_group_readable(&self, value: bool) -> FsResult<bool>;
    fn set_group_writable(&self, value: bool) -> FsResult<bool>;
    fn set_group_executable(&self, value: bool) -> FsResult<bool>;
    fn set_other_readable(&self, value: bool) -> FsResult<bool>;
    fn set_other_writable(&self, value: bool) -> FsResult<bool>;
    fn set_other_executable(&self, value: bool) -> FsResult<bool>;

    /// Cascade: owner first; group and other only when `owner_only` is
    /// false and the owner-scoped call succeeded.
    fn set_readable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        let ok = self.set_owner_readable(value)?;
        if ok && !owner_only && self.set_group_readable(value)? {
            self.set_other_readable(value)?;
        }
        Ok(ok)
    }

    fn set_writable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        let ok = self.set_owner_writable(value)?;
        if ok && !owner_only && self.set_group_writable(value)? {
            self.set_other_writable(value)?;
        }
        Ok(ok)
    }

    fn set_executable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        let ok = self.set_owner_executable(value)?;
        if ok && !owner_only && self.set_group_executable(value)? {
            self.set_other_executable(value)?;
        }
        Ok(ok)
    }

    fn set_accessed(&self, time: SystemTime) -> FsResult<bool>;
    fn set_created(&self, time: SystemTime) -> FsResult<bool>;
    fn set_group(&self, group: &Group) -> FsResult<bool>;

    /// Snapshot of the nine bits, assembled from the individual queries.
    fn permission_set(&self) -> FsResult<PermissionSet> {
        Ok(PermissionSet {
            owner_read: self.can_owner_read()?,
            owner_write: self.can_owner_write()?,
            owner_execute: self.can_owner_execute()?,
            group_read: self.can_group_read()?,
            group_write: self.can_group_write()?,
            group_execute: self.can_group_execute()?,
            other_read: self.can_other_read()?,
            other_write: self.can_other_write()?,
            other_execute: self.can_other_execute()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trip() {
        for mode in [0o000, 0o777, 0o750, 0o644, 0o421] {
            assert_eq!(PermissionSet::from_mode(mode).mode(), mode);
        }
    }

    #[test]
    fn symbolic_round_trip() {
        for s in ["rwxrwxrwx", "---------", "rwxr-x---", "rw-r-xr--"] {
            assert_eq!(PermissionSet::from_symbolic(s).unwrap().symbolic(), s);
        }
    }

    #[test]
    fn symbolic_rejects_bad_input() {
        assert!(PermissionSet::from_symbolic("rwx").is_err());
        assert!(PermissionSet::from_symbolic("rwxrwxrwz").is_err());
        assert!(PermissionSet::from_symbolic("wrxrwxrwx").is_err());
    }
}
