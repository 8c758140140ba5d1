//! POSIX-bit permission strategy.
//!
//! There is no partial-bit API at the OS level: every setter re-reads the
//! whole mode word, flips exactly one bit, and writes the whole set back.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::perms::PermissionManager;
use crate::principal::Group;

pub struct PosixPermissions {
    path: PathBuf,
}

impl PosixPermissions {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn mode(&self) -> FsResult<u32> {
        let meta = fs::metadata(&self.path)
            .map_err(|e| FsError::from_io(e, &self.path.to_string_lossy()))?;
        Ok(meta.permissions().mode() & 0o777)
    }

    fn has_bit(&self, bit: u32) -> FsResult<bool> {
        Ok(self.mode()? & bit != 0)
    }

    fn set_bit(&self, bit: u32, value: bool) -> FsResult<bool> {
        let mode = self.mode()?;
        let new_mode = if value { mode | bit } else { mode & !bit };
        if new_mode != mode {
            fs::set_permissions(&self.path, fs::Permissions::from_mode(new_mode))
                .map_err(|e| FsError::from_io(e, &self.path.to_string_lossy()))?;
        }
        Ok(true)
    }
}

impl PermissionManager for PosixPermissions {
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
        self.has_bit(0o400)
    }

    fn can_owner_write(&self) -> FsResult<bool> {
        self.has_bit(0o200)
    }

    fn can_owner_execute(&self) -> FsResult<bool> {
        self.has_bit(0o100)
    }

    fn can_group_read(&self) -> FsResult<bool> {
        self.has_bit(0o040)
    }

    fn can_group_write(&self) -> FsResult<bool> {
        self.has_bit(0o020)
    }

    fn can_group_execute(&self) -> FsResult<bool> {
        self.has_bit(0o010)
    }

    fn can_other_read(&self) -> FsResult<bool> {
        self.has_bit(0o004)
    }

    fn can_other_write(&self) -> FsResult<bool> {
        self.has_bit(0o002)
    }

    fn can_other_execute(&self) -> FsResult<bool> {
        self.has_bit(0o001)
    }

    fn set_owner_readable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o400, value)
    }

    fn set_owner_writable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o200, value)
    }

    fn set_owner_executable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o100, value)
    }

    fn set_group_readable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o040, value)
    }

    fn set_group_writable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o020, value)
    }

    fn set_group_executable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o010, value)
    }

    fn set_other_readable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o004, value)
    }

    fn set_other_writable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o002, value)
    }

    fn set_other_executable(&self, value: bool) -> FsResult<bool> {
        self.set_bit(0o001, value)
    }

    fn set_accessed(&self, time: SystemTime) -> FsResult<bool> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Ok(false),
        };
        let times = fs::FileTimes::new().set_accessed(time);
        Ok(file.set_times(times).is_ok())
    }

    fn set_created(&self, _time: SystemTime) -> FsResult<bool> {
        // Birth time is not settable through the filesystem API.
        Ok(false)
    }

    fn set_group(&self, _group: &Group) -> FsResult<bool> {
        // chown(2) needs privileges and has no std wrapper.
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_one_bit_and_preserves_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perm.txt");
        fs::write(&path, "x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let perms = PosixPermissions::new(path.clone());
        assert!(perms.set_other_readable(true).unwrap());
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            0o644
        );

        assert!(perms.set_group_readable(false).unwrap());
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            0o604
        );
    }

    #[test]
    fn cascade_stops_at_owner_when_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perm.txt");
        fs::write(&path, "x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let perms = PosixPermissions::new(path.clone());
        assert!(perms.set_readable(true, true).unwrap());
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            0o600
        );

        assert!(perms.set_readable(true, false).unwrap());
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            0o644
        );
    }
}
