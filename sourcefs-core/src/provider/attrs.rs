//! POSIX-flavored attribute views computed on demand.
//!
//! There is no cached snapshot: every read goes back to the backend. Bulk
//! reads use an explicit recognized-name list; `*` and `posix:*` expand
//! against it and unknown names are skipped.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::SystemTime;

use strum::IntoEnumIterator;

use crate::error::FsResult;
use crate::perms::PermissionSet;
use crate::principal::{Group, User};
use crate::source::{FileSource, SourceRef};

/// Point-in-time attribute snapshot returned by [`PosixAttributeView::read`].
#[derive(Debug, Clone)]
pub struct PosixAttributes {
    pub owner: User,
    pub group: Group,
    pub permissions: PermissionSet,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    pub is_directory: bool,
    pub is_regular_file: bool,
    pub is_symbolic_link: bool,
    pub size: u64,
    pub file_key: String,
}

/// Attribute view over one capability object.
pub struct PosixAttributeView {
    file: SourceRef,
}

impl PosixAttributeView {
    pub fn new(file: SourceRef) -> Self {
        Self { file }
    }

    pub fn name(&self) -> &'static str {
        "posix"
    }

    pub fn read(&self) -> FsResult<PosixAttributes> {
        let file = self.file.as_ref();
        let is_link = file.linked_to()?.is_some();
        Ok(PosixAttributes {
            owner: file.owner()?,
            group: file.group()?,
            permissions: permissions_of(file)?,
            created: file.created()?,
            modified: file.modified()?,
            accessed: file.accessed()?,
            is_directory: file.is_directory()?,
            is_regular_file: file.is_file()? && !is_link,
            is_symbolic_link: is_link,
            size: file.length()?,
            file_key: file.to_uri(),
        })
    }

    /// Set any of the three timestamps; `None` leaves a timestamp alone.
    pub fn set_times(
        &self,
        modified: Option<SystemTime>,
        accessed: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> FsResult<()> {
        if let Some(time) = modified {
            self.file.set_modified(time)?;
        }
        if let Some(time) = accessed {
            self.file.set_accessed(time)?;
        }
        if let Some(time) = created {
            self.file.set_created(time)?;
        }
        Ok(())
    }

    /// Apply all nine bits.
    pub fn set_permissions(&self, perms: &PermissionSet) -> FsResult<()> {
        let file = self.file.as_ref();
        file.set_owner_readable(perms.owner_read)?;
        file.set_owner_writable(perms.owner_write)?;
        file.set_owner_executable(perms.owner_execute)?;
        file.set_group_readable(perms.group_read)?;
        file.set_group_writable(perms.group_write)?;
        file.set_group_executable(perms.group_execute)?;
        file.set_other_readable(perms.other_read)?;
        file.set_other_writable(perms.other_write)?;
        file.set_other_executable(perms.other_execute)?;
        Ok(())
    }

    pub fn owner(&self) -> FsResult<User> {
        self.file.owner()
    }

    pub fn set_owner(&self, owner: &User) -> FsResult<()> {
        self.file.set_owner(owner)?;
        Ok(())
    }

    pub fn set_group(&self, group: &Group) -> FsResult<()> {
        self.file.set_group(group)?;
        Ok(())
    }
}

/// The nine bits assembled from the capability queries.
pub fn permissions_of(file: &dyn FileSource) -> FsResult<PermissionSet> {
    Ok(PermissionSet {
        owner_read: file.can_owner_read()?,
        owner_write: file.can_owner_write()?,
        owner_execute: file.can_owner_execute()?,
        group_read: file.can_group_read()?,
        group_write: file.can_group_write()?,
        group_execute: file.can_group_execute()?,
        other_read: file.can_other_read()?,
        other_write: file.can_other_write()?,
        other_execute: file.can_other_execute()?,
    })
}

/// Recognized attribute names. The basic view covers the subset every
/// backend answers; the posix view adds ownership and permissions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
pub enum AttrName {
    #[strum(serialize = "size")]
    Size,
    #[strum(serialize = "lastModifiedTime")]
    LastModifiedTime,
    #[strum(serialize = "lastAccessTime")]
    LastAccessTime,
    #[strum(serialize = "creationTime")]
    CreationTime,
    #[strum(serialize = "isDirectory")]
    IsDirectory,
    #[strum(serialize = "isRegularFile")]
    IsRegularFile,
    #[strum(serialize = "isSymbolicLink")]
    IsSymbolicLink,
    #[strum(serialize = "isOther")]
    IsOther,
    #[strum(serialize = "fileKey")]
    FileKey,
    #[strum(serialize = "owner")]
    Owner,
    #[strum(serialize = "group")]
    Group,
    #[strum(serialize = "permissions")]
    Permissions,
}

impl AttrName {
    fn in_basic_view(&self) -> bool {
        !matches!(self, AttrName::Owner | AttrName::Group | AttrName::Permissions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Size(u64),
    Time(SystemTime),
    Text(String),
    Permissions(PermissionSet),
}

/// Bulk attribute read: `"*"`, `"size,lastModifiedTime"`, `"posix:*"`,
/// `"posix:permissions,owner,size"`. Unrecognized names are skipped.
pub fn read_attributes(
    file: &SourceRef,
    spec: &str,
) -> FsResult<BTreeMap<String, AttrValue>> {
    let (posix, names) = match spec.split_once(':') {
        Some((view, names)) => (view.eq_ignore_ascii_case("posix"), names),
        None => (false, spec),
    };

    let mut out = BTreeMap::new();
    for name in names.split(',') {
        let name = name.trim();
        if name == "*" {
            for attr in AttrName::iter() {
                if posix || attr.in_basic_view() {
                    insert_attr(file, attr, &mut out)?;
                }
            }
        } else if let Ok(attr) = AttrName::from_str(name) {
            if posix || attr.in_basic_view() {
                insert_attr(file, attr, &mut out)?;
            }
        }
        // Unrecognized names fall through, as the contract requires.
    }
    Ok(out)
}

fn insert_attr(
    file: &SourceRef,
    attr: AttrName,
    out: &mut BTreeMap<String, AttrValue>,
) -> FsResult<()> {
    let file = file.as_ref();
    let value = match attr {
        AttrName::Size => AttrValue::Size(file.length()?),
        AttrName::LastModifiedTime => AttrValue::Time(file.modified()?),
        AttrName::LastAccessTime => AttrValue::Time(file.accessed()?),
        AttrName::CreationTime => AttrValue::Time(file.created()?),
        AttrName::IsDirectory => AttrValue::Bool(file.is_directory()?),
        AttrName::IsRegularFile => {
            AttrValue::Bool(file.is_file()? && file.linked_to()?.is_none())
        }
        AttrName::IsSymbolicLink => AttrValue::Bool(file.linked_to()?.is_some()),
        AttrName::IsOther => AttrValue::Bool(false),
        AttrName::FileKey => AttrValue::Text(file.to_uri()),
        AttrName::Owner => AttrValue::Text(file.owner()?.name().to_string()),
        AttrName::Group => AttrValue::Text(file.group()?.name().to_string()),
        AttrName::Permissions => AttrValue::Permissions(permissions_of(file)?),
    };
    out.insert(attr.to_string(), value);
    Ok(())
}
