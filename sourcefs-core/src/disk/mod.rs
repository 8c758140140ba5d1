//! The disk-backed backend: a proxy over a native path.
//!
//! Permission work is delegated to the platform strategy: POSIX bits on
//! Unix, the ACL emulation elsewhere. Owner and group are probed lazily and
//! cached per object.

pub mod factory;

pub use factory::DiskFactory;

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::factory::{FactoryRef, SourceFactory};
use crate::io::disk::DiskIoController;
use crate::io::{OpenMode, RandomAccessStream};
use crate::path::expand_dots;
use crate::perms::PermissionManager;
use crate::principal::{Group, User};
use crate::source::{BackendRef, CloseableWrite, FileSource, FileType, SourceRef};

#[derive(Default)]
struct PrincipalCache {
    owner: Option<User>,
    group: Option<Group>,
}

pub struct DiskSource {
    path: PathBuf,
    factory: DiskFactory,
    perms: Box<dyn PermissionManager>,
    principals: Mutex<PrincipalCache>,
}

impl Clone for DiskSource {
    fn clone(&self) -> Self {
        DiskSource::new(self.path.clone(), self.factory.clone())
    }
}

impl DiskSource {
    pub(crate) fn new(path: PathBuf, factory: DiskFactory) -> Self {
        let perms = factory.permission_manager(&path);
        Self {
            path,
            factory,
            perms,
            principals: Mutex::new(PrincipalCache::default()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn metadata(&self) -> FsResult<fs::Metadata> {
        fs::metadata(&self.path).map_err(|e| FsError::from_io(e, &self.path_str()))
    }

    fn child_source(&self, path: PathBuf) -> SourceRef {
        Arc::new(DiskSource::new(path, self.factory.clone()))
    }

    #[cfg(unix)]
    fn probe_owner(&self) -> User {
        use std::os::unix::fs::MetadataExt;

        let Ok(meta) = fs::metadata(&self.path) else {
            return User::unknown();
        };
        let uid = meta.uid();
        let local = self.factory.local_user();
        if local.id() == uid {
            local
        } else {
            User::new(uid, uid.to_string())
        }
    }

    #[cfg(not(unix))]
    fn probe_owner(&self) -> User {
        self.factory.local_user()
    }

    #[cfg(unix)]
    fn probe_group(&self) -> Group {
        use std::os::unix::fs::MetadataExt;

        let Ok(meta) = fs::metadata(&self.path) else {
            return Group::new(0, "unknown");
        };
        let gid = meta.gid();
        let local = self.factory.local_user();
        let group = local
            .groups()
            .find(|g| g.id() == gid)
            .cloned()
            .unwrap_or_else(|| Group::new(gid, gid.to_string()));
        group
    }

    #[cfg(not(unix))]
    fn probe_group(&self) -> Group {
        Group::new(0, self.factory.acl_group_name())
    }
}

impl FileSource for DiskSource {
    fn factory(&self) -> FactoryRef {
        Arc::new(self.factory.clone())
    }

    fn backend(&self) -> BackendRef<'_> {
        BackendRef::Disk(self)
    }

    fn name(&self) -> String {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.path_str(),
        }
    }

    fn parent_path(&self) -> Option<String> {
        self.path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
    }

    fn parent(&self) -> FsResult<Option<SourceRef>> {
        Ok(self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| self.child_source(p.to_path_buf())))
    }

    fn absolute_path(&self) -> String {
        self.path_str()
    }

    fn canonical_path(&self) -> FsResult<String> {
        Ok(expand_dots(&self.path_str(), self.factory.separator()))
    }

    fn file_type(&self) -> FsResult<FileType> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Ok(FileType::Directory),
            Ok(_) => Ok(FileType::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileType::Undefined),
            Err(e) => Err(FsError::from_io(e, &self.path_str())),
        }
    }

    fn is_hidden(&self) -> FsResult<bool> {
        Ok(self.name().starts_with('.'))
    }

    fn length(&self) -> FsResult<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(FsError::from_io(e, &self.path_str())),
        }
    }

    fn created(&self) -> FsResult<SystemTime> {
        let meta = self.metadata()?;
        // Not every filesystem records a birth time.
        meta.created()
            .or_else(|_| meta.modified())
            .map_err(FsError::Io)
    }

    fn modified(&self) -> FsResult<SystemTime> {
        self.metadata()?.modified().map_err(FsError::Io)
    }

    fn accessed(&self) -> FsResult<SystemTime> {
        self.metadata()?.accessed().map_err(FsError::Io)
    }

    fn set_created(&self, time: SystemTime) -> FsResult<bool> {
        self.perms.set_created(time)
    }

    fn set_modified(&self, time: SystemTime) -> FsResult<bool> {
        let Ok(file) = File::open(&self.path) else {
            return Ok(false);
        };
        let times = fs::FileTimes::new().set_modified(time);
        Ok(file.set_times(times).is_ok())
    }

    fn set_accessed(&self, time: SystemTime) -> FsResult<bool> {
        self.perms.set_accessed(time)
    }

    fn owner(&self) -> FsResult<User> {
        let mut cache = self.principals.lock().expect("lock poisoned");
        if cache.owner.is_none() {
            cache.owner = Some(self.probe_owner());
        }
        Ok(cache.owner.clone().expect("owner just set"))
    }

    fn group(&self) -> FsResult<Group> {
        let mut cache = self.principals.lock().expect("lock poisoned");
        if cache.group.is_none() {
            cache.group = Some(self.probe_group());
        }
        Ok(cache.group.clone().expect("group just set"))
    }

    fn set_group(&self, group: &Group) -> FsResult<bool> {
        let updated = self.perms.set_group(group)?;
        if updated {
            self.principals.lock().expect("lock poisoned").group = Some(group.clone());
        }
        Ok(updated)
    }

    fn can_read(&self) -> FsResult<bool> {
        self.perms.can_read()
    }

    fn can_write(&self) -> FsResult<bool> {
        self.perms.can_write()
    }

    fn can_execute(&self) -> FsResult<bool> {
        self.perms.can_execute()
    }

    fn can_owner_read(&self) -> FsResult<bool> {
        self.perms.can_owner_read()
    }

    fn can_owner_write(&self) -> FsResult<bool> {
        self.perms.can_owner_write()
    }

    fn can_owner_execute(&self) -> FsResult<bool> {
        self.perms.can_owner_execute()
    }

    fn can_group_read(&self) -> FsResult<bool> {
        self.perms.can_group_read()
    }

    fn can_group_write(&self) -> FsResult<bool> {
        self.perms.can_group_write()
    }

    fn can_group_execute(&self) -> FsResult<bool> {
        self.perms.can_group_execute()
    }

    fn can_other_read(&self) -> FsResult<bool> {
        self.perms.can_other_read()
    }

    fn can_other_write(&self) -> FsResult<bool> {
        self.perms.can_other_write()
    }

    fn can_other_execute(&self) -> FsResult<bool> {
        self.perms.can_other_execute()
    }

    fn set_readable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.perms.set_readable(value, owner_only)
    }

    fn set_writable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.perms.set_writable(value, owner_only)
    }

    fn set_executable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.perms.set_executable(value, owner_only)
    }

    fn set_owner_readable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_owner_readable(value)
    }

    fn set_owner_writable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_owner_writable(value)
    }

    fn set_owner_executable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_owner_executable(value)
    }

    fn set_group_readable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_group_readable(value)
    }

    fn set_group_writable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_group_writable(value)
    }

    fn set_group_executable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_group_executable(value)
    }

    fn set_other_readable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_other_readable(value)
    }

    fn set_other_writable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_other_writable(value)
    }

    fn set_other_executable(&self, value: bool) -> FsResult<bool> {
        self.perms.set_other_executable(value)
    }

    fn set_read_only(&self) -> FsResult<bool> {
        self.perms.set_writable(false, false)
    }

    fn list(&self) -> FsResult<Vec<SourceRef>> {
        let entries = fs::read_dir(&self.path).map_err(|e| FsError::from_io(e, &self.path_str()))?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(FsError::Io)?;
            children.push(self.child_source(entry.path()));
        }
        Ok(children)
    }

    fn get_child(&self, path: &str) -> FsResult<SourceRef> {
        Ok(self.child_source(self.path.join(path)))
    }

    fn is_child_of(&self, other: &dyn FileSource) -> bool {
        match other.backend() {
            BackendRef::Disk(other) => self.path.starts_with(&other.path),
            _ => false,
        }
    }

    fn create_new_file(&self) -> FsResult<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(FsError::from_io(e, &self.path_str())),
        }
    }

    fn delete(&self) -> FsResult<bool> {
        let result = if self.is_directory()? {
            fs::remove_dir(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FsError::from_io(e, &self.path_str())),
        }
    }

    fn mkdir(&self) -> FsResult<bool> {
        match fs::create_dir(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(FsError::from_io(e, &self.path_str())),
        }
    }

    fn mkdirs(&self) -> FsResult<bool> {
        if self.is_directory()? {
            return Ok(false);
        }
        fs::create_dir_all(&self.path).map_err(|e| FsError::from_io(e, &self.path_str()))?;
        Ok(true)
    }

    fn rename_to(&self, dest: &dyn FileSource) -> FsResult<bool> {
        let BackendRef::Disk(dest) = dest.backend() else {
            return Ok(false);
        };
        match fs::rename(&self.path, &dest.path) {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::debug!(?e, from = %self.path_str(), "rename failed");
                Ok(false)
            }
        }
    }

    fn input_stream(&self) -> FsResult<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|e| FsError::from_io(e, &self.path_str()))?;
        Ok(Box::new(file))
    }

    fn input_stream_at(&self, start: u64) -> FsResult<Box<dyn Read + Send>> {
        let mut file = File::open(&self.path).map_err(|e| FsError::from_io(e, &self.path_str()))?;
        file.seek(SeekFrom::Start(start))
            .map_err(|e| FsError::from_io(e, &self.path_str()))?;
        Ok(Box::new(file))
    }

    fn output_stream(&self, append: bool) -> FsResult<Box<dyn CloseableWrite>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(&self.path)
            .map_err(|e| FsError::from_io(e, &self.path_str()))?;
        Ok(Box::new(DiskWriter { file }))
    }

    fn random_access(&self, mode: &str) -> FsResult<RandomAccessStream> {
        let mode = OpenMode::parse(mode)?;
        let source: SourceRef = Arc::new(self.clone());
        let io = Box::new(DiskIoController::open(source, mode)?);
        RandomAccessStream::new(io, mode)
    }

    fn linked_to(&self) -> FsResult<Option<SourceRef>> {
        let Ok(meta) = fs::symlink_metadata(&self.path) else {
            return Ok(None);
        };
        if !meta.file_type().is_symlink() {
            return Ok(None);
        }
        let target = match fs::read_link(&self.path) {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!(?e, path = %self.path_str(), "failed to read link target");
                return Ok(None);
            }
        };
        let target = if target.is_absolute() {
            target
        } else {
            match self.path.parent() {
                Some(parent) => parent.join(target),
                None => target,
            }
        };
        Ok(Some(self.child_source(target)))
    }

    fn title(&self) -> String {
        "Local".to_string()
    }
}

struct DiskWriter {
    file: File,
}

impl Write for DiskWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl CloseableWrite for DiskWriter {
    fn close(mut self: Box<Self>) -> FsResult<()> {
        self.file.flush().map_err(FsError::Io)
    }
}
