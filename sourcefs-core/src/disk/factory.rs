//! Factory for the disk-backed backend.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::{Arc, RwLock, Weak};

use crate::disk::DiskSource;
use crate::error::{FsError, FsResult};
use crate::factory::{ConnectProperties, SourceFactory};
use crate::path::expand_dots;
use crate::perms::acl::{AclConfig, AclStore};
use crate::perms::PermissionManager;
use crate::principal::User;
use crate::registry::Registry;
use crate::source::{BackendRef, FileSource, SourceRef};

pub const DISK_FACTORY_ID: &str = "fileproxy";

#[derive(Default)]
struct FactoryState {
    current_dir: Option<PathBuf>,
    session_id: Option<i64>,
}

/// Factory handle; clones share state.
#[derive(Clone)]
pub struct DiskFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    registry: Weak<Registry>,
    state: RwLock<FactoryState>,
    acl_config: AclConfig,
    acl_store: Arc<AclStore>,
}

impl DiskFactory {
    pub(crate) fn new(registry: Weak<Registry>, acl_config: AclConfig) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                registry,
                state: RwLock::new(FactoryState::default()),
                acl_config,
                acl_store: Arc::new(AclStore::new()),
            }),
        }
    }

    pub(crate) fn local_user(&self) -> User {
        match self.inner.registry.upgrade() {
            Some(registry) => registry.local_user(),
            None => User::unknown(),
        }
    }

    pub fn acl_config(&self) -> &AclConfig {
        &self.inner.acl_config
    }

    pub fn acl_store(&self) -> &Arc<AclStore> {
        &self.inner.acl_store
    }

    #[cfg(not(unix))]
    pub(crate) fn acl_group_name(&self) -> String {
        self.inner.acl_config.group_name.clone()
    }

    /// Platform permission strategy for one path.
    #[cfg(unix)]
    pub(crate) fn permission_manager(&self, path: &Path) -> Box<dyn PermissionManager> {
        Box::new(crate::perms::posix::PosixPermissions::new(
            path.to_path_buf(),
        ))
    }

    #[cfg(not(unix))]
    pub(crate) fn permission_manager(&self, path: &Path) -> Box<dyn PermissionManager> {
        Box::new(crate::perms::acl::AclPermissions::new(
            path.to_path_buf(),
            self.local_user().name().to_string(),
            self.inner.acl_config.clone(),
            self.inner.acl_store.clone(),
        ))
    }

    fn source(&self, path: PathBuf) -> SourceRef {
        Arc::new(DiskSource::new(path, self.clone()))
    }

    fn is_absolute(path: &str) -> bool {
        if path.starts_with(MAIN_SEPARATOR) || path.starts_with('/') {
            return true;
        }
        let mut chars = path.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic()) && chars.next() == Some(':')
    }
}

impl SourceFactory for DiskFactory {
    fn type_id(&self) -> &'static str {
        DISK_FACTORY_ID
    }

    fn title(&self) -> &'static str {
        "Local"
    }

    fn separator(&self) -> char {
        MAIN_SEPARATOR
    }

    fn path_separator(&self) -> char {
        if cfg!(windows) {
            ';'
        } else {
            ':'
        }
    }

    #[cfg(not(windows))]
    fn list_roots(&self) -> FsResult<Vec<SourceRef>> {
        Ok(vec![self.source(PathBuf::from("/"))])
    }

    #[cfg(windows)]
    fn list_roots(&self) -> FsResult<Vec<SourceRef>> {
        let mut roots = Vec::new();
        for letter in 'A'..='Z' {
            let drive = PathBuf::from(format!("{letter}:\\"));
            if drive.is_dir() {
                roots.push(self.source(drive));
            }
        }
        Ok(roots)
    }

    fn current_directory(&self) -> FsResult<SourceRef> {
        if let Some(dir) = &self.inner.state.read().expect("lock poisoned").current_dir {
            return Ok(self.source(dir.clone()));
        }
        let cwd = std::env::current_dir().map_err(FsError::Io)?;
        let mut state = self.inner.state.write().expect("lock poisoned");
        let dir = state.current_dir.get_or_insert(cwd).clone();
        Ok(self.source(dir))
    }

    fn set_current_directory(&self, dir: SourceRef) -> FsResult<()> {
        let BackendRef::Disk(dir) = dir.backend() else {
            return Err(FsError::InvalidArgument(
                "current directory must belong to the disk backend".to_string(),
            ));
        };
        self.inner.state.write().expect("lock poisoned").current_dir = Some(dir.path().clone());
        Ok(())
    }

    fn create_file_source(&self, path: &str) -> FsResult<SourceRef> {
        let expanded = expand_dots(path, self.separator());
        if Self::is_absolute(&expanded) {
            return Ok(self.source(PathBuf::from(expanded)));
        }
        let cwd = self.current_directory()?;
        let base = PathBuf::from(cwd.absolute_path());
        Ok(self.source(base.join(expanded)))
    }

    fn is_connected(&self) -> bool {
        // A local filesystem is always reachable.
        true
    }

    fn connect(&self) -> FsResult<bool> {
        if let Some(registry) = self.inner.registry.upgrade() {
            let id = registry.register_session(Arc::new(self.clone()));
            self.inner.state.write().expect("lock poisoned").session_id = Some(id);
        }
        Ok(true)
    }

    fn disconnect(&self) -> FsResult<()> {
        Ok(())
    }

    fn connect_properties(&self) -> ConnectProperties {
        ConnectProperties::new()
    }

    fn set_connect_properties(&self, _properties: ConnectProperties) {}

    fn session_id(&self) -> Option<i64> {
        self.inner.state.read().expect("lock poisoned").session_id
    }

    #[cfg(unix)]
    fn create_symbolic_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef> {
        let (BackendRef::Disk(link_src), BackendRef::Disk(existing_src)) =
            (link.backend(), existing.backend())
        else {
            return Ok(link);
        };
        std::os::unix::fs::symlink(existing_src.path(), link_src.path())
            .map_err(|e| FsError::from_io(e, &link.absolute_path()))?;
        Ok(self.source(link_src.path().clone()))
    }

    #[cfg(windows)]
    fn create_symbolic_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef> {
        let (BackendRef::Disk(link_src), BackendRef::Disk(existing_src)) =
            (link.backend(), existing.backend())
        else {
            return Ok(link);
        };
        let result = if existing_src.path().is_dir() {
            std::os::windows::fs::symlink_dir(existing_src.path(), link_src.path())
        } else {
            std::os::windows::fs::symlink_file(existing_src.path(), link_src.path())
        };
        result.map_err(|e| FsError::from_io(e, &link.absolute_path()))?;
        Ok(self.source(link_src.path().clone()))
    }

    #[cfg(not(any(unix, windows)))]
    fn create_symbolic_link(&self, link: SourceRef, _existing: SourceRef) -> FsResult<SourceRef> {
        let _ = link;
        Err(FsError::Unsupported(
            "symbolic links are not available on this platform".to_string(),
        ))
    }

    fn create_hard_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef> {
        let (BackendRef::Disk(link_src), BackendRef::Disk(existing_src)) =
            (link.backend(), existing.backend())
        else {
            return Ok(link);
        };
        std::fs::hard_link(existing_src.path(), link_src.path())
            .map_err(|e| FsError::from_io(e, &link.absolute_path()))?;
        Ok(self.source(link_src.path().clone()))
    }
}
