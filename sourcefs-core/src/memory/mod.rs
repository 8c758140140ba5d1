//! The pure in-memory backend: a process-local tree of nodes behind the
//! capability interface.
//!
//! Ownership flows parent→child through a name-keyed map; the child→parent
//! edge is a weak back-reference. A node is created lazily by path lookup
//! but only *exists* once `mkdir`/`mkdirs` or an output stream gives it a
//! type. Identity never mutates: rename moves content and metadata into the
//! destination node and leaves the source undefined.

pub mod factory;

pub use factory::MemoryFactory;

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, RwLock, Weak};
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::factory::{FactoryRef, SourceFactory};
use crate::io::memory::MemoryIoController;
use crate::io::{OpenMode, RandomAccessStream};
use crate::principal::{Group, User};
use crate::source::{BackendRef, CloseableWrite, FileSource, FileType, SourceRef};

/// Per-class permission flags. Every class starts permissive; the memory
/// backend has no ambient principal to restrict against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MemoryPerms {
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

impl Default for MemoryPerms {
    fn default() -> Self {
        Self {
            owner_read: true,
            owner_write: true,
            owner_execute: true,
            group_read: true,
            group_write: true,
            group_execute: true,
            other_read: true,
            other_write: true,
            other_execute: true,
        }
    }
}

pub(crate) struct NodeState {
    pub file_type: FileType,
    pub data: Vec<u8>,
    pub children: BTreeMap<String, Arc<MemoryNode>>,
    pub perms: MemoryPerms,
    pub owner: Option<User>,
    pub group: Option<Group>,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    pub link_target: Option<String>,
    canonical: Option<String>,
}

impl NodeState {
    fn new() -> Self {
        let now = SystemTime::now();
        Self {
            file_type: FileType::Undefined,
            data: Vec::new(),
            children: BTreeMap::new(),
            perms: MemoryPerms::default(),
            owner: None,
            group: None,
            created: now,
            modified: now,
            accessed: now,
            link_target: None,
            canonical: None,
        }
    }
}

/// One tree node. The root is flagged and can be neither deleted nor used
/// as a rename target.
pub struct MemoryNode {
    name: String,
    is_root: bool,
    parent: Weak<MemoryNode>,
    state: RwLock<NodeState>,
}

impl MemoryNode {
    pub(crate) fn new_root() -> Arc<Self> {
        let root = Arc::new(Self {
            name: "/".to_string(),
            is_root: true,
            parent: Weak::new(),
            state: RwLock::new(NodeState::new()),
        });
        root.state.write().expect("lock poisoned").file_type = FileType::Directory;
        root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn parent(&self) -> Option<Arc<MemoryNode>> {
        self.parent.upgrade()
    }

    pub fn file_type(&self) -> FileType {
        self.state.read().expect("lock poisoned").file_type
    }

    pub fn exists(&self) -> bool {
        self.file_type() != FileType::Undefined
    }

    /// Canonical path: the concatenation of ancestor names, computed
    /// lazily and cached. Node identity never changes, so the cache never
    /// goes stale.
    pub fn canonical_path(self: &Arc<Self>) -> String {
        if self.is_root {
            return "/".to_string();
        }
        if let Some(cached) = &self.state.read().expect("lock poisoned").canonical {
            return cached.clone();
        }

        let parent_path = match self.parent() {
            Some(parent) => parent.canonical_path(),
            None => String::new(),
        };
        let path = if parent_path == "/" {
            format!("/{}", self.name)
        } else {
            format!("{parent_path}/{}", self.name)
        };

        let mut state = self.state.write().expect("lock poisoned");
        state.canonical.get_or_insert_with(|| path.clone());
        path
    }

    /// Existing child or a lazily created undefined one.
    pub(crate) fn child_or_create(self: &Arc<Self>, name: &str) -> Arc<MemoryNode> {
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(child) = state.children.get(name) {
            return child.clone();
        }
        let child = Arc::new(MemoryNode {
            name: name.to_string(),
            is_root: false,
            parent: Arc::downgrade(self),
            state: RwLock::new(NodeState::new()),
        });
        state.children.insert(name.to_string(), child.clone());
        child
    }

    pub(crate) fn existing_children(&self) -> Vec<Arc<MemoryNode>> {
        self.state
            .read()
            .expect("lock poisoned")
            .children
            .values()
            .filter(|c| c.exists())
            .cloned()
            .collect()
    }

    pub fn data_snapshot(&self) -> Vec<u8> {
        self.state.read().expect("lock poisoned").data.clone()
    }

    pub fn length(&self) -> u64 {
        self.state.read().expect("lock poisoned").data.len() as u64
    }

    pub fn set_data(&self, data: Vec<u8>) {
        let mut state = self.state.write().expect("lock poisoned");
        state.data = data;
        state.modified = SystemTime::now();
    }

    pub fn append_data(&self, mut data: Vec<u8>) {
        let mut state = self.state.write().expect("lock poisoned");
        state.data.append(&mut data);
        state.modified = SystemTime::now();
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&NodeState) -> R) -> R {
        f(&self.state.read().expect("lock poisoned"))
    }

    pub(crate) fn update_state<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> R {
        f(&mut self.state.write().expect("lock poisoned"))
    }

    fn mkdir(&self) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        if state.file_type == FileType::File {
            return false;
        }
        state.file_type = FileType::Directory;
        state.perms.owner_read = true;
        state.perms.owner_write = true;
        true
    }

    fn mkdirs(self: &Arc<Self>) -> bool {
        if let Some(parent) = self.parent() {
            if !parent.mkdirs() {
                return false;
            }
        }
        self.mkdir()
    }

    /// Unlink from the parent map and reset to undefined.
    fn delete(self: &Arc<Self>) -> bool {
        if self.is_root {
            return false;
        }
        if let Some(parent) = self.parent() {
            parent
                .update_state(|s| s.children.remove(&self.name));
        }
        self.update_state(|state| {
            state.file_type = FileType::Undefined;
            state.data = Vec::new();
            state.link_target = None;
        });
        true
    }
}

/// Capability object over one memory node.
#[derive(Clone)]
pub struct MemorySource {
    node: Arc<MemoryNode>,
    factory: MemoryFactory,
}

impl MemorySource {
    pub(crate) fn new(node: Arc<MemoryNode>, factory: MemoryFactory) -> Self {
        Self { node, factory }
    }

    pub(crate) fn node(&self) -> &Arc<MemoryNode> {
        &self.node
    }

    fn deny(&self, what: &str) -> FsError {
        FsError::AccessDenied(format!("{what}: {}", self.absolute_path()))
    }
}

impl FileSource for MemorySource {
    fn factory(&self) -> FactoryRef {
        Arc::new(self.factory.clone())
    }

    fn backend(&self) -> BackendRef<'_> {
        BackendRef::Memory(self)
    }

    fn name(&self) -> String {
        self.node.name().to_string()
    }

    fn parent_path(&self) -> Option<String> {
        self.node.parent().map(|p| p.canonical_path())
    }

    fn parent(&self) -> FsResult<Option<SourceRef>> {
        Ok(self
            .node
            .parent()
            .map(|p| Arc::new(MemorySource::new(p, self.factory.clone())) as SourceRef))
    }

    fn absolute_path(&self) -> String {
        self.node.canonical_path()
    }

    fn canonical_path(&self) -> FsResult<String> {
        Ok(self.node.canonical_path())
    }

    fn file_type(&self) -> FsResult<FileType> {
        Ok(self.node.file_type())
    }

    fn is_hidden(&self) -> FsResult<bool> {
        Ok(self.node.name().starts_with('.'))
    }

    fn length(&self) -> FsResult<u64> {
        Ok(self.node.length())
    }

    fn created(&self) -> FsResult<SystemTime> {
        Ok(self.node.with_state(|s| s.created))
    }

    fn modified(&self) -> FsResult<SystemTime> {
        Ok(self.node.with_state(|s| s.modified))
    }

    fn accessed(&self) -> FsResult<SystemTime> {
        Ok(self.node.with_state(|s| s.accessed))
    }

    fn set_created(&self, time: SystemTime) -> FsResult<bool> {
        self.node.update_state(|s| s.created = time);
        Ok(true)
    }

    fn set_modified(&self, time: SystemTime) -> FsResult<bool> {
        self.node.update_state(|s| s.modified = time);
        Ok(true)
    }

    fn set_accessed(&self, time: SystemTime) -> FsResult<bool> {
        self.node.update_state(|s| s.accessed = time);
        Ok(true)
    }

    fn owner(&self) -> FsResult<User> {
        Ok(self
            .node
            .with_state(|s| s.owner.clone())
            .unwrap_or_else(User::unknown))
    }

    fn group(&self) -> FsResult<Group> {
        Ok(self
            .node
            .with_state(|s| s.group.clone())
            .unwrap_or_else(|| Group::new(0, "unknown")))
    }

    fn set_owner(&self, owner: &User) -> FsResult<bool> {
        self.node.update_state(|s| s.owner = Some(owner.clone()));
        Ok(true)
    }

    fn set_group(&self, group: &Group) -> FsResult<bool> {
        self.node.update_state(|s| s.group = Some(group.clone()));
        Ok(true)
    }

    fn can_read(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.owner_read))
    }

    fn can_write(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.owner_write))
    }

    fn can_execute(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.owner_execute))
    }

    fn can_group_read(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.group_read))
    }

    fn can_group_write(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.group_write))
    }

    fn can_group_execute(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.group_execute))
    }

    fn can_other_read(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.other_read))
    }

    fn can_other_write(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.other_write))
    }

    fn can_other_execute(&self) -> FsResult<bool> {
        Ok(self.node.with_state(|s| s.perms.other_execute))
    }

    fn set_readable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.node.update_state(|s| {
            s.perms.owner_read = value;
            if !owner_only {
                s.perms.group_read = value;
                s.perms.other_read = value;
            }
        });
        Ok(true)
    }

    fn set_writable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.node.update_state(|s| {
            s.perms.owner_write = value;
            if !owner_only {
                s.perms.group_write = value;
                s.perms.other_write = value;
            }
        });
        Ok(true)
    }

    fn set_executable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.node.update_state(|s| {
            s.perms.owner_execute = value;
            if !owner_only {
                s.perms.group_execute = value;
                s.perms.other_execute = value;
            }
        });
        Ok(true)
    }

    fn set_owner_readable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.owner_read = value);
        Ok(true)
    }

    fn set_owner_writable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.owner_write = value);
        Ok(true)
    }

    fn set_owner_executable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.owner_execute = value);
        Ok(true)
    }

    fn set_group_readable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.group_read = value);
        Ok(true)
    }

    fn set_group_writable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.group_write = value);
        Ok(true)
    }

    fn set_group_executable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.group_execute = value);
        Ok(true)
    }

    fn set_other_readable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.other_read = value);
        Ok(true)
    }

    fn set_other_writable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.other_write = value);
        Ok(true)
    }

    fn set_other_executable(&self, value: bool) -> FsResult<bool> {
        self.node.update_state(|s| s.perms.other_execute = value);
        Ok(true)
    }

    fn set_read_only(&self) -> FsResult<bool> {
        self.node.update_state(|s| {
            s.perms.owner_read = true;
            s.perms.owner_write = false;
        });
        Ok(true)
    }

    fn list(&self) -> FsResult<Vec<SourceRef>> {
        if !self.can_read()? {
            return Err(self.deny("cannot list"));
        }
        Ok(self
            .node
            .existing_children()
            .into_iter()
            .map(|n| Arc::new(MemorySource::new(n, self.factory.clone())) as SourceRef)
            .collect())
    }

    fn get_child(&self, path: &str) -> FsResult<SourceRef> {
        let sep = self.factory.separator();
        self.factory
            .create_file_source(&format!("{}{sep}{path}", self.absolute_path()))
    }

    fn is_child_of(&self, other: &dyn FileSource) -> bool {
        match other.backend() {
            BackendRef::Memory(other) => self
                .node
                .canonical_path()
                .starts_with(&other.node.canonical_path()),
            _ => false,
        }
    }

    fn create_new_file(&self) -> FsResult<bool> {
        Ok(self.node.update_state(|s| {
            if s.file_type != FileType::Undefined {
                return false;
            }
            s.file_type = FileType::File;
            s.perms.owner_read = true;
            s.perms.owner_write = true;
            true
        }))
    }

    fn delete(&self) -> FsResult<bool> {
        if !self.node.exists() {
            return Ok(false);
        }
        Ok(self.node.delete())
    }

    fn mkdir(&self) -> FsResult<bool> {
        Ok(self.node.mkdir())
    }

    fn mkdirs(&self) -> FsResult<bool> {
        Ok(self.node.mkdirs())
    }

    fn rename_to(&self, dest: &dyn FileSource) -> FsResult<bool> {
        if !self.node.exists() || self.node.is_root() || !self.can_write()? {
            return Ok(false);
        }
        let BackendRef::Memory(dest) = dest.backend() else {
            return Ok(false);
        };
        if dest.node.exists()
            || dest.node.is_root()
            || Arc::ptr_eq(&self.node, &dest.node)
        {
            return Ok(false);
        }

        let (file_type, data, perms, owner, group, created, modified, accessed) =
            self.node.with_state(|s| {
                (
                    s.file_type,
                    s.data.clone(),
                    s.perms,
                    s.owner.clone(),
                    s.group.clone(),
                    s.created,
                    s.modified,
                    s.accessed,
                )
            });

        dest.node.update_state(|s| {
            s.file_type = file_type;
            s.data = data;
            s.perms = perms;
            s.owner = owner;
            s.group = group;
            s.created = created;
            s.modified = modified;
            s.accessed = accessed;
        });

        // The source's identity stays put; its content is gone and stale
        // handles observe a nonexistent file.
        self.node.update_state(|s| {
            s.file_type = FileType::Undefined;
            s.data = Vec::new();
            s.perms.owner_read = false;
            s.perms.owner_write = false;
        });
        Ok(true)
    }

    fn input_stream(&self) -> FsResult<Box<dyn Read + Send>> {
        self.input_stream_at(0)
    }

    fn input_stream_at(&self, start: u64) -> FsResult<Box<dyn Read + Send>> {
        if self.node.exists() && !self.can_read()? {
            return Err(self.deny("cannot read"));
        }
        if self.is_directory()? {
            return Err(FsError::IsADirectory(self.absolute_path()));
        }
        let data = self.node.data_snapshot();
        let start = (start as usize).min(data.len());
        self.node
            .update_state(|s| s.accessed = SystemTime::now());
        Ok(Box::new(Cursor::new(data[start..].to_vec())))
    }

    fn output_stream(&self, append: bool) -> FsResult<Box<dyn CloseableWrite>> {
        if self.node.exists() && !self.can_write()? {
            return Err(self.deny("cannot write"));
        }
        if self.is_directory()? {
            return Err(FsError::IsADirectory(self.absolute_path()));
        }
        // A new node becomes a real file at stream acquisition, not on the
        // first byte written.
        self.node.update_state(|s| {
            if s.file_type == FileType::Undefined {
                s.file_type = FileType::File;
                s.perms.owner_read = true;
                s.perms.owner_write = true;
            }
            let now = SystemTime::now();
            s.accessed = now;
            s.modified = now;
        });
        Ok(Box::new(MemoryWriter {
            node: self.node.clone(),
            buf: Vec::new(),
            append,
            committed: false,
        }))
    }

    fn random_access(&self, mode: &str) -> FsResult<RandomAccessStream> {
        let mode = OpenMode::parse(mode)?;
        if mode == OpenMode::ReadWrite && !self.node.exists() {
            self.create_new_file()?;
        }
        let io = Box::new(MemoryIoController::new(self.clone()));
        RandomAccessStream::new(io, mode)
    }

    fn linked_to(&self) -> FsResult<Option<SourceRef>> {
        let Some(target) = self.node.with_state(|s| s.link_target.clone()) else {
            return Ok(None);
        };
        Ok(Some(self.factory.create_file_source(&target)?))
    }

    fn title(&self) -> String {
        "Memory".to_string()
    }
}

/// Output stream over a node. Bytes accumulate privately and publish on
/// close: a truncating stream replaces the node's data, an appending one
/// concatenates onto it.
struct MemoryWriter {
    node: Arc<MemoryNode>,
    buf: Vec<u8>,
    append: bool,
    committed: bool,
}

impl MemoryWriter {
    fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        let buf = std::mem::take(&mut self.buf);
        if self.append {
            if !buf.is_empty() {
                self.node.append_data(buf);
            }
        } else {
            self.node.set_data(buf);
        }
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CloseableWrite for MemoryWriter {
    fn close(mut self: Box<Self>) -> FsResult<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}
