//! Factory for the in-memory backend.

use std::sync::{Arc, RwLock, Weak};

use crate::error::{FsError, FsResult};
use crate::factory::{ConnectProperties, SourceFactory};
use crate::link::LinkSource;
use crate::memory::{MemoryNode, MemorySource};
use crate::path::expand_dots;
use crate::registry::Registry;
use crate::source::{BackendRef, FileSource, SourceRef};

pub const MEMORY_FACTORY_ID: &str = "memory";

const PROP_NAME: &str = "name";

struct FactoryState {
    root: Arc<MemoryNode>,
    current_dir: Arc<MemoryNode>,
    name: String,
    connected: bool,
    session_id: Option<i64>,
}

impl FactoryState {
    fn fresh(name: String) -> Self {
        let root = MemoryNode::new_root();
        Self {
            current_dir: root.clone(),
            root,
            name,
            connected: false,
            session_id: None,
        }
    }
}

/// Factory handle; clones share one tree.
#[derive(Clone)]
pub struct MemoryFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    registry: Weak<Registry>,
    state: RwLock<FactoryState>,
}

impl MemoryFactory {
    pub(crate) fn new(registry: Weak<Registry>) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                registry,
                state: RwLock::new(FactoryState::fresh("MemoryFileSet".to_string())),
            }),
        }
    }

    fn root(&self) -> Arc<MemoryNode> {
        self.inner.state.read().expect("lock poisoned").root.clone()
    }

    fn source(&self, node: Arc<MemoryNode>) -> SourceRef {
        Arc::new(MemorySource::new(node, self.clone()))
    }

    pub fn name(&self) -> String {
        self.inner.state.read().expect("lock poisoned").name.clone()
    }
}

impl SourceFactory for MemoryFactory {
    fn type_id(&self) -> &'static str {
        MEMORY_FACTORY_ID
    }

    fn title(&self) -> &'static str {
        "Memory"
    }

    fn separator(&self) -> char {
        '/'
    }

    fn path_separator(&self) -> char {
        ':'
    }

    fn list_roots(&self) -> FsResult<Vec<SourceRef>> {
        Ok(vec![self.source(self.root())])
    }

    fn current_directory(&self) -> FsResult<SourceRef> {
        let node = self
            .inner
            .state
            .read()
            .expect("lock poisoned")
            .current_dir
            .clone();
        Ok(self.source(node))
    }

    fn set_current_directory(&self, dir: SourceRef) -> FsResult<()> {
        let BackendRef::Memory(dir) = dir.backend() else {
            return Err(FsError::InvalidArgument(
                "current directory must belong to the memory backend".to_string(),
            ));
        };
        self.inner.state.write().expect("lock poisoned").current_dir = dir.node().clone();
        Ok(())
    }

    fn create_file_source(&self, path: &str) -> FsResult<SourceRef> {
        let sep = self.separator();
        let mut full = path.trim().to_string();
        if !full.starts_with(sep) {
            let cwd = self
                .inner
                .state
                .read()
                .expect("lock poisoned")
                .current_dir
                .clone();
            full = format!("{}{sep}{full}", cwd.canonical_path());
        }

        let expanded = expand_dots(&full, sep);
        let root = self.root();
        if expanded.is_empty() || expanded == "/" {
            return Ok(self.source(root));
        }

        let mut node = root;
        for part in expanded.split(sep) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            node = node.child_or_create(part);
        }
        Ok(self.source(node))
    }

    fn is_connected(&self) -> bool {
        self.inner.state.read().expect("lock poisoned").connected
    }

    fn connect(&self) -> FsResult<bool> {
        let newly_connected = {
            let mut state = self.inner.state.write().expect("lock poisoned");
            if state.connected {
                false
            } else {
                state.connected = true;
                true
            }
        };

        if newly_connected {
            if let Some(registry) = self.inner.registry.upgrade() {
                let id = registry.register_session(Arc::new(self.clone()));
                self.inner.state.write().expect("lock poisoned").session_id = Some(id);
            }
        }
        Ok(true)
    }

    fn disconnect(&self) -> FsResult<()> {
        let mut state = self.inner.state.write().expect("lock poisoned");
        let name = state.name.clone();
        *state = FactoryState::fresh(name);
        Ok(())
    }

    fn connect_properties(&self) -> ConnectProperties {
        let mut props = ConnectProperties::new();
        props.set(PROP_NAME, self.name());
        props
    }

    fn set_connect_properties(&self, properties: ConnectProperties) {
        if let Some(name) = properties.get(PROP_NAME) {
            self.inner.state.write().expect("lock poisoned").name = name.to_string();
        }
    }

    fn session_id(&self) -> Option<i64> {
        self.inner.state.read().expect("lock poisoned").session_id
    }

    fn create_symbolic_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef> {
        let (BackendRef::Memory(link_src), BackendRef::Memory(existing_src)) =
            (link.backend(), existing.backend())
        else {
            return Ok(link);
        };
        // Record the target on the node so fresh lookups can resolve it.
        let target_path = existing_src.node().canonical_path();
        link_src
            .node()
            .update_state(|s| s.link_target = Some(target_path));
        Ok(Arc::new(LinkSource::symbolic(link.clone(), existing.clone())))
    }

    fn create_hard_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef> {
        let (BackendRef::Memory(_), BackendRef::Memory(_)) = (link.backend(), existing.backend())
        else {
            return Ok(link);
        };
        Ok(Arc::new(LinkSource::hard(link.clone(), existing.clone())))
    }
}
