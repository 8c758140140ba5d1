//! Explicit process state: factory construction, session tracking, and
//! `filesource:` URL resolution.
//!
//! The session maps, the monotonic session-id counter and the probed local
//! user all live on one [`Registry`] value owned by the process entry
//! point. Nothing here is ambient global state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::disk::DiskFactory;
use crate::error::{FsError, FsResult};
use crate::factory::{FactoryRef, SourceFactory};
use crate::memory::MemoryFactory;
use crate::perms::acl::AclConfig;
use crate::principal::{probe_local_user, User};
use crate::source::SourceRef;
use crate::uri::SourceUri;

pub(crate) struct FactorySession {
    pub id: i64,
    pub key: String,
    pub factory: FactoryRef,
    pub instance_count: u32,
}

#[derive(Default)]
struct SessionTable {
    next_id: i64,
    by_id: HashMap<i64, Arc<FactorySession>>,
    by_key: HashMap<String, i64>,
}

pub struct Registry {
    sessions: Mutex<SessionTable>,
    local_user: Mutex<Option<User>>,
    acl_config: AclConfig,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Self::with_acl_config(AclConfig::default())
    }

    pub fn with_acl_config(acl_config: AclConfig) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(SessionTable::default()),
            local_user: Mutex::new(None),
            acl_config,
        })
    }

    /// A fresh disk-backed factory bound to this registry.
    pub fn disk_factory(self: &Arc<Self>) -> DiskFactory {
        DiskFactory::new(Arc::downgrade(self), self.acl_config.clone())
    }

    /// A fresh in-memory factory bound to this registry.
    pub fn memory_factory(self: &Arc<Self>) -> MemoryFactory {
        MemoryFactory::new(Arc::downgrade(self))
    }

    pub fn factory_for_type(self: &Arc<Self>, type_id: &str) -> FsResult<FactoryRef> {
        match type_id.trim().to_ascii_lowercase().as_str() {
            crate::disk::factory::DISK_FACTORY_ID => Ok(Arc::new(self.disk_factory())),
            crate::memory::factory::MEMORY_FACTORY_ID => Ok(Arc::new(self.memory_factory())),
            other => Err(FsError::InvalidArgument(format!(
                "no factory registered for sourcetype {other:?}"
            ))),
        }
    }

    /// Resolve a parsed URI to a factory: a live session when `sessionId`
    /// names one, otherwise a fresh factory for the `sourcetype`.
    pub fn factory_for_uri(self: &Arc<Self>, uri: &SourceUri) -> FsResult<FactoryRef> {
        if let Some(id) = uri.session_id() {
            if let Some(factory) = self.session_factory(id) {
                return Ok(factory);
            }
        }
        let type_id = uri.source_type().ok_or_else(|| {
            FsError::InvalidArgument(format!("no sourcetype in uri: {uri}"))
        })?;
        self.factory_for_type(type_id)
    }

    /// Parse a `filesource:` URL, connect its factory, and create the
    /// capability object for its path.
    pub fn open(self: &Arc<Self>, url: &str) -> FsResult<SourceRef> {
        let uri = SourceUri::parse(url)?;
        let factory = self.factory_for_uri(&uri)?;
        if !factory.connect()? {
            return Err(FsError::Io(std::io::Error::other(format!(
                "cannot connect to {url}"
            ))));
        }
        factory.create_file_source(uri.path())
    }

    /// Track a newly connected factory. Reconnecting with the same key
    /// bumps the existing session's instance count; the session still gets
    /// a fresh id so a URI can address this exact connection.
    pub(crate) fn register_session(&self, factory: FactoryRef) -> i64 {
        let key = format!(
            "{}:{}",
            factory.type_id(),
            factory.connect_properties().session_key_fragment()
        );

        let mut table = self.sessions.lock().expect("lock poisoned");
        let id = table.next_id;
        table.next_id += 1;

        let instance_count = match table.by_key.get(&key) {
            Some(&existing_id) => {
                let prior = table
                    .by_id
                    .get(&existing_id)
                    .map(|s| s.instance_count)
                    .unwrap_or(0);
                tracing::warn!(key, instances = prior + 1, "factory session already exists");
                prior + 1
            }
            None => 1,
        };

        let session = Arc::new(FactorySession {
            id,
            key: key.clone(),
            factory,
            instance_count,
        });
        table.by_id.insert(id, session.clone());
        table.by_key.insert(key, id);
        tracing::debug!(id = session.id, key = %session.key, "registered factory session");
        id
    }

    pub fn session_factory(&self, id: i64) -> Option<FactoryRef> {
        self.sessions
            .lock()
            .expect("lock poisoned")
            .by_id
            .get(&id)
            .map(|s| s.factory.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("lock poisoned").by_id.len()
    }

    /// Instance count for the session currently registered under the same
    /// key as `id`'s session.
    pub fn session_instances(&self, id: i64) -> Option<u32> {
        let table = self.sessions.lock().expect("lock poisoned");
        let session = table.by_id.get(&id)?;
        let current = table.by_key.get(&session.key)?;
        table.by_id.get(current).map(|s| s.instance_count)
    }

    /// The local user, probed once and cached. Probe failure degrades to a
    /// placeholder identity.
    pub fn local_user(&self) -> User {
        // Check, lock, re-check: the probe spawns a process and must not
        // run twice on a racing first access.
        {
            let cached = self.local_user.lock().expect("lock poisoned");
            if let Some(user) = cached.as_ref() {
                return user.clone();
            }
        }

        let mut cached = self.local_user.lock().expect("lock poisoned");
        if let Some(user) = cached.as_ref() {
            return user.clone();
        }
        let user = probe_local_user().unwrap_or_else(User::unknown);
        *cached = Some(user.clone());
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileSource;

    #[test]
    fn sessions_get_monotonic_ids() {
        let registry = Registry::new();
        let a = registry.memory_factory();
        let b = registry.memory_factory();
        a.connect().unwrap();
        b.connect().unwrap();
        let (a_id, b_id) = (a.session_id().unwrap(), b.session_id().unwrap());
        assert!(b_id > a_id);
        assert_eq!(registry.session_count(), 2);
    }

    #[test]
    fn same_key_bumps_instance_count() {
        let registry = Registry::new();
        let a = registry.memory_factory();
        let b = registry.memory_factory();
        a.connect().unwrap();
        b.connect().unwrap();
        assert_eq!(registry.session_instances(a.session_id().unwrap()), Some(2));
    }

    #[test]
    fn session_id_resolves_to_live_factory() {
        let registry = Registry::new();
        let factory = registry.memory_factory();
        factory.connect().unwrap();
        let id = factory.session_id().unwrap();

        let uri = SourceUri::parse(&format!(
            "filesource:/x?sourcetype=memory&sessionId={id}"
        ))
        .unwrap();
        let resolved = registry.factory_for_uri(&uri).unwrap();
        // The resolved factory shares the original's tree.
        let file = factory.create_file_source("/x/y").unwrap();
        file.mkdirs().unwrap();
        let through_session = resolved.create_file_source("/x/y").unwrap();
        assert!(through_session.exists().unwrap());
    }

    #[test]
    fn unknown_source_type_is_rejected() {
        let registry = Registry::new();
        let uri = SourceUri::parse("filesource:/x?sourcetype=carrier-pigeon").unwrap();
        assert!(registry.factory_for_uri(&uri).is_err());
    }
}
