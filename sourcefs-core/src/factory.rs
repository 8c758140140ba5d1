//! The per-backend factory contract.
//!
//! A factory constructs capability objects for one backend, owns the
//! backend's notion of roots and current directory, and participates in
//! session tracking through the [`crate::registry::Registry`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::source::SourceRef;

/// Non-secret connection settings, plus an optional `password` entry that
/// is never echoed back: the `Debug` form redacts it and session keys skip
/// it entirely.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConnectProperties(BTreeMap<String, String>);

impl ConnectProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_secret(name: &str) -> bool {
        name.eq_ignore_ascii_case("password")
    }

    /// Stable fragment for session keys; secret values are excluded.
    pub fn session_key_fragment(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            if Self::is_secret(name) {
                continue;
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
            out.push(';');
        }
        out
    }
}

impl fmt::Debug for ConnectProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.0 {
            if Self::is_secret(name) {
                map.entry(name, &"<redacted>");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

/// Factory capability set consumed by application code and by the external
/// collaborators (dialogs, transfer adapters, protocol handlers) that sit
/// outside this crate.
pub trait SourceFactory: Send + Sync {
    /// Backend selector used in `filesource:` URLs (`fileproxy`, `memory`).
    fn type_id(&self) -> &'static str;

    /// Human-readable backend name.
    fn title(&self) -> &'static str;

    /// Name separator within paths.
    fn separator(&self) -> char;

    /// Separator between whole paths in list contexts.
    fn path_separator(&self) -> char;

    fn list_roots(&self) -> FsResult<Vec<SourceRef>>;

    fn current_directory(&self) -> FsResult<SourceRef>;

    fn set_current_directory(&self, dir: SourceRef) -> FsResult<()>;

    /// Create a capability object for a path. Relative paths resolve
    /// against the current directory; `.`/`..` segments are expanded.
    fn create_file_source(&self, path: &str) -> FsResult<SourceRef>;

    fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the backend connection and track a
    /// session for it. Returns false when the backend refused.
    fn connect(&self) -> FsResult<bool>;

    fn connect_with(&self, properties: ConnectProperties) -> FsResult<bool> {
        self.set_connect_properties(properties);
        self.connect()
    }

    fn disconnect(&self) -> FsResult<()>;

    fn connect_properties(&self) -> ConnectProperties;

    fn set_connect_properties(&self, properties: ConnectProperties);

    /// Session id assigned by the registry at connect time; addressable in
    /// a `filesource:` URL as `sessionId=<id>`.
    fn session_id(&self) -> Option<i64>;

    fn is_version_supported(&self) -> bool {
        false
    }

    /// Create a symbolic link at `link` pointing at `existing`.
    fn create_symbolic_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef>;

    /// Create a new directory entry (hard link) for `existing` at `link`.
    fn create_hard_link(&self, link: SourceRef, existing: SourceRef) -> FsResult<SourceRef>;
}

/// Shared handle alias used throughout the crate.
pub type FactoryRef = Arc<dyn SourceFactory>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let mut props = ConnectProperties::new();
        props.set("host", "example.com");
        props.set("Password", "hunter2");
        let text = format!("{props:?}");
        assert!(text.contains("example.com"));
        assert!(text.contains("<redacted>"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn session_key_skips_password() {
        let mut props = ConnectProperties::new();
        props.set("name", "box");
        props.set("password", "hunter2");
        let key = props.session_key_fragment();
        assert_eq!(key, "name=box;");
    }
}
