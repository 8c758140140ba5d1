//! The `FileSource` capability interface.
//!
//! Application code manipulates files through this trait without knowing
//! whether they live on local disk, in a process-local memory tree, or
//! behind a future session-backed transport. Backends form a closed set;
//! the [`FileSource::backend`] accessor exists for same-backend seams
//! (rename, containment, link creation). Adapter code dispatches through
//! the trait and never inspects it.

use std::io::Read;
use std::sync::Arc;
use std::time::SystemTime;

use crate::disk::DiskSource;
use crate::error::{FsError, FsResult};
use crate::factory::{FactoryRef, SourceFactory};
use crate::io::RandomAccessStream;
use crate::link::LinkSource;
use crate::memory::MemorySource;
use crate::principal::{Group, User};

pub type SourceRef = Arc<dyn FileSource>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum FileType {
    #[default]
    Undefined,
    File,
    Directory,
}

/// Closed set of backend variants. Only backend code matches on this.
pub enum BackendRef<'a> {
    Disk(&'a DiskSource),
    Memory(&'a MemorySource),
    Link(&'a LinkSource),
}

/// Child-listing predicate.
pub trait SourceFilter {
    fn accept(&self, file: &dyn FileSource) -> bool;
}

impl<F: Fn(&dyn FileSource) -> bool> SourceFilter for F {
    fn accept(&self, file: &dyn FileSource) -> bool {
        self(file)
    }
}

/// A writable stream with an explicit close that surfaces the final flush.
/// Dropping without closing publishes best-effort.
pub trait CloseableWrite: std::io::Write + Send {
    fn close(self: Box<Self>) -> FsResult<()>;
}

pub trait FileSource: Send + Sync {
    fn factory(&self) -> FactoryRef;

    fn backend(&self) -> BackendRef<'_>;

    /// Final path segment.
    fn name(&self) -> String;

    fn parent_path(&self) -> Option<String>;

    fn parent(&self) -> FsResult<Option<SourceRef>>;

    fn absolute_path(&self) -> String;

    /// Absolute and unique; lexically normalized.
    fn canonical_path(&self) -> FsResult<String>;

    fn file_type(&self) -> FsResult<FileType>;

    fn exists(&self) -> FsResult<bool> {
        Ok(self.file_type()? != FileType::Undefined)
    }

    fn is_file(&self) -> FsResult<bool> {
        Ok(self.file_type()? == FileType::File)
    }

    fn is_directory(&self) -> FsResult<bool> {
        Ok(self.file_type()? == FileType::Directory)
    }

    fn is_hidden(&self) -> FsResult<bool>;

    fn length(&self) -> FsResult<u64>;

    fn created(&self) -> FsResult<SystemTime>;

    fn modified(&self) -> FsResult<SystemTime>;

    fn accessed(&self) -> FsResult<SystemTime>;

    fn set_created(&self, _time: SystemTime) -> FsResult<bool> {
        Ok(false)
    }

    fn set_modified(&self, _time: SystemTime) -> FsResult<bool> {
        Ok(false)
    }

    fn set_accessed(&self, _time: SystemTime) -> FsResult<bool> {
        Ok(false)
    }

    fn owner(&self) -> FsResult<User>;

    fn group(&self) -> FsResult<Group>;

    fn set_owner(&self, _owner: &User) -> FsResult<bool> {
        Ok(false)
    }

    fn set_group(&self, _group: &Group) -> FsResult<bool> {
        Ok(false)
    }

    // Permission queries. Scoped variants default to the unscoped answer
    // the way backends without class distinctions behave.

    fn can_read(&self) -> FsResult<bool>;

    fn can_write(&self) -> FsResult<bool>;

    fn can_execute(&self) -> FsResult<bool> {
        Ok(false)
    }

    fn can_owner_read(&self) -> FsResult<bool> {
        self.can_read()
    }

    fn can_owner_write(&self) -> FsResult<bool> {
        self.can_write()
    }

    fn can_owner_execute(&self) -> FsResult<bool> {
        self.can_execute()
    }

    fn can_group_read(&self) -> FsResult<bool> {
        self.can_read()
    }

    fn can_group_write(&self) -> FsResult<bool> {
        self.can_write()
    }

    fn can_group_execute(&self) -> FsResult<bool> {
        Ok(false)
    }

    fn can_other_read(&self) -> FsResult<bool> {
        self.can_read()
    }

    fn can_other_write(&self) -> FsResult<bool> {
        self.can_write()
    }

    fn can_other_execute(&self) -> FsResult<bool> {
        Ok(false)
    }

    // Permission setters. `Ok(false)` means unsupported; errors are real
    // I/O failures only.

    fn set_readable(&self, value: bool, owner_only: bool) -> FsResult<bool>;

    fn set_writable(&self, value: bool, owner_only: bool) -> FsResult<bool>;

    fn set_executable(&self, value: bool, owner_only: bool) -> FsResult<bool>;

    fn set_owner_readable(&self, value: bool) -> FsResult<bool> {
        self.set_readable(value, true)
    }

    fn set_owner_writable(&self, value: bool) -> FsResult<bool> {
        self.set_writable(value, true)
    }

    fn set_owner_executable(&self, value: bool) -> FsResult<bool> {
        self.set_executable(value, true)
    }

    fn set_group_readable(&self, _value: bool) -> FsResult<bool> {
        Ok(false)
    }

    fn set_group_writable(&self, _value: bool) -> FsResult<bool> {
        Ok(false)
    }

    fn set_group_executable(&self, _value: bool) -> FsResult<bool> {
        Ok(false)
    }

    fn set_other_readable(&self, _value: bool) -> FsResult<bool> {
        Ok(false)
    }

    fn set_other_writable(&self, _value: bool) -> FsResult<bool> {
        Ok(false)
    }

    fn set_other_executable(&self, _value: bool) -> FsResult<bool> {
        Ok(false)
    }

    /// Allow reads, refuse writes from here on.
    fn set_read_only(&self) -> FsResult<bool>;

    // Tree operations.

    fn list(&self) -> FsResult<Vec<SourceRef>>;

    fn list_filtered(&self, filter: &dyn SourceFilter) -> FsResult<Vec<SourceRef>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|f| filter.accept(f.as_ref()))
            .collect())
    }

    fn list_names(&self) -> FsResult<Vec<String>> {
        Ok(self.list()?.iter().map(|f| f.name()).collect())
    }

    /// Child lookup; equivalent to creating `<my path><sep><path>` through
    /// the factory.
    fn get_child(&self, path: &str) -> FsResult<SourceRef>;

    /// True when `self` sits underneath `other`. Backend-mismatched
    /// operands are never an error; they are simply not related.
    fn is_child_of(&self, other: &dyn FileSource) -> bool;

    /// Atomically create an empty file; false when it already exists.
    fn create_new_file(&self) -> FsResult<bool>;

    /// Remove this entry. Directories must be empty at the adapter level;
    /// a missing entry reports false.
    fn delete(&self) -> FsResult<bool>;

    fn mkdir(&self) -> FsResult<bool>;

    fn mkdirs(&self) -> FsResult<bool>;

    /// Move this object's content and metadata to `dest`. Identity moves
    /// with it: afterwards this handle reports a nonexistent file.
    fn rename_to(&self, dest: &dyn FileSource) -> FsResult<bool>;

    // Streams.

    fn input_stream(&self) -> FsResult<Box<dyn Read + Send>>;

    fn input_stream_at(&self, start: u64) -> FsResult<Box<dyn Read + Send>>;

    fn output_stream(&self, append: bool) -> FsResult<Box<dyn CloseableWrite>>;

    /// Random access by mode string; see [`crate::io::OpenMode`].
    fn random_access(&self, mode: &str) -> FsResult<RandomAccessStream>;

    // Links.

    /// The target when this object is a symbolic link; `None` otherwise.
    /// Hard links are indistinguishable from the real file.
    fn linked_to(&self) -> FsResult<Option<SourceRef>>;

    // Misc.

    fn refresh(&self) -> FsResult<()> {
        Ok(())
    }

    fn title(&self) -> String;

    fn content_type(&self) -> Option<&'static str> {
        content_type_for(&self.name())
    }

    fn to_uri(&self) -> String {
        let factory = self.factory();
        let mut uri = format!(
            "filesource:{}?sourcetype={}",
            self.absolute_path(),
            factory.type_id()
        );
        if let Some(id) = factory.session_id() {
            uri.push_str(&format!("&sessionId={id}"));
        }
        uri
    }

    /// First `n` bytes without pulling the rest of the data.
    fn head(&self, n: usize) -> FsResult<Vec<u8>> {
        let len = (self.length()? as usize).min(n);
        let mut buf = vec![0u8; len];
        let mut stream = self.input_stream()?;
        read_all(&mut stream, &mut buf)?;
        Ok(buf)
    }

    /// Last `n` bytes without pulling the rest of the data.
    fn tail(&self, n: usize) -> FsResult<Vec<u8>> {
        let len = self.length()? as usize;
        if len == 0 {
            return Ok(Vec::new());
        }
        let take = len.min(n);
        let mut stream = self.input_stream_at((len - take) as u64)?;
        let mut buf = vec![0u8; take];
        read_all(&mut stream, &mut buf)?;
        Ok(buf)
    }

    // Version metadata: reserved for a future versioned backend. Both
    // shipped backends answer version 0, unsupported.

    fn is_version_supported(&self) -> bool {
        false
    }

    fn version(&self) -> FsResult<u64> {
        Ok(0)
    }

    fn max_version(&self) -> FsResult<u64> {
        Ok(0)
    }

    fn version_date(&self) -> FsResult<SystemTime> {
        self.modified()
    }

    fn set_version(&self, _version: u64, _save_change: bool) -> FsResult<bool> {
        Ok(false)
    }

    fn set_version_date(&self, _time: SystemTime) -> FsResult<bool> {
        Ok(false)
    }
}

fn read_all(stream: &mut Box<dyn Read + Send>, buf: &mut [u8]) -> FsResult<()> {
    let mut got = 0;
    while got < buf.len() {
        match stream.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) => return Err(FsError::Io(e)),
        }
    }
    Ok(())
}

/// Extension-keyed MIME lookup used by `content_type`.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1;
    let ext = ext.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "png" => "image/png",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// Equality used across the crate: same backend type and same absolute
/// path.
pub fn same_source(a: &dyn FileSource, b: &dyn FileSource) -> bool {
    a.factory().type_id() == b.factory().type_id() && a.absolute_path() == b.absolute_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("index.html"), Some("text/html"));
        assert_eq!(content_type_for("notes.TXT"), Some("text/plain"));
        assert_eq!(content_type_for("archive.tar.gz"), None);
        assert_eq!(content_type_for("noextension"), None);
    }
}
