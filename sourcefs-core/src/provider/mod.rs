//! The provider adapter: presents the capability interface through a
//! generic path/filesystem surface of directory streams, copy/move,
//! access checks and attribute views.
//!
//! Adapter code dispatches exclusively through the capability trait; no
//! operation here inspects which backend it is talking to.

pub mod attrs;

pub use attrs::{read_attributes, AttrValue, PosixAttributeView, PosixAttributes};

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::factory::{FactoryRef, SourceFactory};
use crate::path::SourcePath;
use crate::source::{FileSource, SourceRef};

const COPY_BUFFER_SIZE: usize = 10240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOption {
    /// Carry the three timestamps onto the destination.
    CopyAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

/// Lazy, filtered, single-pass iteration over a directory's entries.
/// Exhausting it is final; a fresh stream means a fresh call.
pub struct DirectoryStream {
    entries: std::vec::IntoIter<SourceRef>,
    filter: Option<Box<dyn Fn(&SourcePath) -> bool + Send>>,
}

impl Iterator for DirectoryStream {
    type Item = SourcePath;

    fn next(&mut self) -> Option<SourcePath> {
        loop {
            let entry = SourcePath::from_source(self.entries.next()?);
            match &self.filter {
                Some(filter) if !filter(&entry) => continue,
                _ => return Some(entry),
            }
        }
    }
}

/// One backend presented as a filesystem.
pub struct SourceFileSystem {
    factory: FactoryRef,
}

impl SourceFileSystem {
    pub fn new(factory: FactoryRef) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &FactoryRef {
        &self.factory
    }

    pub fn separator(&self) -> char {
        self.factory.separator()
    }

    pub fn path(&self, raw: &str) -> SourcePath {
        SourcePath::new(raw, self.factory.clone())
    }

    pub fn root_directories(&self) -> FsResult<Vec<SourcePath>> {
        Ok(self
            .factory
            .list_roots()?
            .into_iter()
            .map(SourcePath::from_source)
            .collect())
    }

    pub fn file_store(&self) -> SourceFileStore {
        SourceFileStore {
            factory: self.factory.clone(),
        }
    }

    /// Links resolve to their target before iteration; anything that is
    /// not a directory refuses.
    pub fn directory_stream(
        &self,
        dir: &SourcePath,
        filter: Option<Box<dyn Fn(&SourcePath) -> bool + Send>>,
    ) -> FsResult<DirectoryStream> {
        let file = follow_links(dir.source()?)?;
        if !file.is_directory()? {
            return Err(FsError::NotADirectory(file.absolute_path()));
        }
        Ok(DirectoryStream {
            entries: file.list()?.into_iter(),
            filter,
        })
    }

    pub fn create_directory(&self, dir: &SourcePath) -> FsResult<()> {
        let file = dir.source()?;
        if file.exists()? {
            return Err(FsError::AlreadyExists(file.absolute_path()));
        }
        if !file.mkdirs()? {
            return Err(FsError::Io(std::io::Error::other(format!(
                "could not create directory {dir}"
            ))));
        }
        Ok(())
    }

    /// Remove one entry. Directories must be empty.
    pub fn delete(&self, path: &SourcePath) -> FsResult<()> {
        let file = path.source()?;
        if !file.exists()? {
            return Err(FsError::NotFound(file.absolute_path()));
        }
        if file.is_directory()? && !file.list()?.is_empty() {
            return Err(FsError::IsADirectory(format!(
                "directory not empty: {}",
                file.absolute_path()
            )));
        }
        if !file.delete()? {
            return Err(FsError::Io(std::io::Error::other(format!(
                "could not delete {path}"
            ))));
        }
        Ok(())
    }

    /// Copy one entry. Refuses when the destination exists or is a link,
    /// unless source and destination are the same file, in which case this
    /// is a no-op. A directory copies as a fresh empty directory.
    pub fn copy(&self, source: &SourcePath, target: &SourcePath, options: &[CopyOption]) -> FsResult<()> {
        if self.is_same_file(source, target)? {
            return Ok(());
        }

        let target_file = target.source()?;
        if target_file.exists()? || target_file.linked_to()?.is_some() {
            return Err(FsError::AlreadyExists(format!(
                "copy target exists or is a link: {target}"
            )));
        }

        let source_file = source.source()?;
        if source_file.is_directory()? {
            if !target_file.mkdirs()? {
                return Err(FsError::Io(std::io::Error::other(format!(
                    "could not create directories for {target}"
                ))));
            }
        } else {
            let mut input = source_file.input_stream()?;
            let mut output = target_file.output_stream(false)?;
            let mut buf = vec![0u8; COPY_BUFFER_SIZE];
            loop {
                let got = input.read(&mut buf).map_err(FsError::Io)?;
                if got == 0 {
                    break;
                }
                output.write_all(&buf[..got]).map_err(FsError::Io)?;
            }
            output.close()?;
        }

        if options.contains(&CopyOption::CopyAttributes) {
            target_file.set_modified(source_file.modified()?)?;
            target_file.set_accessed(source_file.accessed()?)?;
            target_file.set_created(source_file.created()?)?;
        }
        Ok(())
    }

    /// Move via the backend's rename.
    pub fn move_to(&self, source: &SourcePath, target: &SourcePath) -> FsResult<()> {
        let source_file = follow_links(source.source()?)?;
        let target_file = target.source()?;
        if !source_file.rename_to(target_file.as_ref())? {
            return Err(FsError::Io(std::io::Error::other(format!(
                "could not rename {source} to {target}"
            ))));
        }
        Ok(())
    }

    /// Same backend type, same absolute path, same non-secret connection
    /// properties.
    pub fn is_same_file(&self, a: &SourcePath, b: &SourcePath) -> FsResult<bool> {
        let fa = a.source()?;
        let fb = b.source()?;
        let same = fa.absolute_path() == fb.absolute_path()
            && fa.factory().type_id() == fb.factory().type_id()
            && fa.factory().connect_properties().session_key_fragment()
                == fb.factory().connect_properties().session_key_fragment();
        Ok(same)
    }

    pub fn is_hidden(&self, path: &SourcePath) -> FsResult<bool> {
        path.source()?.is_hidden()
    }

    pub fn check_access(&self, path: &SourcePath, modes: &[AccessMode]) -> FsResult<()> {
        let file = path.source()?;
        if !file.exists()? {
            return Err(FsError::NotFound(file.absolute_path()));
        }
        for mode in modes {
            let allowed = match mode {
                AccessMode::Read => file.can_owner_read()?,
                AccessMode::Write => file.can_owner_write()?,
                AccessMode::Execute => file.can_owner_execute()?,
            };
            if !allowed {
                return Err(FsError::AccessDenied(format!(
                    "no {mode:?} access: {}",
                    file.absolute_path()
                )));
            }
        }
        Ok(())
    }

    /// Attribute view over a path; every read re-queries the backend.
    pub fn attribute_view(
        &self,
        path: &SourcePath,
        follow: bool,
    ) -> FsResult<PosixAttributeView> {
        let mut file = path.source()?;
        if follow {
            file = follow_links(file)?;
        }
        Ok(PosixAttributeView::new(file))
    }

    pub fn read_attributes(
        &self,
        path: &SourcePath,
        spec: &str,
    ) -> FsResult<std::collections::BTreeMap<String, AttrValue>> {
        attrs::read_attributes(&path.source()?, spec)
    }
}

/// Per-factory store information.
pub struct SourceFileStore {
    factory: FactoryRef,
}

impl SourceFileStore {
    pub fn name(&self) -> &'static str {
        self.factory.title()
    }

    pub fn store_type(&self) -> &'static str {
        self.factory.type_id()
    }

    pub fn is_read_only(&self) -> bool {
        false
    }

    /// Space figures are not meaningful for in-process backends.
    pub fn total_space(&self) -> FsResult<u64> {
        Err(FsError::Unsupported("total space".to_string()))
    }

    pub fn usable_space(&self) -> FsResult<u64> {
        Err(FsError::Unsupported("usable space".to_string()))
    }
}

fn follow_links(file: SourceRef) -> FsResult<SourceRef> {
    match file.linked_to()? {
        Some(target) => Ok(target),
        None => Ok(file),
    }
}

/// Convenience for the common whole-file read used by adapter consumers.
pub fn read_to_vec(file: &Arc<dyn FileSource>) -> FsResult<Vec<u8>> {
    let mut input = file.input_stream()?;
    let mut out = Vec::new();
    input.read_to_end(&mut out).map_err(FsError::Io)?;
    Ok(out)
}
