//! Link emulation: a delegating wrapper over the capability interface.
//!
//! Every operation forwards to the *target* except the identity-revealing
//! ones (`name`, paths, display), which answer from the link's own
//! identity, and `linked_to`, where a symbolic link reveals its target and
//! a hard link reveals nothing. A hard link is therefore operationally
//! identical to the file it names.

use std::io::Read;
use std::time::SystemTime;

use crate::error::FsResult;
use crate::factory::FactoryRef;
use crate::io::RandomAccessStream;
use crate::principal::{Group, User};
use crate::source::{BackendRef, CloseableWrite, FileSource, FileType, SourceFilter, SourceRef};

pub struct LinkSource {
    identity: SourceRef,
    target: SourceRef,
    hard: bool,
}

impl LinkSource {
    pub fn symbolic(identity: SourceRef, target: SourceRef) -> Self {
        Self {
            identity,
            target,
            hard: false,
        }
    }

    pub fn hard(identity: SourceRef, target: SourceRef) -> Self {
        Self {
            identity,
            target,
            hard: true,
        }
    }

    pub fn is_hard(&self) -> bool {
        self.hard
    }

    pub fn target(&self) -> &SourceRef {
        &self.target
    }

    pub fn identity(&self) -> &SourceRef {
        &self.identity
    }
}

impl FileSource for LinkSource {
    fn factory(&self) -> FactoryRef {
        self.identity.factory()
    }

    fn backend(&self) -> BackendRef<'_> {
        BackendRef::Link(self)
    }

    // Identity-revealing operations answer as the link.

    fn name(&self) -> String {
        self.identity.name()
    }

    fn parent_path(&self) -> Option<String> {
        self.identity.parent_path()
    }

    fn parent(&self) -> FsResult<Option<SourceRef>> {
        self.identity.parent()
    }

    fn absolute_path(&self) -> String {
        self.identity.absolute_path()
    }

    fn canonical_path(&self) -> FsResult<String> {
        self.identity.canonical_path()
    }

    fn linked_to(&self) -> FsResult<Option<SourceRef>> {
        if self.hard {
            Ok(None)
        } else {
            Ok(Some(self.target.clone()))
        }
    }

    // Everything else is the target's business.

    fn file_type(&self) -> FsResult<FileType> {
        self.target.file_type()
    }

    fn is_hidden(&self) -> FsResult<bool> {
        self.target.is_hidden()
    }

    fn length(&self) -> FsResult<u64> {
        self.target.length()
    }

    fn created(&self) -> FsResult<SystemTime> {
        self.target.created()
    }

    fn modified(&self) -> FsResult<SystemTime> {
        self.target.modified()
    }

    fn accessed(&self) -> FsResult<SystemTime> {
        self.target.accessed()
    }

    fn set_created(&self, time: SystemTime) -> FsResult<bool> {
        self.target.set_created(time)
    }

    fn set_modified(&self, time: SystemTime) -> FsResult<bool> {
        self.target.set_modified(time)
    }

    fn set_accessed(&self, time: SystemTime) -> FsResult<bool> {
        self.target.set_accessed(time)
    }

    fn owner(&self) -> FsResult<User> {
        self.target.owner()
    }

    fn group(&self) -> FsResult<Group> {
        self.target.group()
    }

    fn set_owner(&self, owner: &User) -> FsResult<bool> {
        self.target.set_owner(owner)
    }

    fn set_group(&self, group: &Group) -> FsResult<bool> {
        self.target.set_group(group)
    }

    fn can_read(&self) -> FsResult<bool> {
        self.target.can_read()
    }

    fn can_write(&self) -> FsResult<bool> {
        self.target.can_write()
    }

    fn can_execute(&self) -> FsResult<bool> {
        self.target.can_execute()
    }

    fn can_owner_read(&self) -> FsResult<bool> {
        self.target.can_owner_read()
    }

    fn can_owner_write(&self) -> FsResult<bool> {
        self.target.can_owner_write()
    }

    fn can_owner_execute(&self) -> FsResult<bool> {
        self.target.can_owner_execute()
    }

    fn can_group_read(&self) -> FsResult<bool> {
        self.target.can_group_read()
    }

    fn can_group_write(&self) -> FsResult<bool> {
        self.target.can_group_write()
    }

    fn can_group_execute(&self) -> FsResult<bool> {
        self.target.can_group_execute()
    }

    fn can_other_read(&self) -> FsResult<bool> {
        self.target.can_other_read()
    }

    fn can_other_write(&self) -> FsResult<bool> {
        self.target.can_other_write()
    }

    fn can_other_execute(&self) -> FsResult<bool> {
        self.target.can_other_execute()
    }

    fn set_readable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.target.set_readable(value, owner_only)
    }

    fn set_writable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.target.set_writable(value, owner_only)
    }

    fn set_executable(&self, value: bool, owner_only: bool) -> FsResult<bool> {
        self.target.set_executable(value, owner_only)
    }

    fn set_owner_readable(&self, value: bool) -> FsResult<bool> {
        self.target.set_owner_readable(value)
    }

    fn set_owner_writable(&self, value: bool) -> FsResult<bool> {
        self.target.set_owner_writable(value)
    }

    fn set_owner_executable(&self, value: bool) -> FsResult<bool> {
        self.target.set_owner_executable(value)
    }

    fn set_group_readable(&self, value: bool) -> FsResult<bool> {
        self.target.set_group_readable(value)
    }

    fn set_group_writable(&self, value: bool) -> FsResult<bool> {
        self.target.set_group_writable(value)
    }

    fn set_group_executable(&self, value: bool) -> FsResult<bool> {
        self.target.set_group_executable(value)
    }

    fn set_other_readable(&self, value: bool) -> FsResult<bool> {
        self.target.set_other_readable(value)
    }

    fn set_other_writable(&self, value: bool) -> FsResult<bool> {
        self.target.set_other_writable(value)
    }

    fn set_other_executable(&self, value: bool) -> FsResult<bool> {
        self.target.set_other_executable(value)
    }

    fn set_read_only(&self) -> FsResult<bool> {
        self.target.set_read_only()
    }

    fn list(&self) -> FsResult<Vec<SourceRef>> {
        self.target.list()
    }

    fn list_filtered(&self, filter: &dyn SourceFilter) -> FsResult<Vec<SourceRef>> {
        self.target.list_filtered(filter)
    }

    fn get_child(&self, path: &str) -> FsResult<SourceRef> {
        self.target.get_child(path)
    }

    fn is_child_of(&self, other: &dyn FileSource) -> bool {
        self.target.is_child_of(other)
    }

    fn create_new_file(&self) -> FsResult<bool> {
        self.target.create_new_file()
    }

    fn delete(&self) -> FsResult<bool> {
        self.target.delete()
    }

    fn mkdir(&self) -> FsResult<bool> {
        self.target.mkdir()
    }

    fn mkdirs(&self) -> FsResult<bool> {
        self.target.mkdirs()
    }

    fn rename_to(&self, dest: &dyn FileSource) -> FsResult<bool> {
        self.target.rename_to(dest)
    }

    fn input_stream(&self) -> FsResult<Box<dyn Read + Send>> {
        self.target.input_stream()
    }

    fn input_stream_at(&self, start: u64) -> FsResult<Box<dyn Read + Send>> {
        self.target.input_stream_at(start)
    }

    fn output_stream(&self, append: bool) -> FsResult<Box<dyn CloseableWrite>> {
        self.target.output_stream(append)
    }

    fn random_access(&self, mode: &str) -> FsResult<RandomAccessStream> {
        self.target.random_access(mode)
    }

    fn title(&self) -> String {
        self.target.title()
    }
}

