//! Disk-backed random access: thin delegation to the OS file primitives.
//! Writes are immediate, so `save` has nothing to do.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{FsError, FsResult};
use crate::io::{OpenMode, RandomAccessIo};
use crate::source::{FileSource, SourceRef};

pub struct DiskIoController {
    file: File,
    source: SourceRef,
    closed: bool,
}

impl DiskIoController {
    pub fn open(source: SourceRef, mode: OpenMode) -> FsResult<Self> {
        let path = source.absolute_path();
        let file = OpenOptions::new()
            .read(true)
            .write(!mode.read_only())
            .create(!mode.read_only())
            .open(&path)
            .map_err(|e| FsError::from_io(e, &path))?;
        Ok(Self {
            file,
            source,
            closed: false,
        })
    }

    fn check_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::closed("io controller"));
        }
        Ok(())
    }
}

impl RandomAccessIo for DiskIoController {
    fn read(&mut self, position: u64) -> FsResult<Option<u8>> {
        self.check_open()?;
        self.file.seek(SeekFrom::Start(position))?;
        let mut byte = [0u8; 1];
        match self.file.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write(&mut self, position: u64, value: u8) -> FsResult<()> {
        self.check_open()?;
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(&[value])?;
        Ok(())
    }

    fn length(&mut self) -> FsResult<u64> {
        self.check_open()?;
        Ok(self.file.metadata()?.len())
    }

    fn set_length(&mut self, new_length: u64) -> FsResult<()> {
        self.check_open()?;
        self.file.set_len(new_length)?;
        Ok(())
    }

    fn save(&mut self) -> FsResult<()> {
        // Positioned writes go straight to the OS.
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.file.flush()?;
        self.closed = true;
        Ok(())
    }

    fn source(&self) -> SourceRef {
        self.source.clone()
    }
}
