//! Memory-backed random access over a growable byte buffer.
//!
//! Byte writes stay private to the controller until `save` (or `close`,
//! which saves) publishes them into the owning node. `set_length` publishes
//! immediately; length changes are visible without an explicit flush.

use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::io::RandomAccessIo;
use crate::memory::{MemoryNode, MemorySource};
use crate::source::SourceRef;

/// Hard cap on the backing buffer. Growth requests at or beyond this are
/// rejected up front rather than attempted.
pub const MAX_BUFFER_LEN: u64 = i32::MAX as u64 - 8;

pub struct MemoryIoController {
    node: Arc<MemoryNode>,
    source: MemorySource,
    data: Vec<u8>,
    size: usize,
    dirty: bool,
    closed: bool,
}

impl MemoryIoController {
    pub fn new(source: MemorySource) -> Self {
        let node = source.node().clone();
        let data = node.data_snapshot();
        let size = data.len();
        Self {
            node,
            source,
            data,
            size,
            dirty: false,
            closed: false,
        }
    }

    fn check_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::closed("io controller"));
        }
        Ok(())
    }

    /// Grow the buffer so it can hold `min_capacity` bytes, doubling the
    /// current capacity where that suffices.
    fn ensure_capacity(&mut self, min_capacity: u64) -> FsResult<()> {
        if min_capacity >= MAX_BUFFER_LEN {
            return Err(FsError::InvalidArgument(format!(
                "files larger than {MAX_BUFFER_LEN} bytes are not supported"
            )));
        }
        let min_capacity = min_capacity as usize;
        if min_capacity <= self.data.len() {
            return Ok(());
        }
        let doubled = (self.data.len() as u64).saturating_mul(2);
        let new_len = doubled.max(min_capacity as u64).min(MAX_BUFFER_LEN - 1) as usize;
        self.data.resize(new_len, 0);
        Ok(())
    }
}

impl RandomAccessIo for MemoryIoController {
    fn read(&mut self, position: u64) -> FsResult<Option<u8>> {
        self.check_open()?;
        if position < self.size as u64 {
            Ok(Some(self.data[position as usize]))
        } else {
            Ok(None)
        }
    }

    fn write(&mut self, position: u64, value: u8) -> FsResult<()> {
        self.check_open()?;
        if position >= MAX_BUFFER_LEN {
            return Err(FsError::InvalidArgument(format!(
                "files larger than {MAX_BUFFER_LEN} bytes are not supported"
            )));
        }
        self.ensure_capacity(position + 1)?;
        self.data[position as usize] = value;
        // The buffer is zero based, so size is one more than the highest
        // written position.
        self.size = self.size.max(position as usize + 1);
        self.dirty = true;
        Ok(())
    }

    fn length(&mut self) -> FsResult<u64> {
        self.check_open()?;
        Ok(self.size as u64)
    }

    fn set_length(&mut self, new_length: u64) -> FsResult<()> {
        self.check_open()?;
        self.ensure_capacity(new_length)?;
        self.size = new_length as usize;
        self.dirty = true;
        // Length changes reach the file immediately.
        self.save()
    }

    fn save(&mut self) -> FsResult<()> {
        if self.dirty {
            self.node.set_data(self.data[..self.size].to_vec());
            self.dirty = false;
        }
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.save()?;
        self.closed = true;
        Ok(())
    }

    fn source(&self) -> SourceRef {
        Arc::new(self.source.clone()) as SourceRef
    }
}
