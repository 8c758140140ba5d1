//! Pointer-addressed random access.
//!
//! A [`RandomAccessIo`] controller exposes positioned byte operations over
//! a storage medium; [`stream::RandomAccessStream`] layers the classic
//! file-pointer contract and typed encode/decode on top. A controller is
//! not safe for concurrent callers; serialize access or open independent
//! controllers.

pub mod disk;
pub mod memory;
pub mod stream;

pub use stream::RandomAccessStream;

use crate::error::{FsError, FsResult};
use crate::source::SourceRef;

/// Open mode for a random-access stream: `"r"` fails when the file is
/// missing or unreadable; `"w"`/`"rw"*` create the file when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum OpenMode {
    #[strum(serialize = "r")]
    Read,
    #[strum(serialize = "rw")]
    ReadWrite,
}

impl OpenMode {
    pub fn parse(mode: &str) -> FsResult<Self> {
        if mode == "r" {
            Ok(OpenMode::Read)
        } else if mode == "w" || mode.starts_with("rw") {
            Ok(OpenMode::ReadWrite)
        } else {
            Err(FsError::InvalidArgument(format!("invalid mode: {mode:?}")))
        }
    }

    pub fn read_only(&self) -> bool {
        matches!(self, OpenMode::Read)
    }
}

/// Positioned read/write/length/truncate over one storage medium.
pub trait RandomAccessIo: Send {
    /// Byte at `position`, or `None` at or past end of data.
    fn read(&mut self, position: u64) -> FsResult<Option<u8>>;

    /// Store a byte; writing at or past the current length extends it.
    fn write(&mut self, position: u64, value: u8) -> FsResult<()>;

    fn length(&mut self) -> FsResult<u64>;

    fn set_length(&mut self, new_length: u64) -> FsResult<()>;

    /// Publish buffered changes to the owning file object. A no-op for
    /// media that write through immediately.
    fn save(&mut self) -> FsResult<()>;

    /// Release the medium; must call through to `save`. Idempotent.
    fn close(&mut self) -> FsResult<()>;

    /// The capability object this controller operates on.
    fn source(&self) -> SourceRef;
}
