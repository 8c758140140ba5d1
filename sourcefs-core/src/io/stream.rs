//! The random-access stream: a file pointer over a positioned-I/O
//! controller, plus typed big-endian encode/decode.
//!
//! Reads and writes advance the pointer; a read at end of data does not.
//! The stream is `Open(read-only | read-write)` until `close`, after which
//! every operation fails. Read-only streams reject the write family.

use crate::error::{FsError, FsResult};
use crate::io::{OpenMode, RandomAccessIo};
use crate::source::{FileSource, SourceRef};

pub struct RandomAccessStream {
    io: Box<dyn RandomAccessIo>,
    pointer: u64,
    read_only: bool,
    closed: bool,
}

impl RandomAccessStream {
    /// Validate `mode` against the controller's file and wrap it.
    ///
    /// `"r"` requires an existing readable file; `"w"`/`"rw"*` require the
    /// file (created by the caller when absent) to be readable and
    /// writable.
    pub fn new(io: Box<dyn RandomAccessIo>, mode: OpenMode) -> FsResult<Self> {
        let file = io.source();
        match mode {
            OpenMode::Read => {
                if !file.is_file()? || !file.can_read()? {
                    return Err(FsError::NotFound(format!(
                        "{} is not a valid readable file",
                        file.absolute_path()
                    )));
                }
            }
            OpenMode::ReadWrite => {
                if !file.is_file()? || !file.can_read()? || !file.can_write()? {
                    return Err(FsError::NotFound(format!(
                        "{} is not a valid readable/writable file",
                        file.absolute_path()
                    )));
                }
            }
        }
        Ok(Self {
            io,
            pointer: 0,
            read_only: mode.read_only(),
            closed: false,
        })
    }

    pub fn source(&self) -> SourceRef {
        self.io.source()
    }

    fn check_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::closed("stream"));
        }
        Ok(())
    }

    fn check_writable(&self) -> FsResult<()> {
        self.check_open()?;
        if self.read_only {
            return Err(FsError::InvalidArgument(
                "cannot write in read-only mode".to_string(),
            ));
        }
        Ok(())
    }

    /// Next byte, advancing the pointer; `None` at end of data.
    pub fn read(&mut self) -> FsResult<Option<u8>> {
        self.check_open()?;
        let byte = self.io.read(self.pointer)?;
        if byte.is_some() {
            self.pointer += 1;
        }
        Ok(byte)
    }

    /// Fill as much of `buf` as the data allows; 0 means end of data.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.check_open()?;
        let mut count = 0;
        while count < buf.len() {
            match self.read()? {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Fill all of `buf` or fail with `EndOfStream`.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> FsResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.read_bytes(&mut buf[filled..])?;
            if count == 0 {
                return Err(FsError::EndOfStream);
            }
            filled += count;
        }
        Ok(())
    }

    /// Skip forward up to `n` bytes, clamped at end of data; returns the
    /// distance actually skipped.
    pub fn skip(&mut self, n: i64) -> FsResult<i64> {
        self.check_open()?;
        if n <= 0 {
            return Ok(0);
        }
        let pos = self.pointer;
        let len = self.length()?;
        let new_pos = (pos + n as u64).min(len);
        if new_pos <= pos {
            // Already at or past end of data.
            return Ok(0);
        }
        self.seek(new_pos)?;
        Ok((new_pos - pos) as i64)
    }

    pub fn write_byte(&mut self, value: u8) -> FsResult<()> {
        self.check_writable()?;
        self.io.write(self.pointer, value)?;
        self.pointer += 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> FsResult<()> {
        for &byte in buf {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    pub fn file_pointer(&self) -> u64 {
        self.pointer
    }

    /// Move the pointer; may point past end of data (length changes only
    /// when something is written there).
    pub fn seek(&mut self, position: u64) -> FsResult<()> {
        self.check_open()?;
        self.pointer = position;
        Ok(())
    }

    pub fn length(&mut self) -> FsResult<u64> {
        self.check_open()?;
        self.io.length()
    }

    /// Truncate or extend. Shrinking below the pointer clamps the pointer
    /// to the new length.
    pub fn set_length(&mut self, new_length: u64) -> FsResult<()> {
        self.check_writable()?;
        self.io.set_length(new_length)?;
        if new_length < self.pointer {
            self.pointer = new_length;
        }
        Ok(())
    }

    /// Idempotent; a pending save failure surfaces here rather than being
    /// masked.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.io.close()
    }

    // Typed big-endian decode.

    pub fn read_u8(&mut self) -> FsResult<u8> {
        self.read()?.ok_or(FsError::EndOfStream)
    }

    pub fn read_bool(&mut self) -> FsResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i8(&mut self) -> FsResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> FsResult<u16> {
        let mut buf = [0u8; 2];
        self.read_fully(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_i16(&mut self) -> FsResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> FsResult<i32> {
        let mut buf = [0u8; 4];
        self.read_fully(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_i64(&mut self) -> FsResult<i64> {
        let mut buf = [0u8; 8];
        self.read_fully(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// NaN bit patterns collapse to the canonical NaN.
    pub fn read_f32(&mut self) -> FsResult<f32> {
        let value = f32::from_bits(self.read_i32()? as u32);
        Ok(if value.is_nan() { f32::NAN } else { value })
    }

    /// NaN bit patterns collapse to the canonical NaN.
    pub fn read_f64(&mut self) -> FsResult<f64> {
        let value = f64::from_bits(self.read_i64()? as u64);
        Ok(if value.is_nan() { f64::NAN } else { value })
    }

    // Typed big-endian encode.

    pub fn write_bool(&mut self, value: bool) -> FsResult<()> {
        self.write_byte(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> FsResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> FsResult<()> {
        self.write_u16(value as u16)
    }

    pub fn write_i32(&mut self, value: i32) -> FsResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> FsResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> FsResult<()> {
        let bits = if value.is_nan() {
            f32::NAN.to_bits()
        } else {
            value.to_bits()
        };
        self.write_bytes(&bits.to_be_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> FsResult<()> {
        let bits = if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        };
        self.write_bytes(&bits.to_be_bytes())
    }

    /// Next CR, LF or CRLF terminated line; bytes map to chars directly
    /// (the low eight bits). `None` only when end of data arrives before a
    /// single byte.
    pub fn read_line(&mut self) -> FsResult<Option<String>> {
        let mut line = String::new();
        let mut saw_byte = false;
        loop {
            match self.read()? {
                None => break,
                Some(b'\n') => {
                    saw_byte = true;
                    break;
                }
                Some(b'\r') => {
                    saw_byte = true;
                    let after_cr = self.pointer;
                    if self.read()? != Some(b'\n') {
                        self.seek(after_cr)?;
                    }
                    break;
                }
                Some(byte) => {
                    saw_byte = true;
                    line.push(byte as char);
                }
            }
        }
        if !saw_byte && line.is_empty() {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Read a length-prefixed modified-UTF-8 string: a 2-byte big-endian
    /// count of encoded bytes, then 1/2/3-byte runs over UTF-16 code units.
    pub fn read_utf(&mut self) -> FsResult<String> {
        let byte_len = self.read_u16()? as usize;
        let mut bytes = vec![0u8; byte_len];
        self.read_fully(&mut bytes)?;

        let malformed =
            || FsError::InvalidArgument("malformed modified-UTF-8 input".to_string());

        let mut units: Vec<u16> = Vec::with_capacity(byte_len);
        let mut idx = 0;
        while idx < bytes.len() {
            let a = bytes[idx];
            if a & 0x80 == 0 {
                units.push(a as u16);
                idx += 1;
            } else if a & 0xE0 == 0xC0 {
                let b = *bytes.get(idx + 1).ok_or_else(malformed)?;
                if b & 0xC0 != 0x80 {
                    return Err(malformed());
                }
                units.push(((a as u16 & 0x1F) << 6) | (b as u16 & 0x3F));
                idx += 2;
            } else if a & 0xF0 == 0xE0 {
                let b = *bytes.get(idx + 1).ok_or_else(malformed)?;
                let c = *bytes.get(idx + 2).ok_or_else(malformed)?;
                if b & 0xC0 != 0x80 || c & 0xC0 != 0x80 {
                    return Err(malformed());
                }
                units.push(
                    ((a as u16 & 0x0F) << 12) | ((b as u16 & 0x3F) << 6) | (c as u16 & 0x3F),
                );
                idx += 3;
            } else {
                return Err(malformed());
            }
        }

        String::from_utf16(&units).map_err(|_| malformed())
    }

    /// Write a string in length-prefixed modified UTF-8. The prefix counts
    /// encoded bytes, not characters; NUL and non-ASCII code units take the
    /// 2/3-byte runs. Encodings beyond 65535 bytes are rejected.
    pub fn write_utf(&mut self, value: &str) -> FsResult<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let mut byte_len: usize = 0;
        for &unit in &units {
            byte_len += match unit {
                0x0001..=0x007F => 1,
                0x0000 | 0x0080..=0x07FF => 2,
                _ => 3,
            };
        }
        if byte_len > 65535 {
            return Err(FsError::InvalidArgument(format!(
                "encoded string length {byte_len} exceeds 65535 bytes"
            )));
        }

        let mut bytes = Vec::with_capacity(byte_len + 2);
        bytes.extend_from_slice(&(byte_len as u16).to_be_bytes());
        for &unit in &units {
            match unit {
                0x0001..=0x007F => bytes.push(unit as u8),
                0x0000 | 0x0080..=0x07FF => {
                    bytes.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                    bytes.push(0x80 | (unit & 0x3F) as u8);
                }
                _ => {
                    bytes.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                    bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                    bytes.push(0x80 | (unit & 0x3F) as u8);
                }
            }
        }
        self.write_bytes(&bytes)
    }
}

impl Drop for RandomAccessStream {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                tracing::warn!(?e, "random-access stream dropped with failing close");
            }
        }
    }
}
