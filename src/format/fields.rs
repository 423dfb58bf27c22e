//! Bounded field cursors
//!
//! `FieldWriter` fills a caller-provided slice and refuses to write past its
//! end. `FieldReader` walks a decoded record's fields and hands strings and
//! blobs back as slices into the input.

use std::borrow::Cow;

use bytes::{Buf, BufMut};

use crate::error::{OniError, Result};

/// Writes little-endian fields into a fixed-capacity slice
pub struct FieldWriter<'a> {
    out: &'a mut [u8],
    capacity: usize,
}

impl<'a> FieldWriter<'a> {
    pub fn new(out: &'a mut [u8]) -> Self {
        let capacity = out.len();
        Self { out, capacity }
    }

    /// Bytes written so far
    pub fn written(&self) -> usize {
        self.capacity - self.out.len()
    }

    fn reserve(&self, size: usize) -> Result<()> {
        if self.out.remaining_mut() < size {
            return Err(OniError::BufferTooSmall {
                needed: self.written() + size,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Leave `size` bytes untouched, to be filled in later
    pub fn skip(&mut self, size: usize) -> Result<()> {
        self.reserve(size)?;
        let out = std::mem::take(&mut self.out);
        self.out = &mut out[size..];
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        self.out.put_u32_le(value);
        Ok(())
    }

    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.reserve(4)?;
        self.out.put_i32_le(value);
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.reserve(8)?;
        self.out.put_u64_le(value);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.out.put_slice(bytes);
        Ok(())
    }

    /// u32 length (terminator included), the bytes, then a NUL
    pub fn put_str(&mut self, value: &str) -> Result<()> {
        let size = value.len() + 1;
        self.reserve(4 + size)?;
        self.out.put_u32_le(size as u32);
        self.out.put_slice(value.as_bytes());
        self.out.put_u8(0);
        Ok(())
    }
}

/// Reads little-endian fields out of a borrowed record buffer
pub struct FieldReader<'a> {
    input: &'a [u8],
}

impl<'a> FieldReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    pub fn remaining(&self) -> usize {
        self.input.remaining()
    }

    fn require(&self, size: usize, what: &str) -> Result<()> {
        if self.input.remaining() < size {
            return Err(OniError::CorruptFile(format!(
                "{} overruns record: need {} bytes, {} left",
                what,
                size,
                self.input.remaining()
            )));
        }
        Ok(())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.require(4, "u32 field")?;
        Ok(self.input.get_u32_le())
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.require(4, "i32 field")?;
        Ok(self.input.get_i32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.require(8, "u64 field")?;
        Ok(self.input.get_u64_le())
    }

    /// Offset-sized field: u32 in legacy files, u64 otherwise
    pub fn get_offset(&mut self, offset_size: usize) -> Result<u64> {
        match offset_size {
            4 => self.get_u32().map(u64::from),
            _ => self.get_u64(),
        }
    }

    pub fn get_bytes(&mut self, size: usize) -> Result<&'a [u8]> {
        self.require(size, "byte field")?;
        let (head, tail) = self.input.split_at(size);
        self.input = tail;
        Ok(head)
    }

    /// Length-prefixed string. Borrowed unless it holds invalid UTF-8.
    pub fn get_str(&mut self) -> Result<Cow<'a, str>> {
        let size = self.get_u32()? as usize;
        let raw = self.get_bytes(size)?;
        Ok(String::from_utf8_lossy(strip_nul(raw)))
    }
}

/// Drop a trailing terminator if present
pub(crate) fn strip_nul(raw: &[u8]) -> &[u8] {
    match raw.split_last() {
        Some((&0, rest)) => rest,
        _ => raw,
    }
}
