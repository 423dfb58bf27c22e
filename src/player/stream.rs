//! Input stream wrapper
//!
//! Tracks the read offset locally and turns short reads into `CorruptFile`.
//! Once released (end of file without repeat) every call fails.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::error::{OniError, Result};
use crate::format::{HeaderWidth, Record, RecordHeader};

pub(crate) struct PlaybackStream<R> {
    inner: Option<R>,
    pos: u64,
}

impl<R: Read + Seek> PlaybackStream<R> {
    pub fn new(inner: R, pos: u64) -> Self {
        Self { inner: Some(inner), pos }
    }

    fn inner(&mut self) -> Result<&mut R> {
        self.inner
            .as_mut()
            .ok_or_else(|| OniError::InvalidOperation("stream is closed".to_string()))
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let pos = self.pos;
        self.inner()?.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => OniError::CorruptFile(format!(
                "truncated: needed {} bytes at offset {}",
                buf.len(),
                pos
            )),
            _ => OniError::Io(e),
        })?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Fill `buf` unless the stream is exactly at its end.
    ///
    /// Returns false on a clean end; a partial fill is `CorruptFile`.
    pub fn read_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner()?.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(OniError::Io(e)),
            }
        }
        self.pos += filled as u64;

        match filled {
            0 => Ok(false),
            n if n == buf.len() => Ok(true),
            n => Err(OniError::CorruptFile(format!(
                "truncated: got {} of {} bytes at offset {}",
                n,
                buf.len(),
                self.pos - n as u64
            ))),
        }
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner()?.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, size: u64) -> Result<()> {
        self.seek_to(self.pos + size)
    }

    /// Read one record's header and fields through `buf`.
    ///
    /// Returns `None` when the stream ends cleanly before a header starts.
    /// The payload, if any, is left unread.
    pub fn next_record(&mut self, buf: &mut [u8], width: HeaderWidth) -> Result<Option<Record<'static>>> {
        let header_size = width.header_size();
        if buf.len() < header_size {
            return Err(OniError::BufferTooSmall {
                needed: header_size,
                capacity: buf.len(),
            });
        }
        if !self.read_or_eof(&mut buf[..header_size])? {
            return Ok(None);
        }

        let header = RecordHeader::decode(&buf[..header_size], width)?;
        let fields_size = header.fields_size as usize;
        if fields_size > buf.len() {
            return Err(OniError::RecordTooLarge {
                size: fields_size,
                max: buf.len(),
            });
        }
        self.read_exact(&mut buf[header_size..fields_size])?;

        let record = Record::decode_fields(&header, &buf[..fields_size], width)?;
        Ok(Some(record.into_owned()))
    }

    /// Like `next_record`, but the end of the stream is corruption.
    pub fn read_record(&mut self, buf: &mut [u8], width: HeaderWidth) -> Result<Record<'static>> {
        let pos = self.pos;
        self.next_record(buf, width)?.ok_or_else(|| {
            OniError::CorruptFile(format!("unexpected end of file at offset {}", pos))
        })
    }

    /// Give up the stream; later calls fail.
    pub fn release(&mut self) -> Option<R> {
        self.inner.take()
    }
}
