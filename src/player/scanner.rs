//! Raw record iteration
//!
//! Walks every record of a file in storage order without interpreting it,
//! including the trailers written after End. Unfinalized recordings are
//! accepted, which makes the scanner the tool for inspecting aborted files.

use std::io::{Read, Seek, SeekFrom};

use crate::config::Config;
use crate::error::Result;
use crate::format::{FileHeader, HeaderWidth, Record, FILE_HEADER_SIZE, NEW_DATA_MAX_FIELDS};

use super::stream::PlaybackStream;

/// One record and the offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRecord {
    pub position: u64,
    pub record: Record<'static>,
}

/// Iterator over the records of an ONI stream
pub struct RecordScanner<R> {
    stream: PlaybackStream<R>,
    header: FileHeader,
    width: HeaderWidth,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read + Seek> RecordScanner<R> {
    /// Read the header (magic and version are checked) and position at the
    /// first record.
    pub fn new(mut stream: R, config: &Config) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut stream)?;
        if !header.is_finalized() {
            tracing::warn!("Scanning unfinalized recording");
        }

        Ok(Self {
            stream: PlaybackStream::new(stream, FILE_HEADER_SIZE as u64),
            width: HeaderWidth::for_version(header.version),
            header,
            buf: vec![0; config.max_record_size.max(NEW_DATA_MAX_FIELDS)],
            done: false,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn width(&self) -> HeaderWidth {
        self.width
    }

    fn next_record(&mut self) -> Result<Option<ScannedRecord>> {
        let position = self.stream.tell();
        let record = match self.stream.next_record(&mut self.buf, self.width)? {
            Some(record) => record,
            None => return Ok(None),
        };
        self.stream.skip(u64::from(record.payload_size))?;
        Ok(Some(ScannedRecord { position, record }))
    }
}

impl<R: Read + Seek> Iterator for RecordScanner<R> {
    type Item = Result<ScannedRecord>;

    /// Stops after the stream ends or after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(scanned)) => Some(Ok(scanned)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
