//! File header
//!
//! Fixed 24-byte block at offset 0. Serialized with bincode's default
//! fixed-int little-endian encoding, which matches the packed layout.

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OniError, Result};

use super::{
    FILE_MAGIC, INVALID_NODE_ID, INVALID_TIMESTAMP, CURRENT_VERSION, OLDEST_SUPPORTED_VERSION,
};

/// Size of the serialized file header
pub const FILE_HEADER_SIZE: usize = 24;

/// Format version quad
///
/// Field order matters: derived ordering compares major first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub maintenance: u16,
    pub build: u32,
}

impl Version {
    pub const fn new(major: u8, minor: u8, maintenance: u16, build: u32) -> Self {
        Self { major, minor, maintenance, build }
    }

    pub fn is_supported(&self) -> bool {
        *self >= OLDEST_SUPPORTED_VERSION && *self <= CURRENT_VERSION
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.maintenance, self.build)
    }
}

/// Recording header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version: Version,
    /// Largest normalized timestamp across all nodes
    pub global_max_timestamp: u64,
    /// Highest node id handed out
    pub max_node_id: u32,
}

impl FileHeader {
    /// Header an open recorder writes: sentinel trailer values mark the file
    /// as not yet finalized.
    pub fn unfinalized() -> Self {
        Self::finalized(INVALID_TIMESTAMP, INVALID_NODE_ID)
    }

    pub fn finalized(global_max_timestamp: u64, max_node_id: u32) -> Self {
        Self {
            magic: FILE_MAGIC,
            version: CURRENT_VERSION,
            global_max_timestamp,
            max_node_id,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.global_max_timestamp != INVALID_TIMESTAMP && self.max_node_id != INVALID_NODE_ID
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Decode a header without checking magic or version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(OniError::CorruptFile(format!(
                "file header needs {} bytes, got {}",
                FILE_HEADER_SIZE,
                bytes.len()
            )));
        }
        Ok(bincode::deserialize(&bytes[..FILE_HEADER_SIZE])?)
    }

    /// Read a header and check magic and version range.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                OniError::CorruptFile("file shorter than its header".to_string())
            }
            _ => OniError::Io(e),
        })?;

        let header = Self::from_bytes(&buf)?;
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != FILE_MAGIC {
            return Err(OniError::CorruptFile(format!(
                "bad file magic {:02x?}",
                self.magic
            )));
        }
        if !self.version.is_supported() {
            return Err(OniError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}
