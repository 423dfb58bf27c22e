//! ONI container format
//!
//! Byte-exact layout of the recording file. Everything is little-endian and
//! packed with no padding.
//!
//! ## File Layout
//! ```text
//! ┌──────────────────────┬──────────┬──────────┬─────┬──────────┐
//! │   FileHeader (24)    │ Record 1 │ Record 2 │ ... │ Record N │
//! └──────────────────────┴──────────┴──────────┴─────┴──────────┘
//! ```
//!
//! ### FileHeader
//! ```text
//! ┌───────────┬─────────────┬───────────────────┬──────────────┐
//! │ "NI10"(4) │ Version (8) │ Max Timestamp (8) │ Max Node (4) │
//! └───────────┴─────────────┴───────────────────┴──────────────┘
//! ```
//!
//! ### Record
//! ```text
//! ┌───────────┬──────────┬──────────┬────────────┬─────────────┬──────────┐
//! │ Magic (4) │ Type (4) │ Node (4) │ Fields (4) │ Payload (4) │ Undo (8) │
//! ├───────────┴──────────┴──────────┴────────────┴─────────────┴──────────┤
//! │                  type-specific fields ...                             │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │                  payload (NewData frame / SeekTable entries)          │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Fields` counts the header plus the type-specific fields, never the
//! payload. Files older than 1.0.1.0 store `Undo` as a u32, which makes the
//! header 24 bytes instead of 28.

mod fields;
mod header;
mod index;
mod record;

pub use fields::{FieldReader, FieldWriter};
pub use header::{FileHeader, Version, FILE_HEADER_SIZE};
pub use index::{decode_index, encode_index, entry_size, SeekIndexEntry};
pub use record::{
    NodeAdded, NodeAddedShape, Property, PropertyValue, Record, RecordBody, RecordHeader,
    RecordType, SeekInfo,
};

/// File magic, "NI10"
pub const FILE_MAGIC: [u8; 4] = *b"NI10";

/// Record magic, reads "NIR\0" on disk
pub const RECORD_MAGIC: u32 = 0x0052_494E;

/// Node id carried by records that belong to no node (End)
pub const INVALID_NODE_ID: u32 = u32::MAX;

/// Timestamp sentinel written into the header of an unfinalized recording
pub const INVALID_TIMESTAMP: u64 = u64::MAX;

/// Version written by this crate
pub const CURRENT_VERSION: Version = Version::new(1, 0, 1, 0);

/// Oldest version the reader accepts
pub const OLDEST_SUPPORTED_VERSION: Version = Version::new(1, 0, 0, 4);

/// First version whose records carry a 64-bit undo position
pub const FIRST_64BIT_VERSION: Version = Version::new(1, 0, 1, 0);

/// Largest fields section of a NewData record (header + timestamp + frame)
pub const NEW_DATA_MAX_FIELDS: usize = HeaderWidth::Current64.header_size() + 8 + 4;

/// On-disk width of the record header, fixed per file by its version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWidth {
    /// u32 undo position (files before 1.0.1.0)
    Legacy32,
    /// u64 undo position
    Current64,
}

impl HeaderWidth {
    /// Select the width once for a whole file
    pub fn for_version(version: Version) -> Self {
        if version < FIRST_64BIT_VERSION {
            HeaderWidth::Legacy32
        } else {
            HeaderWidth::Current64
        }
    }

    /// Size of a record header in bytes
    pub const fn header_size(self) -> usize {
        match self {
            HeaderWidth::Legacy32 => 24,
            HeaderWidth::Current64 => 28,
        }
    }

    /// Size of a file offset field (undo position, seek position)
    pub const fn offset_size(self) -> usize {
        match self {
            HeaderWidth::Legacy32 => 4,
            HeaderWidth::Current64 => 8,
        }
    }
}
