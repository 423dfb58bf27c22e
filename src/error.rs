//! Error types for onirec
//!
//! Provides a unified error type for recording, playback and record codec
//! operations.

use thiserror::Error;

use crate::format::Version;

/// Result type alias using OniError
pub type Result<T> = std::result::Result<T, OniError>;

/// Unified error type for onirec operations
#[derive(Debug, Error)]
pub enum OniError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    #[error("Corrupt record header: {0}")]
    CorruptHeader(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(Version),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Buffer too small: need {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Node Errors
    // -------------------------------------------------------------------------
    #[error("Bad node reference: {0}")]
    BadNodeReference(String),

    // -------------------------------------------------------------------------
    // Seek Errors
    // -------------------------------------------------------------------------
    #[error("No matching undo record at position {0}")]
    NoMatchingUndoRecord(u64),

    #[error("No matching record found")]
    NoMatch,

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OniError {
    /// True for errors that mean the file content itself is bad.
    ///
    /// A broken undo chain can only come from a malformed file, so it counts.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            OniError::CorruptFile(_)
                | OniError::CorruptHeader(_)
                | OniError::NoMatchingUndoRecord(_)
        )
    }
}

impl From<bincode::Error> for OniError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                OniError::CorruptFile("truncated fixed-layout block".to_string())
            }
            bincode::ErrorKind::Io(io) => OniError::Io(io),
            other => OniError::Serialization(other.to_string()),
        }
    }
}
