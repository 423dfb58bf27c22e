//! Seek index (SeekTable payload)
//!
//! One entry per frame plus a zeroed entry for frame 0. Current files store
//! the seek position as u64 (20-byte entries), legacy files as u32 (16).

use serde::{Deserialize, Serialize};

use crate::error::{OniError, Result};

use super::HeaderWidth;

/// Maps a frame to its timestamp, configuration id and NewData offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekIndexEntry {
    pub timestamp: u64,
    pub config_id: u32,
    /// Absolute offset of the frame's NewData record
    pub seek_pos: u64,
}

#[derive(Serialize, Deserialize)]
struct LegacySeekIndexEntry {
    timestamp: u64,
    config_id: u32,
    seek_pos: u32,
}

/// Size of one serialized entry
pub fn entry_size(width: HeaderWidth) -> usize {
    match width {
        HeaderWidth::Legacy32 => 16,
        HeaderWidth::Current64 => 20,
    }
}

/// Serialize `entries` (frame 1 onward) with the leading zero entry.
pub fn encode_index(entries: &[SeekIndexEntry], width: HeaderWidth) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((entries.len() + 1) * entry_size(width));
    let zero = SeekIndexEntry::default();

    for entry in std::iter::once(&zero).chain(entries) {
        match width {
            HeaderWidth::Current64 => bincode::serialize_into(&mut out, entry)?,
            HeaderWidth::Legacy32 => {
                let seek_pos = u32::try_from(entry.seek_pos).map_err(|_| {
                    OniError::Serialization(format!(
                        "seek position {} does not fit a legacy index entry",
                        entry.seek_pos
                    ))
                })?;
                let legacy = LegacySeekIndexEntry {
                    timestamp: entry.timestamp,
                    config_id: entry.config_id,
                    seek_pos,
                };
                bincode::serialize_into(&mut out, &legacy)?;
            }
        }
    }
    Ok(out)
}

/// Decode a full table of `frames + 1` entries; index 0 is the zero entry.
pub fn decode_index(bytes: &[u8], frames: u32, width: HeaderWidth) -> Result<Vec<SeekIndexEntry>> {
    let size = entry_size(width);
    let count = frames as usize + 1;
    if bytes.len() != count * size {
        return Err(OniError::CorruptFile(format!(
            "seek table for {} frames should be {} bytes, got {}",
            frames,
            count * size,
            bytes.len()
        )));
    }

    bytes
        .chunks_exact(size)
        .map(|chunk| -> Result<SeekIndexEntry> {
            match width {
                HeaderWidth::Current64 => Ok(bincode::deserialize(chunk)?),
                HeaderWidth::Legacy32 => {
                    let legacy: LegacySeekIndexEntry = bincode::deserialize(chunk)?;
                    Ok(SeekIndexEntry {
                        timestamp: legacy.timestamp,
                        config_id: legacy.config_id,
                        seek_pos: u64::from(legacy.seek_pos),
                    })
                }
            }
        })
        .collect()
}
