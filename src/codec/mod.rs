//! Payload codec port
//!
//! Frame payloads pass through an external compressor selected by a
//! four-character id. This module defines the id, the encode/decode contract
//! and a registry that resolves ids to codec instances. The uncompressed ids
//! bypass the codec entirely.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{OniError, Result};

// =============================================================================
// Codec Id
// =============================================================================

/// Four-character codec id, stored little-endian (first char in the low byte)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CodecId(pub u32);

impl CodecId {
    /// No codec announced
    pub const NULL: CodecId = CodecId(0);
    pub const UNCOMPRESSED: CodecId = CodecId::from_fourcc(*b"NONE");
    pub const JPEG: CodecId = CodecId::from_fourcc(*b"JPEG");
    pub const Z16: CodecId = CodecId::from_fourcc(*b"16zP");
    pub const Z16_WITH_TABLES: CodecId = CodecId::from_fourcc(*b"16zT");
    pub const Z8: CodecId = CodecId::from_fourcc(*b"Im8z");

    pub const fn from_fourcc(chars: [u8; 4]) -> Self {
        CodecId(u32::from_le_bytes(chars))
    }

    pub fn fourcc(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Payloads of this id are stored as-is
    pub fn is_passthrough(self) -> bool {
        self == CodecId::NULL || self == CodecId::UNCOMPRESSED
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars = self.fourcc();
        if chars.iter().all(|c| c.is_ascii_graphic()) {
            chars.iter().try_for_each(|c| write!(f, "{}", *c as char))
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl std::str::FromStr for CodecId {
    type Err = OniError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().map_err(|_| {
            OniError::Config(format!("codec id '{}' must be exactly four characters", s))
        })?;
        Ok(CodecId::from_fourcc(bytes))
    }
}

// =============================================================================
// Codec Contract
// =============================================================================

/// Frame compressor/decompressor bound to one node
pub trait PayloadCodec: Send {
    fn id(&self) -> CodecId;

    /// Append the encoded form of `raw` to `out`
    fn encode(&mut self, raw: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Append the decoded form of `encoded` to `out`
    fn decode(&mut self, encoded: &[u8], out: &mut Vec<u8>) -> Result<()>;
}

/// Identity codec
#[derive(Debug, Default, Clone, Copy)]
pub struct Uncompressed;

impl PayloadCodec for Uncompressed {
    fn id(&self) -> CodecId {
        CodecId::UNCOMPRESSED
    }

    fn encode(&mut self, raw: &[u8], out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(raw);
        Ok(())
    }

    fn decode(&mut self, encoded: &[u8], out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(encoded);
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Builds a codec for the named node
pub type CodecFactory = Arc<dyn Fn(&str) -> Result<Box<dyn PayloadCodec>> + Send + Sync>;

/// Resolves codec ids to fresh codec instances
#[derive(Clone, Default)]
pub struct CodecRegistry {
    factories: HashMap<CodecId, CodecFactory>,
}

impl CodecRegistry {
    /// Registry that knows the uncompressed codec
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(CodecId::UNCOMPRESSED, |_| Ok(Box::new(Uncompressed)));
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: CodecId, factory: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Box<dyn PayloadCodec>> + Send + Sync + 'static,
    {
        self.factories.insert(id, Arc::new(factory));
        self
    }

    pub fn contains(&self, id: CodecId) -> bool {
        self.factories.contains_key(&id)
    }

    /// Instantiate the codec registered for `id`.
    pub fn create(&self, id: CodecId, node_name: &str) -> Result<Box<dyn PayloadCodec>> {
        let factory = self.factories.get(&id).ok_or_else(|| {
            OniError::Codec(format!("no codec registered for '{}' (node '{}')", id, node_name))
        })?;
        factory(node_name)
    }

    /// Codec handle for a node, or `None` when its payloads bypass the codec.
    pub fn resolve(&self, id: CodecId, node_name: &str) -> Result<Option<Box<dyn PayloadCodec>>> {
        if id.is_passthrough() {
            return Ok(None);
        }
        self.create(id, node_name).map(Some)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.factories.keys().map(|id| id.to_string()).collect();
        ids.sort();
        f.debug_struct("CodecRegistry").field("codecs", &ids).finish()
    }
}
