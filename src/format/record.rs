//! Record header and record variants
//!
//! Encoding writes header + fields into a caller buffer; payloads (frame
//! bytes, seek tables) are streamed separately by the writer. Decoding takes
//! header + fields and borrows strings and blobs from the input.

use std::borrow::Cow;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::codec::CodecId;
use crate::error::{OniError, Result};
use crate::node::NodeType;

use super::fields::{strip_nul, FieldReader, FieldWriter};
use super::{HeaderWidth, RECORD_MAGIC};

// =============================================================================
// Record Type
// =============================================================================

/// On-disk record type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RecordType {
    NodeAddedV1 = 0x02,
    IntProperty = 0x03,
    RealProperty = 0x04,
    StringProperty = 0x05,
    GeneralProperty = 0x06,
    NodeRemoved = 0x07,
    NodeDataBegin = 0x08,
    NodeStateReady = 0x09,
    NewData = 0x0A,
    End = 0x0B,
    NodeAddedV2 = 0x0C,
    NodeAddedV3 = 0x0D,
    SeekTable = 0x0E,
}

impl TryFrom<u32> for RecordType {
    type Error = OniError;

    fn try_from(raw: u32) -> Result<Self> {
        Ok(match raw {
            0x02 => RecordType::NodeAddedV1,
            0x03 => RecordType::IntProperty,
            0x04 => RecordType::RealProperty,
            0x05 => RecordType::StringProperty,
            0x06 => RecordType::GeneralProperty,
            0x07 => RecordType::NodeRemoved,
            0x08 => RecordType::NodeDataBegin,
            0x09 => RecordType::NodeStateReady,
            0x0A => RecordType::NewData,
            0x0B => RecordType::End,
            0x0C => RecordType::NodeAddedV2,
            0x0D => RecordType::NodeAddedV3,
            0x0E => RecordType::SeekTable,
            other => {
                return Err(OniError::CorruptFile(format!(
                    "unknown record type 0x{:02x}",
                    other
                )))
            }
        })
    }
}

// =============================================================================
// Record Header
// =============================================================================

/// Common prefix of every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: RecordType,
    pub node_id: u32,
    /// Header plus type-specific fields, excluding payload
    pub fields_size: u32,
    pub payload_size: u32,
    /// Previous record for the same (node, property), or 0
    pub undo_pos: u64,
}

impl RecordHeader {
    /// Parse and validate the header at the start of `bytes`.
    pub fn decode(bytes: &[u8], width: HeaderWidth) -> Result<Self> {
        let header_size = width.header_size();
        if bytes.len() < header_size {
            return Err(OniError::CorruptHeader(format!(
                "need {} header bytes, got {}",
                header_size,
                bytes.len()
            )));
        }

        let mut input = &bytes[..header_size];
        let magic = input.get_u32_le();
        if magic != RECORD_MAGIC {
            return Err(OniError::CorruptHeader(format!(
                "bad record magic 0x{:08x}",
                magic
            )));
        }
        let raw_type = input.get_u32_le();
        let node_id = input.get_u32_le();
        let fields_size = input.get_u32_le();
        let payload_size = input.get_u32_le();
        let undo_pos = match width {
            HeaderWidth::Legacy32 => u64::from(input.get_u32_le()),
            HeaderWidth::Current64 => input.get_u64_le(),
        };

        if (fields_size as usize) < header_size {
            return Err(OniError::CorruptHeader(format!(
                "fields size {} smaller than header size {}",
                fields_size, header_size
            )));
        }

        Ok(Self {
            record_type: RecordType::try_from(raw_type)?,
            node_id,
            fields_size,
            payload_size,
            undo_pos,
        })
    }

    /// Write the header into the first `width.header_size()` bytes of `out`.
    pub fn encode(&self, out: &mut [u8], width: HeaderWidth) -> Result<()> {
        let header_size = width.header_size();
        if out.len() < header_size {
            return Err(OniError::BufferTooSmall {
                needed: header_size,
                capacity: out.len(),
            });
        }

        let mut dst = &mut out[..header_size];
        dst.put_u32_le(RECORD_MAGIC);
        dst.put_u32_le(self.record_type as u32);
        dst.put_u32_le(self.node_id);
        dst.put_u32_le(self.fields_size);
        dst.put_u32_le(self.payload_size);
        match width {
            HeaderWidth::Legacy32 => dst.put_u32_le(narrow_offset(self.undo_pos)?),
            HeaderWidth::Current64 => dst.put_u64_le(self.undo_pos),
        }
        Ok(())
    }
}

fn narrow_offset(pos: u64) -> Result<u32> {
    u32::try_from(pos).map_err(|_| {
        OniError::Serialization(format!("offset {} does not fit a legacy 32-bit field", pos))
    })
}

// =============================================================================
// Record Variants
// =============================================================================

/// Which NodeAdded layout a record was stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeAddedShape {
    /// name, type, codec
    V1,
    /// + frames, min/max timestamp
    V2,
    /// + seek table position
    V3,
}

impl NodeAddedShape {
    fn record_type(self) -> RecordType {
        match self {
            NodeAddedShape::V1 => RecordType::NodeAddedV1,
            NodeAddedShape::V2 => RecordType::NodeAddedV2,
            NodeAddedShape::V3 => RecordType::NodeAddedV3,
        }
    }
}

/// NodeAdded in its newest in-memory shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAdded<'a> {
    pub name: Cow<'a, str>,
    pub node_type: NodeType,
    pub codec: CodecId,
    pub frames: u32,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    /// 0 when the node has no seek table
    pub seek_table_pos: u64,
    /// Layout on disk; older layouts decode with zeroed stats
    pub shape: NodeAddedShape,
}

impl<'a> NodeAdded<'a> {
    /// A freshly announced node, seek info left blank
    pub fn new(name: impl Into<Cow<'a, str>>, node_type: NodeType, codec: CodecId) -> Self {
        Self {
            name: name.into(),
            node_type,
            codec,
            frames: 0,
            min_timestamp: 0,
            max_timestamp: 0,
            seek_table_pos: 0,
            shape: NodeAddedShape::V3,
        }
    }

    fn decode(fields: &mut FieldReader<'a>, shape: NodeAddedShape, width: HeaderWidth) -> Result<Self> {
        let name = fields.get_str()?;
        let node_type = NodeType::from(fields.get_i32()?);
        let codec = CodecId(fields.get_u32()?);
        let mut added = Self::new(name, node_type, codec).lift_from(shape);

        if shape >= NodeAddedShape::V2 {
            added.frames = fields.get_u32()?;
            added.min_timestamp = fields.get_u64()?;
            added.max_timestamp = fields.get_u64()?;
        }
        if shape >= NodeAddedShape::V3 {
            added.seek_table_pos = fields.get_offset(width.offset_size())?;
        }
        Ok(added)
    }

    /// Keep the newest layout in memory, remembering where it came from.
    fn lift_from(mut self, shape: NodeAddedShape) -> Self {
        self.shape = shape;
        self
    }

    fn encode(&self, fields: &mut FieldWriter<'_>, width: HeaderWidth) -> Result<()> {
        fields.put_str(&self.name)?;
        fields.put_i32(self.node_type.as_raw())?;
        fields.put_u32(self.codec.0)?;

        if self.shape >= NodeAddedShape::V2 {
            fields.put_u32(self.frames)?;
            fields.put_u64(self.min_timestamp)?;
            fields.put_u64(self.max_timestamp)?;
        }
        if self.shape >= NodeAddedShape::V3 {
            match width {
                HeaderWidth::Legacy32 => fields.put_u32(narrow_offset(self.seek_table_pos)?)?,
                HeaderWidth::Current64 => fields.put_u64(self.seek_table_pos)?,
            }
        }
        Ok(())
    }

    pub fn into_owned(self) -> NodeAdded<'static> {
        NodeAdded {
            name: Cow::Owned(self.name.into_owned()),
            node_type: self.node_type,
            codec: self.codec,
            frames: self.frames,
            min_timestamp: self.min_timestamp,
            max_timestamp: self.max_timestamp,
            seek_table_pos: self.seek_table_pos,
            shape: self.shape,
        }
    }
}

/// Decoded property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue<'a> {
    Int(u64),
    Real(f64),
    String(Cow<'a, str>),
    General(Cow<'a, [u8]>),
}

impl<'a> PropertyValue<'a> {
    pub fn record_type(&self) -> RecordType {
        match self {
            PropertyValue::Int(_) => RecordType::IntProperty,
            PropertyValue::Real(_) => RecordType::RealProperty,
            PropertyValue::String(_) => RecordType::StringProperty,
            PropertyValue::General(_) => RecordType::GeneralProperty,
        }
    }

    pub fn into_owned(self) -> PropertyValue<'static> {
        match self {
            PropertyValue::Int(v) => PropertyValue::Int(v),
            PropertyValue::Real(v) => PropertyValue::Real(v),
            PropertyValue::String(s) => PropertyValue::String(Cow::Owned(s.into_owned())),
            PropertyValue::General(b) => PropertyValue::General(Cow::Owned(b.into_owned())),
        }
    }
}

/// Property change: name, u32 size, raw value bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Property<'a> {
    pub name: Cow<'a, str>,
    pub value: PropertyValue<'a>,
}

impl<'a> Property<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, value: PropertyValue<'a>) -> Self {
        Self { name: name.into(), value }
    }

    fn decode(fields: &mut FieldReader<'a>, record_type: RecordType) -> Result<Self> {
        let name = fields.get_str()?;
        let size = fields.get_u32()? as usize;
        let raw = fields.get_bytes(size)?;

        let value = match record_type {
            RecordType::IntProperty => PropertyValue::Int(fixed_value(raw, &name).map(u64::from_le_bytes)?),
            RecordType::RealProperty => PropertyValue::Real(fixed_value(raw, &name).map(f64::from_le_bytes)?),
            RecordType::StringProperty => {
                PropertyValue::String(String::from_utf8_lossy(strip_nul(raw)))
            }
            _ => PropertyValue::General(Cow::Borrowed(raw)),
        };
        Ok(Self { name, value })
    }

    fn encode(&self, fields: &mut FieldWriter<'_>) -> Result<()> {
        fields.put_str(&self.name)?;
        match &self.value {
            PropertyValue::Int(v) => {
                fields.put_u32(8)?;
                fields.put_bytes(&v.to_le_bytes())
            }
            PropertyValue::Real(v) => {
                fields.put_u32(8)?;
                fields.put_bytes(&v.to_le_bytes())
            }
            PropertyValue::String(s) => {
                fields.put_u32(s.len() as u32 + 1)?;
                fields.put_bytes(s.as_bytes())?;
                fields.put_bytes(&[0])
            }
            PropertyValue::General(b) => {
                fields.put_u32(b.len() as u32)?;
                fields.put_bytes(b)
            }
        }
    }

    pub fn into_owned(self) -> Property<'static> {
        Property {
            name: Cow::Owned(self.name.into_owned()),
            value: self.value.into_owned(),
        }
    }
}

fn fixed_value(raw: &[u8], name: &str) -> Result<[u8; 8]> {
    raw.try_into().map_err(|_| {
        OniError::CorruptFile(format!(
            "property '{}' has {} bytes, expected 8",
            name,
            raw.len()
        ))
    })
}

/// Frame count and max timestamp carried by NodeDataBegin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekInfo {
    pub frames: u32,
    pub max_timestamp: u64,
}

/// Type-specific part of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody<'a> {
    NodeAdded(NodeAdded<'a>),
    NodeRemoved,
    Property(Property<'a>),
    NodeDataBegin(SeekInfo),
    NodeStateReady,
    /// Header only; `payload_size` frame bytes follow in the stream
    NewData { timestamp: u64, frame: u32 },
    /// Header only; payload is the node's seek index
    SeekTable,
    End,
}

impl<'a> RecordBody<'a> {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordBody::NodeAdded(added) => added.shape.record_type(),
            RecordBody::NodeRemoved => RecordType::NodeRemoved,
            RecordBody::Property(prop) => prop.value.record_type(),
            RecordBody::NodeDataBegin(_) => RecordType::NodeDataBegin,
            RecordBody::NodeStateReady => RecordType::NodeStateReady,
            RecordBody::NewData { .. } => RecordType::NewData,
            RecordBody::SeekTable => RecordType::SeekTable,
            RecordBody::End => RecordType::End,
        }
    }
}

// =============================================================================
// Record
// =============================================================================

/// A decoded (or to-be-encoded) record, payload excluded
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    pub node_id: u32,
    pub payload_size: u32,
    pub undo_pos: u64,
    pub body: RecordBody<'a>,
}

impl<'a> Record<'a> {
    pub fn new(node_id: u32, body: RecordBody<'a>) -> Self {
        Self { node_id, payload_size: 0, undo_pos: 0, body }
    }

    pub fn with_undo(mut self, undo_pos: u64) -> Self {
        self.undo_pos = undo_pos;
        self
    }

    pub fn with_payload_size(mut self, payload_size: u32) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn record_type(&self) -> RecordType {
        self.body.record_type()
    }

    /// Encode header + fields into `out`, returning the bytes used.
    ///
    /// Nothing past `out.len()` is touched; overflow is `BufferTooSmall`.
    pub fn encode(&self, width: HeaderWidth, out: &mut [u8]) -> Result<usize> {
        let mut fields = FieldWriter::new(out);
        fields.skip(width.header_size())?;
        match &self.body {
            RecordBody::NodeAdded(added) => added.encode(&mut fields, width)?,
            RecordBody::Property(prop) => prop.encode(&mut fields)?,
            RecordBody::NodeDataBegin(info) => {
                fields.put_u32(info.frames)?;
                fields.put_u64(info.max_timestamp)?;
            }
            RecordBody::NewData { timestamp, frame } => {
                fields.put_u64(*timestamp)?;
                fields.put_u32(*frame)?;
            }
            RecordBody::NodeRemoved
            | RecordBody::NodeStateReady
            | RecordBody::SeekTable
            | RecordBody::End => {}
        }

        let fields_size = fields.written();
        let header = RecordHeader {
            record_type: self.record_type(),
            node_id: self.node_id,
            fields_size: fields_size as u32,
            payload_size: self.payload_size,
            undo_pos: self.undo_pos,
        };
        header.encode(out, width)?;

        tracing::trace!("encoded {}", self);
        Ok(fields_size)
    }

    /// Decode a record from its header + fields bytes.
    pub fn decode(bytes: &'a [u8], width: HeaderWidth) -> Result<Self> {
        let header = RecordHeader::decode(bytes, width)?;
        Self::decode_fields(&header, bytes, width)
    }

    /// Decode the fields of a record whose header is already parsed.
    pub fn decode_fields(header: &RecordHeader, bytes: &'a [u8], width: HeaderWidth) -> Result<Self> {
        let fields_size = header.fields_size as usize;
        if bytes.len() < fields_size {
            return Err(OniError::CorruptFile(format!(
                "record claims {} bytes of fields, only {} available",
                fields_size,
                bytes.len()
            )));
        }

        let mut fields = FieldReader::new(&bytes[width.header_size()..fields_size]);
        let body = match header.record_type {
            RecordType::NodeAddedV1 => {
                RecordBody::NodeAdded(NodeAdded::decode(&mut fields, NodeAddedShape::V1, width)?)
            }
            RecordType::NodeAddedV2 => {
                RecordBody::NodeAdded(NodeAdded::decode(&mut fields, NodeAddedShape::V2, width)?)
            }
            RecordType::NodeAddedV3 => {
                RecordBody::NodeAdded(NodeAdded::decode(&mut fields, NodeAddedShape::V3, width)?)
            }
            RecordType::IntProperty
            | RecordType::RealProperty
            | RecordType::StringProperty
            | RecordType::GeneralProperty => {
                RecordBody::Property(Property::decode(&mut fields, header.record_type)?)
            }
            RecordType::NodeDataBegin => RecordBody::NodeDataBegin(SeekInfo {
                frames: fields.get_u32()?,
                max_timestamp: fields.get_u64()?,
            }),
            RecordType::NewData => RecordBody::NewData {
                timestamp: fields.get_u64()?,
                frame: fields.get_u32()?,
            },
            RecordType::NodeRemoved => RecordBody::NodeRemoved,
            RecordType::NodeStateReady => RecordBody::NodeStateReady,
            RecordType::SeekTable => RecordBody::SeekTable,
            RecordType::End => RecordBody::End,
        };

        let record = Self {
            node_id: header.node_id,
            payload_size: header.payload_size,
            undo_pos: header.undo_pos,
            body,
        };
        tracing::trace!("decoded {}", record);
        Ok(record)
    }

    /// Detach from the decode buffer.
    pub fn into_owned(self) -> Record<'static> {
        let body = match self.body {
            RecordBody::NodeAdded(added) => RecordBody::NodeAdded(added.into_owned()),
            RecordBody::Property(prop) => RecordBody::Property(prop.into_owned()),
            RecordBody::NodeRemoved => RecordBody::NodeRemoved,
            RecordBody::NodeDataBegin(info) => RecordBody::NodeDataBegin(info),
            RecordBody::NodeStateReady => RecordBody::NodeStateReady,
            RecordBody::NewData { timestamp, frame } => RecordBody::NewData { timestamp, frame },
            RecordBody::SeekTable => RecordBody::SeekTable,
            RecordBody::End => RecordBody::End,
        };
        Record {
            node_id: self.node_id,
            payload_size: self.payload_size,
            undo_pos: self.undo_pos,
            body,
        }
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} node={} payload={} undo={}",
            self.record_type(),
            self.node_id,
            self.payload_size,
            self.undo_pos
        )?;
        match &self.body {
            RecordBody::NodeAdded(added) => write!(
                f,
                " name='{}' type={} codec={} frames={} ts=[{}, {}] seek_table={}",
                added.name,
                added.node_type,
                added.codec,
                added.frames,
                added.min_timestamp,
                added.max_timestamp,
                added.seek_table_pos
            ),
            RecordBody::Property(prop) => match &prop.value {
                PropertyValue::Int(v) => write!(f, " name='{}' value={}", prop.name, v),
                PropertyValue::Real(v) => write!(f, " name='{}' value={}", prop.name, v),
                PropertyValue::String(v) => write!(f, " name='{}' value='{}'", prop.name, v),
                PropertyValue::General(v) => {
                    write!(f, " name='{}' size={}", prop.name, v.len())
                }
            },
            RecordBody::NodeDataBegin(info) => write!(
                f,
                " frames={} max_ts={}",
                info.frames, info.max_timestamp
            ),
            RecordBody::NewData { timestamp, frame } => {
                write!(f, " ts={} frame={}", timestamp, frame)
            }
            _ => Ok(()),
        }
    }
}
