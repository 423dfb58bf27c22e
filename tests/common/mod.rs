//! Shared helpers for onirec integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;

use onirec::codec::PayloadCodec;
use onirec::format::{
    encode_index, FileHeader, HeaderWidth, NodeAdded, NodeAddedShape, Property, PropertyValue,
    Record, RecordBody, SeekIndexEntry, SeekInfo, Version, FILE_HEADER_SIZE, INVALID_NODE_ID,
};
use onirec::{
    CodecId, CodecRegistry, Config, EventLog, NodeType, OniError, OniReader, OniWriter,
    PlaybackEvent, Result,
};

pub const DEPTH: &str = "Depth1";
pub const IMAGE: &str = "Image1";

pub type MemWriter = OniWriter<Cursor<Vec<u8>>>;
pub type MemReader = OniReader<Cursor<Vec<u8>>, EventLog>;

// =============================================================================
// Writer / Reader Setup
// =============================================================================

pub fn open_writer() -> MemWriter {
    open_writer_with(CodecRegistry::new())
}

pub fn open_writer_with(codecs: CodecRegistry) -> MemWriter {
    OniWriter::open(Cursor::new(Vec::new()), Config::default(), codecs).unwrap()
}

pub fn finish(writer: MemWriter) -> Vec<u8> {
    writer.close().unwrap().into_inner()
}

pub fn open_reader(bytes: &[u8]) -> MemReader {
    try_open_reader(bytes, Config::default()).unwrap()
}

pub fn try_open_reader(bytes: &[u8], config: Config) -> Result<MemReader> {
    OniReader::open(Cursor::new(bytes.to_vec()), EventLog::new(), config, CodecRegistry::new())
}

/// Distinct, recognizable payload for frame `n` of a node
pub fn frame_bytes(node: &str, n: u32) -> Vec<u8> {
    let mut data = node.as_bytes().to_vec();
    data.extend_from_slice(&n.to_le_bytes());
    data.extend(std::iter::repeat(n as u8).take(24));
    data
}

/// Timestamp the recordings below give frame `n` (1-based)
pub fn frame_timestamp(n: u32) -> u64 {
    u64::from(n - 1) * 1000
}

pub fn add_depth(writer: &mut MemWriter, name: &str) {
    writer.on_node_added(name, NodeType::Depth, CodecId::UNCOMPRESSED).unwrap();
}

pub fn write_frame(writer: &mut MemWriter, node: &str, n: u32) {
    writer
        .on_node_new_data(node, frame_timestamp(n), n, &frame_bytes(node, n))
        .unwrap();
}

/// One depth node, an initial property, `frames` frames
pub fn single_depth_recording(frames: u32) -> Vec<u8> {
    let mut writer = open_writer();
    add_depth(&mut writer, DEPTH);
    writer.on_node_int_prop_changed(DEPTH, "xnMirror", 0).unwrap();
    writer.on_node_state_ready(DEPTH).unwrap();
    for n in 1..=frames {
        write_frame(&mut writer, DEPTH, n);
    }
    finish(writer)
}

/// Depth node whose "gain" is 1 for frames 1..=5 and 2 for frames 6..=10
pub fn gain_change_recording() -> Vec<u8> {
    let mut writer = open_writer();
    add_depth(&mut writer, DEPTH);
    writer.on_node_int_prop_changed(DEPTH, "gain", 1).unwrap();
    writer.on_node_state_ready(DEPTH).unwrap();
    for n in 1..=5 {
        write_frame(&mut writer, DEPTH, n);
    }
    writer.on_node_int_prop_changed(DEPTH, "gain", 2).unwrap();
    for n in 6..=10 {
        write_frame(&mut writer, DEPTH, n);
    }
    finish(writer)
}

/// Depth and image nodes with interleaved frames 1..=frames.
///
/// With `change_after` set, depth's "xnMirror" flips from 0 to 1 after that
/// frame of both nodes.
pub fn two_node_recording(frames: u32, change_after: Option<u32>) -> Vec<u8> {
    let mut writer = open_writer();
    add_depth(&mut writer, DEPTH);
    writer.on_node_int_prop_changed(DEPTH, "xnMirror", 0).unwrap();
    writer.on_node_state_ready(DEPTH).unwrap();
    writer.on_node_added(IMAGE, NodeType::Image, CodecId::UNCOMPRESSED).unwrap();
    writer.on_node_string_prop_changed(IMAGE, "xnPixelFormat", "RGB24").unwrap();
    writer.on_node_state_ready(IMAGE).unwrap();

    for n in 1..=frames {
        write_frame(&mut writer, DEPTH, n);
        write_frame(&mut writer, IMAGE, n);
        if change_after == Some(n) {
            writer.on_node_int_prop_changed(DEPTH, "xnMirror", 1).unwrap();
        }
    }
    finish(writer)
}

/// Call `read_next` until the reader hits end of file
pub fn play_to_end(reader: &mut MemReader) {
    while !reader.is_eof() {
        reader.read_next().unwrap();
    }
}

/// Call `read_next` until `node` has delivered frame `frame`
pub fn play_until_frame(reader: &mut MemReader, node: &str, frame: u32) {
    while reader.tell_frame(node).unwrap() < frame {
        reader.read_next().unwrap();
    }
}

// =============================================================================
// Observed State
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Int(u64),
    Real(f64),
    Str(String),
    Blob(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: u64,
    pub frame: u32,
    pub data: Vec<u8>,
}

/// What a viewer would show after applying a sequence of notifications
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkState {
    pub nodes: Vec<String>,
    pub props: BTreeMap<(String, String), PropValue>,
    /// Latest frame per node; an empty frame 0 clears the entry
    pub frames: BTreeMap<String, Frame>,
}

impl SinkState {
    pub fn apply(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::NodeAdded { node, .. } => self.nodes.push(node.clone()),
            PlaybackEvent::NodeRemoved { node } => {
                self.nodes.retain(|n| n != node);
                self.frames.remove(node);
                self.props.retain(|(n, _), _| n != node);
            }
            PlaybackEvent::IntProp { node, prop, value } => {
                self.props.insert((node.clone(), prop.clone()), PropValue::Int(*value));
            }
            PlaybackEvent::RealProp { node, prop, value } => {
                self.props.insert((node.clone(), prop.clone()), PropValue::Real(*value));
            }
            PlaybackEvent::StringProp { node, prop, value } => {
                self.props.insert((node.clone(), prop.clone()), PropValue::Str(value.clone()));
            }
            PlaybackEvent::GeneralProp { node, prop, value } => {
                self.props.insert((node.clone(), prop.clone()), PropValue::Blob(value.clone()));
            }
            PlaybackEvent::NewData { node, frame: 0, data, .. } if data.is_empty() => {
                self.frames.remove(node);
            }
            PlaybackEvent::NewData { node, timestamp, frame, data } => {
                self.frames.insert(
                    node.clone(),
                    Frame {
                        timestamp: *timestamp,
                        frame: *frame,
                        data: data.clone(),
                    },
                );
            }
            PlaybackEvent::StateReady { .. } | PlaybackEvent::EndOfFile => {}
        }
    }

    pub fn apply_all(&mut self, events: &[PlaybackEvent]) {
        for event in events {
            self.apply(event);
        }
    }

    pub fn prop(&self, node: &str, prop: &str) -> Option<&PropValue> {
        self.props.get(&(node.to_string(), prop.to_string()))
    }

    pub fn frame_of(&self, node: &str) -> Option<u32> {
        self.frames.get(node).map(|f| f.frame)
    }
}

/// State a fresh sequential playback shows right after `node` first emits `frame`
pub fn sequential_state_at(bytes: &[u8], node: &str, frame: u32) -> SinkState {
    let mut reader = open_reader(bytes);
    let mut state = SinkState::default();
    loop {
        let events = reader.notifications_mut().take();
        for event in &events {
            state.apply(event);
            if let PlaybackEvent::NewData { node: n, frame: f, .. } = event {
                if n == node && *f == frame {
                    return state;
                }
            }
        }
        reader.read_next().unwrap();
    }
}

/// Every notification of a full sequential playback
pub fn replay_events(bytes: &[u8]) -> Vec<PlaybackEvent> {
    let mut reader = open_reader(bytes);
    play_to_end(&mut reader);
    reader.notifications_mut().take()
}

// =============================================================================
// Test Codec
// =============================================================================

pub const RLE: CodecId = CodecId::from_fourcc(*b"RLE1");

/// Run-length codec: (count, byte) pairs
pub struct RleCodec;

impl PayloadCodec for RleCodec {
    fn id(&self) -> CodecId {
        RLE
    }

    fn encode(&mut self, raw: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let mut iter = raw.iter().peekable();
        while let Some(&byte) = iter.next() {
            let mut count = 1u8;
            while count < u8::MAX && iter.peek() == Some(&&byte) {
                iter.next();
                count += 1;
            }
            out.push(count);
            out.push(byte);
        }
        Ok(())
    }

    fn decode(&mut self, encoded: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if encoded.len() % 2 != 0 {
            return Err(OniError::Codec("odd RLE payload".to_string()));
        }
        for pair in encoded.chunks_exact(2) {
            out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
        }
        Ok(())
    }
}

pub fn rle_registry() -> CodecRegistry {
    let mut codecs = CodecRegistry::new();
    codecs.register(RLE, |_| Ok(Box::new(RleCodec)));
    codecs
}

// =============================================================================
// Legacy File Builder
// =============================================================================

/// Assembles a file record by record with 32-bit record headers
pub struct LegacyFile {
    bytes: Vec<u8>,
}

impl LegacyFile {
    pub fn new() -> Self {
        Self { bytes: vec![0; FILE_HEADER_SIZE] }
    }

    fn encode(record: &Record<'_>) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        let size = record.encode(HeaderWidth::Legacy32, &mut buf).unwrap();
        buf.truncate(size);
        buf
    }

    /// Append a record and its payload, returning the record offset.
    pub fn push(&mut self, record: &Record<'_>, payload: &[u8]) -> u64 {
        let pos = self.bytes.len() as u64;
        self.bytes.extend_from_slice(&Self::encode(record));
        self.bytes.extend_from_slice(payload);
        pos
    }

    /// Overwrite the record at `pos` with one of the same size.
    pub fn rewrite(&mut self, pos: u64, record: &Record<'_>) {
        let encoded = Self::encode(record);
        let start = pos as usize;
        self.bytes[start..start + encoded.len()].copy_from_slice(&encoded);
    }

    pub fn finish(mut self, version: Version, max_timestamp: u64, max_node_id: u32) -> Vec<u8> {
        let header = FileHeader {
            version,
            ..FileHeader::finalized(max_timestamp, max_node_id)
        };
        self.bytes[..FILE_HEADER_SIZE].copy_from_slice(&header.to_bytes().unwrap());
        self.bytes
    }
}

/// Depth recording in the oldest layout: NodeAdded v1, stats only in
/// NodeDataBegin, no seek table, "xnIsGenerating" stored as 0.
pub fn legacy_v1_recording(frames: u32) -> Vec<u8> {
    let mut file = LegacyFile::new();
    let mut added = NodeAdded::new(DEPTH, NodeType::Depth, CodecId::UNCOMPRESSED);
    added.shape = NodeAddedShape::V1;
    file.push(&Record::new(1, RecordBody::NodeAdded(added)), &[]);
    file.push(
        &Record::new(
            1,
            RecordBody::Property(Property::new("xnIsGenerating", PropertyValue::Int(0))),
        ),
        &[],
    );
    file.push(&Record::new(1, RecordBody::NodeStateReady), &[]);
    file.push(
        &Record::new(
            1,
            RecordBody::NodeDataBegin(SeekInfo {
                frames,
                max_timestamp: frame_timestamp(frames),
            }),
        ),
        &[],
    );

    let mut undo = 0;
    for n in 1..=frames {
        let data = frame_bytes(DEPTH, n);
        let record = Record::new(1, RecordBody::NewData { timestamp: frame_timestamp(n), frame: n })
            .with_undo(undo)
            .with_payload_size(data.len() as u32);
        undo = file.push(&record, &data);
    }
    file.push(&Record::new(INVALID_NODE_ID, RecordBody::End), &[]);
    file.finish(Version::new(1, 0, 0, 4), frame_timestamp(frames), 1)
}

/// Depth recording with NodeAdded v3 and a seek table, both in 32-bit widths.
pub fn legacy_indexed_recording(frames: u32) -> Vec<u8> {
    let mut file = LegacyFile::new();
    let mut added = NodeAdded::new(DEPTH, NodeType::Depth, CodecId::UNCOMPRESSED);
    added.frames = frames;
    added.max_timestamp = frame_timestamp(frames);
    let added_pos = file.push(&Record::new(1, RecordBody::NodeAdded(added.clone())), &[]);
    file.push(&Record::new(1, RecordBody::NodeStateReady), &[]);
    file.push(&Record::new(1, RecordBody::NodeDataBegin(SeekInfo::default())), &[]);

    let mut undo = 0;
    let mut index = Vec::new();
    for n in 1..=frames {
        let data = frame_bytes(DEPTH, n);
        let record = Record::new(1, RecordBody::NewData { timestamp: frame_timestamp(n), frame: n })
            .with_undo(undo)
            .with_payload_size(data.len() as u32);
        undo = file.push(&record, &data);
        index.push(SeekIndexEntry {
            timestamp: frame_timestamp(n),
            config_id: 2,
            seek_pos: undo,
        });
    }
    file.push(&Record::new(INVALID_NODE_ID, RecordBody::End), &[]);

    let table = encode_index(&index, HeaderWidth::Legacy32).unwrap();
    let table_pos = file.push(
        &Record::new(1, RecordBody::SeekTable).with_payload_size(table.len() as u32),
        &table,
    );
    added.seek_table_pos = table_pos;
    file.rewrite(added_pos, &Record::new(1, RecordBody::NodeAdded(added)));

    file.finish(Version::new(1, 0, 0, 5), frame_timestamp(frames), 1)
}
