//! ONI Writer
//!
//! Appends records to a seekable output stream and backpatches node trailers
//! and the file header. All output goes through one scratch buffer sized from
//! `Config::max_record_size`; a record that does not fit is rejected before
//! anything is written.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::codec::{CodecId, CodecRegistry};
use crate::config::Config;
use crate::error::{OniError, Result};
use crate::format::{
    encode_index, FileHeader, HeaderWidth, NodeAdded, Property, PropertyValue, Record,
    RecordBody, SeekIndexEntry, SeekInfo, FILE_HEADER_SIZE, INVALID_NODE_ID,
};
use crate::node::NodeType;
use crate::notify::NodeNotifications;

use super::node::{PendingTrailer, RecordedNodeInfo};

/// The writer always produces current-format files
const WIDTH: HeaderWidth = HeaderWidth::Current64;

// =============================================================================
// Record Sink
// =============================================================================

/// Output stream plus the position bookkeeping the backpatches rely on
struct RecordSink<W> {
    stream: W,
    /// Current write offset, tracked locally so buffered streams stay buffered
    pos: u64,
    buf: Vec<u8>,
}

impl<W: Write + Seek> RecordSink<W> {
    /// Encode and append a record, returning the offset it starts at.
    fn write_record(&mut self, record: &Record<'_>) -> Result<u64> {
        let size = record.encode(WIDTH, &mut self.buf).map_err(|e| match e {
            OniError::BufferTooSmall { needed, capacity } => OniError::RecordTooLarge {
                size: needed,
                max: capacity,
            },
            other => other,
        })?;

        let start = self.pos;
        self.stream.write_all(&self.buf[..size])?;
        self.pos += size as u64;
        Ok(start)
    }

    fn write_payload(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.stream.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Run `f` with the stream at `pos`, then return to the current offset.
    ///
    /// The return seek is attempted even when `f` fails.
    fn at_position<T>(&mut self, pos: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let resume = self.pos;
        self.seek_to(pos)?;
        let result = f(self);
        let restored = self.seek_to(resume);
        let value = result?;
        restored?;
        Ok(value)
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Records node events into an ONI container
pub struct OniWriter<W: Write + Seek> {
    sink: RecordSink<W>,
    config: Config,
    codecs: CodecRegistry,
    /// Encoded frame staging
    payload_buf: Vec<u8>,
    nodes: HashMap<String, RecordedNodeInfo>,
    /// Ids are handed out sequentially starting at 1
    num_nodes: u32,
    /// Bumped on every lifecycle or property event
    config_id: u32,
    /// First data timestamp seen; all stored timestamps are relative to it
    start_timestamp: Option<u64>,
    global_max_timestamp: u64,
}

impl OniWriter<BufWriter<File>> {
    /// Create (or truncate) a recording file
    pub fn create(path: &Path, config: Config, codecs: CodecRegistry) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        tracing::debug!("Recording to {}", path.display());
        Self::open(BufWriter::new(file), config, codecs)
    }
}

impl<W: Write + Seek> OniWriter<W> {
    /// Start a recording at the beginning of `stream`.
    ///
    /// The header carries sentinel trailer values until `close()` rewrites it,
    /// so an aborted recording is recognizable as unfinalized.
    pub fn open(mut stream: W, config: Config, codecs: CodecRegistry) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        FileHeader::unfinalized().write_to(&mut stream)?;

        Ok(Self {
            sink: RecordSink {
                stream,
                pos: FILE_HEADER_SIZE as u64,
                buf: vec![0; config.max_record_size],
            },
            payload_buf: Vec::new(),
            config,
            codecs,
            nodes: HashMap::new(),
            num_nodes: 0,
            config_id: 0,
            start_timestamp: None,
            global_max_timestamp: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Node Lifecycle
    // -------------------------------------------------------------------------

    /// Announce a node and return its id.
    pub fn on_node_added(&mut self, node: &str, node_type: NodeType, codec: CodecId) -> Result<u32> {
        if self.nodes.contains_key(node) {
            return Err(OniError::BadNodeReference(format!(
                "node '{}' is already being recorded",
                node
            )));
        }

        let codec_handle = if node_type.is_generator() {
            self.codecs.resolve(codec, node)?
        } else {
            None
        };

        let node_id = self.num_nodes + 1;
        let record = Record::new(
            node_id,
            RecordBody::NodeAdded(NodeAdded::new(node, node_type, codec)),
        );
        self.config_id += 1;
        let pos = self.sink.write_record(&record)?;
        self.num_nodes = node_id;

        self.nodes.insert(
            node.to_string(),
            RecordedNodeInfo::new(node_id, node_type, codec, codec_handle, pos),
        );

        tracing::debug!("Node '{}' added: id={} type={} codec={}", node, node_id, node_type, codec);
        Ok(node_id)
    }

    /// Append NodeRemoved, then write the node's seek table and final NodeAdded.
    ///
    /// The node stays live until both are written.
    pub fn on_node_removed(&mut self, node: &str) -> Result<()> {
        let info = self.nodes.get(node).ok_or_else(|| unknown_node(node))?;
        let record = Record::new(info.node_id, RecordBody::NodeRemoved).with_undo(info.node_added_pos);
        let trailer = info.trailer(node);

        self.config_id += 1;
        self.sink.write_record(&record)?;
        if let Some(trailer) = trailer {
            self.finalize_node(trailer)?;
        }
        self.nodes.remove(node);

        tracing::debug!("Node '{}' removed", node);
        Ok(())
    }

    /// Mark the node's configuration as complete.
    pub fn on_node_state_ready(&mut self, node: &str) -> Result<()> {
        let info = self.nodes.get_mut(node).ok_or_else(|| unknown_node(node))?;

        self.config_id += 1;
        self.sink.write_record(&Record::new(info.node_id, RecordBody::NodeStateReady))?;
        info.ready = true;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    pub fn on_node_int_prop_changed(&mut self, node: &str, prop: &str, value: u64) -> Result<()> {
        self.write_property(node, Property::new(prop, PropertyValue::Int(value)))
    }

    pub fn on_node_real_prop_changed(&mut self, node: &str, prop: &str, value: f64) -> Result<()> {
        self.write_property(node, Property::new(prop, PropertyValue::Real(value)))
    }

    pub fn on_node_string_prop_changed(&mut self, node: &str, prop: &str, value: &str) -> Result<()> {
        self.write_property(
            node,
            Property::new(prop, PropertyValue::String(Cow::Borrowed(value))),
        )
    }

    pub fn on_node_general_prop_changed(&mut self, node: &str, prop: &str, value: &[u8]) -> Result<()> {
        self.write_property(
            node,
            Property::new(prop, PropertyValue::General(Cow::Borrowed(value))),
        )
    }

    /// Append a property record chained to the previous value of the same property.
    fn write_property(&mut self, node: &str, prop: Property<'_>) -> Result<()> {
        let info = self.nodes.get_mut(node).ok_or_else(|| unknown_node(node))?;
        let undo_pos = info.prop_position(&prop.name);
        let name = prop.name.clone();

        self.config_id += 1;
        let record = Record::new(info.node_id, RecordBody::Property(prop)).with_undo(undo_pos);
        let pos = self.sink.write_record(&record)?;
        info.set_prop_position(&name, pos);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// Append one frame.
    ///
    /// Timestamps are stored relative to the first frame of the whole
    /// recording; frames older than that are dropped. Frame numbers are
    /// assigned sequentially per node starting at 1, whatever `frame` says.
    pub fn on_node_new_data(&mut self, node: &str, timestamp: u64, frame: u32, data: &[u8]) -> Result<()> {
        let info = self.nodes.get_mut(node).ok_or_else(|| unknown_node(node))?;
        if !info.node_type.is_generator() {
            return Err(OniError::InvalidOperation(format!(
                "node '{}' of type {} does not produce data",
                node, info.node_type
            )));
        }

        let start = *self.start_timestamp.get_or_insert(timestamp);
        if timestamp < start {
            tracing::warn!(
                "Dropping frame of '{}' at {}: earlier than recording start {}",
                node,
                timestamp,
                start
            );
            return Ok(());
        }
        let timestamp = timestamp - start;

        let payload: &[u8] = match info.codec.as_mut() {
            Some(codec) => {
                self.payload_buf.clear();
                codec.encode(data, &mut self.payload_buf)?;
                &self.payload_buf
            }
            None => data,
        };
        if payload.len() > self.config.max_payload_size || payload.len() > u32::MAX as usize {
            return Err(OniError::RecordTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        // A reader configures each node until its NodeStateReady, so one
        // must precede the node's first data.
        if !info.ready {
            tracing::debug!("Node '{}' got data before ready, marking it ready", node);
            self.config_id += 1;
            self.sink.write_record(&Record::new(info.node_id, RecordBody::NodeStateReady))?;
            info.ready = true;
        }

        if !info.got_data {
            let begin = Record::new(info.node_id, RecordBody::NodeDataBegin(SeekInfo::default()));
            self.sink.write_record(&begin)?;
            info.got_data = true;
            info.min_timestamp = timestamp;
        }

        let frame_number = info.max_frame + 1;
        if frame != frame_number {
            tracing::trace!("Node '{}': frame {} stored as {}", node, frame, frame_number);
        }

        let header = Record::new(
            info.node_id,
            RecordBody::NewData { timestamp, frame: frame_number },
        )
        .with_undo(info.last_data_pos)
        .with_payload_size(payload.len() as u32);

        let pos = self.sink.write_record(&header)?;
        self.sink.write_payload(payload)?;

        info.max_frame = frame_number;
        info.max_timestamp = timestamp;
        info.last_data_pos = pos;
        info.index.push(SeekIndexEntry {
            timestamp,
            config_id: self.config_id,
            seek_pos: pos,
        });

        self.global_max_timestamp = self.global_max_timestamp.max(timestamp);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Finalization
    // -------------------------------------------------------------------------

    /// Write the seek table at the current offset, then rewrite the node's
    /// NodeAdded record in place with final stats and the table offset.
    fn finalize_node(&mut self, trailer: PendingTrailer) -> Result<()> {
        let table = encode_index(&trailer.index, WIDTH)?;
        let table_header = Record::new(trailer.node_id, RecordBody::SeekTable)
            .with_payload_size(u32::try_from(table.len()).map_err(|_| {
                OniError::RecordTooLarge { size: table.len(), max: u32::MAX as usize }
            })?);

        let table_pos = self.sink.write_record(&table_header)?;
        self.sink.write_payload(&table)?;

        let mut added = trailer.record;
        added.seek_table_pos = table_pos;
        let frames = added.frames;
        let record = Record::new(trailer.node_id, RecordBody::NodeAdded(added));

        self.sink
            .at_position(trailer.node_added_pos, |sink| sink.write_record(&record).map(|_| ()))?;

        tracing::debug!(
            "Node {} finalized: {} frames, seek table at {}",
            trailer.node_id,
            frames,
            table_pos
        );
        Ok(())
    }

    /// Append End, finalize every live node, rewrite the header.
    ///
    /// Nodes never marked ready get their NodeStateReady before End.
    /// Returns the underlying stream, flushed.
    pub fn close(mut self) -> Result<W> {
        let mut live: Vec<(String, RecordedNodeInfo)> = self.nodes.drain().collect();
        live.sort_by_key(|(_, info)| info.node_id);

        for (_, info) in live.iter_mut().filter(|(_, info)| !info.ready) {
            self.sink.write_record(&Record::new(info.node_id, RecordBody::NodeStateReady))?;
            info.ready = true;
        }
        self.sink.write_record(&Record::new(INVALID_NODE_ID, RecordBody::End))?;

        for (name, info) in live {
            if let Some(trailer) = info.trailer(&name) {
                self.finalize_node(trailer)?;
            }
        }

        self.sink.seek_to(0)?;
        FileHeader::finalized(self.global_max_timestamp, self.num_nodes).write_to(&mut self.sink.stream)?;
        self.sink.stream.flush()?;

        tracing::debug!(
            "Recording closed: {} nodes, max timestamp {}",
            self.num_nodes,
            self.global_max_timestamp
        );
        Ok(self.sink.stream)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Id assigned to a live node
    pub fn node_id(&self, node: &str) -> Option<u32> {
        self.nodes.get(node).map(|info| info.node_id)
    }

    /// Current configuration id
    pub fn config_id(&self) -> u32 {
        self.config_id
    }

    /// Current write offset
    pub fn position(&self) -> u64 {
        self.sink.pos
    }
}

fn unknown_node(node: &str) -> OniError {
    OniError::BadNodeReference(format!("node '{}' is not being recorded", node))
}

// =============================================================================
// Notification Sink
// =============================================================================

/// Lets a reader replay straight into a writer
impl<W: Write + Seek> NodeNotifications for OniWriter<W> {
    fn on_node_added(&mut self, node: &str, node_type: NodeType, codec: CodecId) -> Result<()> {
        OniWriter::on_node_added(self, node, node_type, codec).map(|_| ())
    }

    fn on_node_removed(&mut self, node: &str) -> Result<()> {
        OniWriter::on_node_removed(self, node)
    }

    fn on_node_int_prop_changed(&mut self, node: &str, prop: &str, value: u64) -> Result<()> {
        OniWriter::on_node_int_prop_changed(self, node, prop, value)
    }

    fn on_node_real_prop_changed(&mut self, node: &str, prop: &str, value: f64) -> Result<()> {
        OniWriter::on_node_real_prop_changed(self, node, prop, value)
    }

    fn on_node_string_prop_changed(&mut self, node: &str, prop: &str, value: &str) -> Result<()> {
        OniWriter::on_node_string_prop_changed(self, node, prop, value)
    }

    fn on_node_general_prop_changed(&mut self, node: &str, prop: &str, value: &[u8]) -> Result<()> {
        OniWriter::on_node_general_prop_changed(self, node, prop, value)
    }

    fn on_node_state_ready(&mut self, node: &str) -> Result<()> {
        OniWriter::on_node_state_ready(self, node)
    }

    fn on_node_new_data(&mut self, node: &str, timestamp: u64, frame: u32, data: &[u8]) -> Result<()> {
        OniWriter::on_node_new_data(self, node, timestamp, frame, data)
    }
}
