//! ONI Reader
//!
//! Sequential replay: each call to `read_next()` decodes one record and
//! dispatches it to a `NodeNotifications` sink. Opening a file replays every
//! record up to the first NodeDataBegin, so the sink sees all nodes fully
//! configured before any frame arrives.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::codec::CodecRegistry;
use crate::config::Config;
use crate::error::{OniError, Result};
use crate::format::{
    decode_index, entry_size, FileHeader, HeaderWidth, NodeAdded, NodeAddedShape, Property,
    PropertyValue, Record, RecordBody, RecordType, SeekIndexEntry, SeekInfo, Version,
    FILE_HEADER_SIZE, INVALID_NODE_ID, NEW_DATA_MAX_FIELDS,
};
use crate::notify::NodeNotifications;

use super::node::{NodeState, NodeSummary, PlayerNodeInfo, RecordUndoInfo};
use super::stream::PlaybackStream;

/// Property older recorders stored as 0 even for nodes that produced frames
const IS_GENERATING_PROP: &str = "xnIsGenerating";

// =============================================================================
// Reader
// =============================================================================

/// Plays back an ONI container into a notification sink
pub struct OniReader<R: Read + Seek, N: NodeNotifications> {
    pub(super) stream: PlaybackStream<R>,
    pub(super) notifications: N,
    pub(super) config: Config,
    codecs: CodecRegistry,
    header: FileHeader,
    pub(super) width: HeaderWidth,
    /// Live nodes keyed by id
    pub(super) nodes: BTreeMap<u32, PlayerNodeInfo>,
    /// Header + fields staging for one record
    pub(super) record_buf: Vec<u8>,
    payload_buf: Vec<u8>,
    data_buf: Vec<u8>,
    data_begun: bool,
    /// Timestamp of the last frame handled
    timestamp: u64,
    eof: bool,
}

impl<N: NodeNotifications> OniReader<BufReader<File>, N> {
    /// Open a recording file
    pub fn open_path(path: &Path, notifications: N, config: Config, codecs: CodecRegistry) -> Result<Self> {
        let file = File::open(path)?;
        tracing::debug!("Playing {}", path.display());
        Self::open(BufReader::new(file), notifications, config, codecs)
    }
}

impl<R: Read + Seek, N: NodeNotifications> OniReader<R, N> {
    /// Validate the header and replay configuration up to the first data.
    pub fn open(mut stream: R, notifications: N, config: Config, codecs: CodecRegistry) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut stream)?;
        if !header.is_finalized() {
            return Err(OniError::CorruptFile(
                "recording was not finalized".to_string(),
            ));
        }

        let width = HeaderWidth::for_version(header.version);
        tracing::debug!(
            "Opened recording: version={} max_ts={} max_node={} width={:?}",
            header.version,
            header.global_max_timestamp,
            header.max_node_id,
            width
        );

        let mut reader = Self {
            stream: PlaybackStream::new(stream, FILE_HEADER_SIZE as u64),
            notifications,
            record_buf: vec![0; config.max_record_size.max(NEW_DATA_MAX_FIELDS)],
            config,
            codecs,
            header,
            width,
            nodes: BTreeMap::new(),
            payload_buf: Vec::new(),
            data_buf: Vec::new(),
            data_begun: false,
            timestamp: 0,
            eof: false,
        };
        reader.process_until_first_data()?;
        Ok(reader)
    }

    // -------------------------------------------------------------------------
    // Playback
    // -------------------------------------------------------------------------

    /// Decode and dispatch the next record.
    pub fn read_next(&mut self) -> Result<()> {
        if self.eof {
            return Err(OniError::InvalidOperation(
                "end of file reached".to_string(),
            ));
        }
        self.process_record(true)
    }

    /// Go back to the first record and replay up to the first data.
    ///
    /// Live nodes keep their configuration and codec; only their playback
    /// position is reset.
    pub fn rewind(&mut self) -> Result<()> {
        self.stream.seek_to(FILE_HEADER_SIZE as u64)?;
        for info in self.nodes.values_mut() {
            info.rewind();
        }
        self.data_begun = false;
        self.timestamp = 0;
        self.eof = false;

        tracing::debug!("Rewound to first record");
        self.process_until_first_data()
    }

    fn process_until_first_data(&mut self) -> Result<()> {
        while !self.data_begun {
            self.process_record(true)?;
        }
        Ok(())
    }

    /// Read the record at the current offset and apply it.
    ///
    /// With `process_payload` false, frame payloads are skipped rather than
    /// decoded and no data notification is sent.
    pub(super) fn process_record(&mut self, process_payload: bool) -> Result<()> {
        let pos = self.stream.tell();
        let record = self.stream.read_record(&mut self.record_buf, self.width)?;
        self.handle_record(pos, record, process_payload)
    }

    pub(super) fn handle_record(&mut self, pos: u64, record: Record<'static>, process_payload: bool) -> Result<()> {
        let Record { node_id, payload_size, undo_pos, body } = record;

        match body {
            RecordBody::NodeAdded(added) => self.handle_node_added(node_id, added),
            RecordBody::NodeRemoved => self.handle_node_removed(node_id),
            RecordBody::Property(prop) => self.handle_property(pos, node_id, undo_pos, prop),
            RecordBody::NodeDataBegin(_) => self.handle_data_begin(node_id),
            RecordBody::NodeStateReady => self.handle_state_ready(node_id),
            RecordBody::NewData { timestamp, frame } => {
                let undo = RecordUndoInfo::new(pos, undo_pos);
                self.handle_new_data(node_id, undo, payload_size, timestamp, frame, process_payload)
            }
            RecordBody::SeekTable => self.stream.skip(u64::from(payload_size)),
            RecordBody::End => self.handle_end(),
        }
    }

    // -------------------------------------------------------------------------
    // Record Handlers
    // -------------------------------------------------------------------------

    fn handle_node_added(&mut self, node_id: u32, added: NodeAdded<'static>) -> Result<()> {
        if node_id == INVALID_NODE_ID || node_id > self.header.max_node_id {
            return Err(OniError::CorruptFile(format!(
                "node id {} exceeds max node id {}",
                node_id, self.header.max_node_id
            )));
        }

        // Replayed after a rewind: the node's configuration persists.
        if self.nodes.contains_key(&node_id) {
            tracing::trace!("Node {} already live, skipping re-announce", node_id);
            return Ok(());
        }

        let mut info = PlayerNodeInfo::new(added.name.to_string(), added.node_type, added.codec);
        info.frames = added.frames;
        info.min_timestamp = added.min_timestamp;
        info.max_timestamp = added.max_timestamp;
        self.nodes.insert(node_id, info);

        if added.shape == NodeAddedShape::V1 && added.node_type.is_generator() {
            self.recover_legacy_stats(node_id)?;
        }

        self.notifications
            .on_node_added(&added.name, added.node_type, added.codec)?;
        tracing::debug!(
            "Node '{}' added: id={} type={} codec={} frames={}",
            added.name,
            node_id,
            added.node_type,
            added.codec,
            added.frames
        );

        while self.nodes.get(&node_id).map_or(false, |info| !info.is_ready()) {
            let pos = self.stream.tell();
            let record = self.stream.read_record(&mut self.record_buf, self.width)?;
            if record.record_type() == RecordType::End {
                return Err(OniError::CorruptFile(format!(
                    "node '{}' reached end of recording before NodeStateReady",
                    added.name
                )));
            }
            self.handle_record(pos, record, true)?;
        }

        if added.shape == NodeAddedShape::V3
            && added.node_type.is_generator()
            && added.frames > 0
            && added.seek_table_pos != 0
        {
            let index = self.load_index(node_id, added.seek_table_pos, added.frames)?;
            if let Some(info) = self.nodes.get_mut(&node_id) {
                info.data_index = Some(index);
            }
        }
        Ok(())
    }

    fn handle_node_removed(&mut self, node_id: u32) -> Result<()> {
        let info = self
            .nodes
            .remove(&node_id)
            .ok_or_else(|| unknown_node(node_id, "NodeRemoved"))?;

        self.notifications.on_node_removed(&info.name)?;
        tracing::debug!("Node '{}' removed", info.name);
        Ok(())
    }

    fn handle_property(&mut self, pos: u64, node_id: u32, undo_pos: u64, prop: Property<'static>) -> Result<()> {
        let info = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| unknown_node(node_id, "property"))?;
        let node = info.name.as_str();

        match &prop.value {
            PropertyValue::Int(value) => {
                let value = if prop.name == IS_GENERATING_PROP && *value == 0 && info.frames > 0 {
                    1
                } else {
                    *value
                };
                self.notifications
                    .on_node_int_prop_changed(node, &prop.name, value)?
            }
            PropertyValue::Real(value) => self
                .notifications
                .on_node_real_prop_changed(node, &prop.name, *value)?,
            PropertyValue::String(value) => self
                .notifications
                .on_node_string_prop_changed(node, &prop.name, value)?,
            PropertyValue::General(value) => self
                .notifications
                .on_node_general_prop_changed(node, &prop.name, value)?,
        }

        info.prop_undo
            .insert(prop.name.into_owned(), RecordUndoInfo::new(pos, undo_pos));
        Ok(())
    }

    fn handle_data_begin(&mut self, node_id: u32) -> Result<()> {
        match self.nodes.get(&node_id) {
            Some(info) if info.is_generator() => {
                self.data_begun = true;
                Ok(())
            }
            Some(info) => Err(OniError::CorruptFile(format!(
                "NodeDataBegin for non-generator node '{}'",
                info.name
            ))),
            None => Err(unknown_node(node_id, "NodeDataBegin")),
        }
    }

    fn handle_state_ready(&mut self, node_id: u32) -> Result<()> {
        let info = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| unknown_node(node_id, "NodeStateReady"))?;
        if info.is_ready() {
            return Ok(());
        }

        self.notifications.on_node_state_ready(&info.name)?;
        if info.is_generator() && info.codec.is_none() {
            info.codec = self.codecs.resolve(info.codec_id, &info.name)?;
        }
        info.state = NodeState::Ready;
        Ok(())
    }

    fn handle_new_data(
        &mut self,
        node_id: u32,
        undo: RecordUndoInfo,
        payload_size: u32,
        timestamp: u64,
        frame: u32,
        process_payload: bool,
    ) -> Result<()> {
        let payload_size = payload_size as usize;
        if payload_size > self.config.max_payload_size {
            return Err(OniError::RecordTooLarge {
                size: payload_size,
                max: self.config.max_payload_size,
            });
        }

        let info = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| unknown_node(node_id, "NewData"))?;
        if frame > info.frames {
            return Err(OniError::CorruptFile(format!(
                "node '{}' frame {} exceeds announced count {}",
                info.name, frame, info.frames
            )));
        }
        if timestamp > self.header.global_max_timestamp {
            return Err(OniError::CorruptFile(format!(
                "node '{}' timestamp {} exceeds recording max {}",
                info.name, timestamp, self.header.global_max_timestamp
            )));
        }

        info.last_data_pos = undo.record_pos;
        info.new_data_undo = undo;
        info.cur_frame = frame;
        self.timestamp = timestamp;

        if !process_payload {
            return self.stream.skip(payload_size as u64);
        }

        self.payload_buf.resize(payload_size, 0);
        self.stream.read_exact(&mut self.payload_buf)?;

        let data: &[u8] = match info.codec.as_mut() {
            Some(codec) => {
                self.data_buf.clear();
                codec.decode(&self.payload_buf, &mut self.data_buf)?;
                if self.data_buf.len() > self.config.max_data_size {
                    return Err(OniError::RecordTooLarge {
                        size: self.data_buf.len(),
                        max: self.config.max_data_size,
                    });
                }
                &self.data_buf
            }
            None => &self.payload_buf,
        };

        self.notifications
            .on_node_new_data(&info.name, timestamp, frame, data)
    }

    fn handle_end(&mut self) -> Result<()> {
        if !self.data_begun {
            return Err(OniError::CorruptFile(
                "recording contains no data".to_string(),
            ));
        }

        self.notifications.on_end_of_file()?;
        if self.config.repeat {
            return self.rewind();
        }

        self.eof = true;
        self.stream.release();
        tracing::debug!("End of recording");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Seek Table and Legacy Stats
    // -------------------------------------------------------------------------

    /// Read a node's seek table, then return to the current offset.
    fn load_index(&mut self, node_id: u32, table_pos: u64, frames: u32) -> Result<Vec<SeekIndexEntry>> {
        let resume = self.stream.tell();
        self.stream.seek_to(table_pos)?;
        let result = self.read_seek_table(node_id, frames);
        self.stream.seek_to(resume)?;

        let index = result?;
        tracing::debug!("Node {}: loaded seek table of {} frames", node_id, frames);
        Ok(index)
    }

    fn read_seek_table(&mut self, node_id: u32, frames: u32) -> Result<Vec<SeekIndexEntry>> {
        let record = self.stream.read_record(&mut self.record_buf, self.width)?;
        if record.record_type() != RecordType::SeekTable || record.node_id != node_id {
            return Err(OniError::CorruptFile(format!(
                "expected seek table for node {}, found {}",
                node_id, record
            )));
        }

        let size = record.payload_size as usize;
        if size > self.config.max_seek_table_size {
            return Err(OniError::RecordTooLarge {
                size,
                max: self.config.max_seek_table_size,
            });
        }

        let expected = (frames as usize + 1) * entry_size(self.width);
        if size != expected {
            return Err(OniError::CorruptFile(format!(
                "seek table for {} frames has {} bytes, expected {}",
                frames, record.payload_size, expected
            )));
        }

        let mut table = vec![0u8; expected];
        self.stream.read_exact(&mut table)?;
        decode_index(&table, frames, self.width)
    }

    /// Fill in frame count and timestamps for a node stored in the oldest
    /// NodeAdded shape, which carried none.
    ///
    /// A scan that finds nothing leaves the stats at zero.
    fn recover_legacy_stats(&mut self, node_id: u32) -> Result<()> {
        let resume = self.stream.tell();
        let result = self.scan_legacy_stats(node_id);
        self.stream.seek_to(resume)?;

        match result {
            Ok((seek_info, min_timestamp)) => {
                if let Some(info) = self.nodes.get_mut(&node_id) {
                    info.frames = seek_info.frames;
                    info.max_timestamp = seek_info.max_timestamp;
                    info.min_timestamp = min_timestamp;
                }
                Ok(())
            }
            Err(OniError::NoMatch) => {
                tracing::warn!("Node {}: no legacy seek info found, stats left at zero", node_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn scan_legacy_stats(&mut self, node_id: u32) -> Result<(SeekInfo, u64)> {
        let seek_info = match self.seek_to_record_by_type(node_id, RecordType::NodeDataBegin)?.body {
            RecordBody::NodeDataBegin(info) => info,
            _ => return Err(OniError::NoMatch),
        };
        let min_timestamp = match self.seek_to_record_by_type(node_id, RecordType::NewData)?.body {
            RecordBody::NewData { timestamp, .. } => timestamp,
            _ => return Err(OniError::NoMatch),
        };
        Ok((seek_info, min_timestamp))
    }

    /// Scan forward for the next record of `record_type` belonging to `node_id`.
    ///
    /// Stops with `NoMatch` at End or after `max_scan_records` records.
    fn seek_to_record_by_type(&mut self, node_id: u32, record_type: RecordType) -> Result<Record<'static>> {
        for _ in 0..self.config.max_scan_records {
            let record = self.stream.read_record(&mut self.record_buf, self.width)?;
            if record.node_id == node_id && record.record_type() == record_type {
                return Ok(record);
            }
            if record.record_type() == RecordType::End {
                return Err(OniError::NoMatch);
            }
            self.stream.skip(u64::from(record.payload_size))?;
        }
        Err(OniError::NoMatch)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub(super) fn node_id_by_name(&self, node: &str) -> Result<u32> {
        self.nodes
            .iter()
            .find(|(_, info)| info.name == node)
            .map(|(id, _)| *id)
            .ok_or_else(|| OniError::BadNodeReference(format!("no live node named '{}'", node)))
    }

    fn node_by_name(&self, node: &str) -> Result<&PlayerNodeInfo> {
        let id = self.node_id_by_name(node)?;
        self.nodes
            .get(&id)
            .ok_or_else(|| OniError::BadNodeReference(node.to_string()))
    }

    /// Frame number last delivered for `node`
    pub fn tell_frame(&self, node: &str) -> Result<u32> {
        Ok(self.node_by_name(node)?.cur_frame)
    }

    /// Total frames recorded for `node`
    pub fn num_frames(&self, node: &str) -> Result<u32> {
        Ok(self.node_by_name(node)?.frames)
    }

    /// Timestamp of the last frame handled
    pub fn tell_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.config.repeat = repeat;
    }

    pub fn supported_format(&self) -> &'static str {
        "ONI"
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Snapshot of every live node, in id order
    pub fn nodes(&self) -> Vec<NodeSummary> {
        self.nodes
            .iter()
            .map(|(id, info)| info.summary(*id))
            .collect()
    }

    /// Current read offset
    pub fn position(&self) -> u64 {
        self.stream.tell()
    }

    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut N {
        &mut self.notifications
    }

    /// Split into the input stream (gone after end of file) and the sink.
    pub fn into_parts(mut self) -> (Option<R>, N) {
        (self.stream.release(), self.notifications)
    }
}

fn unknown_node(node_id: u32, record: &str) -> OniError {
    OniError::CorruptFile(format!("{} record for unknown node {}", record, node_id))
}
