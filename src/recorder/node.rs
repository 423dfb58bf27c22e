//! Per-node recording state

use std::collections::HashMap;

use crate::codec::{CodecId, PayloadCodec};
use crate::format::{NodeAdded, SeekIndexEntry};
use crate::node::NodeType;

/// Everything the writer tracks for one live node
pub(crate) struct RecordedNodeInfo {
    pub node_id: u32,
    pub node_type: NodeType,
    pub codec_id: CodecId,
    /// `None` for passthrough ids and non-generators
    pub codec: Option<Box<dyn PayloadCodec>>,
    /// Offset of the NodeAdded record, rewritten when the node is finalized
    pub node_added_pos: u64,
    /// NodeStateReady has been written
    pub ready: bool,
    pub max_frame: u32,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub got_data: bool,
    /// Property name → offset of its latest record
    pub prop_positions: HashMap<String, u64>,
    /// Offset of the latest NewData record (head of the data undo chain)
    pub last_data_pos: u64,
    /// Seek index for frames 1..=max_frame
    pub index: Vec<SeekIndexEntry>,
}

impl RecordedNodeInfo {
    pub fn new(
        node_id: u32,
        node_type: NodeType,
        codec_id: CodecId,
        codec: Option<Box<dyn PayloadCodec>>,
        node_added_pos: u64,
    ) -> Self {
        Self {
            node_id,
            node_type,
            codec_id,
            codec,
            node_added_pos,
            ready: false,
            max_frame: 0,
            min_timestamp: 0,
            max_timestamp: 0,
            got_data: false,
            prop_positions: HashMap::new(),
            last_data_pos: 0,
            index: Vec::new(),
        }
    }

    /// Offset of the latest record for `prop`, or 0 if it was never set
    pub fn prop_position(&self, prop: &str) -> u64 {
        self.prop_positions.get(prop).copied().unwrap_or(0)
    }

    pub fn set_prop_position(&mut self, prop: &str, pos: u64) {
        self.prop_positions.insert(prop.to_string(), pos);
    }

    /// Trailer to write when the node goes away; nodes without data get none.
    pub fn trailer(&self, name: &str) -> Option<PendingTrailer> {
        if !self.got_data {
            return None;
        }

        let mut record = NodeAdded::new(name.to_string(), self.node_type, self.codec_id);
        record.frames = self.max_frame;
        record.min_timestamp = self.min_timestamp;
        record.max_timestamp = self.max_timestamp;

        Some(PendingTrailer {
            node_id: self.node_id,
            node_added_pos: self.node_added_pos,
            record,
            index: self.index.clone(),
        })
    }
}

/// Seek table plus the final NodeAdded record, waiting to be written
pub(crate) struct PendingTrailer {
    pub node_id: u32,
    pub node_added_pos: u64,
    /// Final NodeAdded; `seek_table_pos` is filled in when the table lands
    pub record: NodeAdded<'static>,
    pub index: Vec<SeekIndexEntry>,
}
