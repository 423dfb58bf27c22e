//! Per-node playback state

use std::collections::BTreeMap;

use crate::codec::{CodecId, PayloadCodec};
use crate::format::SeekIndexEntry;
use crate::node::NodeType;

/// Head of one undo chain: where the latest record is and what it undoes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RecordUndoInfo {
    pub record_pos: u64,
    pub undo_pos: u64,
}

impl RecordUndoInfo {
    pub fn new(record_pos: u64, undo_pos: u64) -> Self {
        Self { record_pos, undo_pos }
    }
}

/// Configuration progress of a registered node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// NodeAdded seen, properties still arriving
    Added,
    /// NodeStateReady seen; codec bound
    Ready,
}

/// Everything the reader tracks for one live node
pub(crate) struct PlayerNodeInfo {
    pub name: String,
    pub node_type: NodeType,
    pub codec_id: CodecId,
    pub codec: Option<Box<dyn PayloadCodec>>,
    pub state: NodeState,
    /// Announced frame count (generators only)
    pub frames: u32,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub cur_frame: u32,
    /// Offset of the NewData record last applied, 0 if none
    pub last_data_pos: u64,
    pub new_data_undo: RecordUndoInfo,
    /// Property name → head of its undo chain
    pub prop_undo: BTreeMap<String, RecordUndoInfo>,
    /// Seek index including the zero entry, when the file has one
    pub data_index: Option<Vec<SeekIndexEntry>>,
}

impl PlayerNodeInfo {
    pub fn new(name: String, node_type: NodeType, codec_id: CodecId) -> Self {
        Self {
            name,
            node_type,
            codec_id,
            codec: None,
            state: NodeState::Added,
            frames: 0,
            min_timestamp: 0,
            max_timestamp: 0,
            cur_frame: 0,
            last_data_pos: 0,
            new_data_undo: RecordUndoInfo::default(),
            prop_undo: BTreeMap::new(),
            data_index: None,
        }
    }

    pub fn is_generator(&self) -> bool {
        self.node_type.is_generator()
    }

    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }

    pub fn summary(&self, id: u32) -> NodeSummary {
        NodeSummary {
            id,
            name: self.name.clone(),
            node_type: self.node_type,
            codec: self.codec_id,
            frames: self.frames,
            min_timestamp: self.min_timestamp,
            max_timestamp: self.max_timestamp,
            current_frame: self.cur_frame,
            indexed: self.data_index.is_some(),
        }
    }

    /// Forget playback position while keeping configuration and codec.
    pub fn rewind(&mut self) {
        self.cur_frame = 0;
        self.last_data_pos = 0;
        self.new_data_undo = RecordUndoInfo::default();
        self.prop_undo.clear();
    }
}

/// Public snapshot of one live node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: u32,
    pub name: String,
    pub node_type: NodeType,
    pub codec: CodecId,
    pub frames: u32,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub current_frame: u32,
    /// True when a seek table was loaded for the node
    pub indexed: bool,
}
