//! Production node types
//!
//! The container stores a node's type as the raw `i32` the device layer
//! uses. Only the generator predicate matters to recording and playback.

use std::fmt;

/// Type of a recorded production node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Device,
    Depth,
    Image,
    Audio,
    Ir,
    User,
    Recorder,
    Player,
    Gesture,
    Scene,
    Hands,
    Codec,
    ProductionNode,
    Generator,
    MapGenerator,
    Script,
    /// A type id this crate does not know about, kept verbatim
    Other(i32),
}

impl NodeType {
    /// Whether nodes of this type produce frames (and so get NewData records)
    pub fn is_generator(self) -> bool {
        matches!(
            self,
            NodeType::Depth
                | NodeType::Image
                | NodeType::Audio
                | NodeType::Ir
                | NodeType::User
                | NodeType::Gesture
                | NodeType::Scene
                | NodeType::Hands
                | NodeType::Generator
                | NodeType::MapGenerator
        )
    }

    pub fn as_raw(self) -> i32 {
        match self {
            NodeType::Device => 1,
            NodeType::Depth => 2,
            NodeType::Image => 3,
            NodeType::Audio => 4,
            NodeType::Ir => 5,
            NodeType::User => 6,
            NodeType::Recorder => 7,
            NodeType::Player => 8,
            NodeType::Gesture => 9,
            NodeType::Scene => 10,
            NodeType::Hands => 11,
            NodeType::Codec => 12,
            NodeType::ProductionNode => 13,
            NodeType::Generator => 14,
            NodeType::MapGenerator => 15,
            NodeType::Script => 16,
            NodeType::Other(raw) => raw,
        }
    }
}

impl From<i32> for NodeType {
    fn from(raw: i32) -> Self {
        match raw {
            1 => NodeType::Device,
            2 => NodeType::Depth,
            3 => NodeType::Image,
            4 => NodeType::Audio,
            5 => NodeType::Ir,
            6 => NodeType::User,
            7 => NodeType::Recorder,
            8 => NodeType::Player,
            9 => NodeType::Gesture,
            10 => NodeType::Scene,
            11 => NodeType::Hands,
            12 => NodeType::Codec,
            13 => NodeType::ProductionNode,
            14 => NodeType::Generator,
            15 => NodeType::MapGenerator,
            16 => NodeType::Script,
            other => NodeType::Other(other),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Other(raw) => write!(f, "Other({})", raw),
            named => write!(f, "{:?}", named),
        }
    }
}
