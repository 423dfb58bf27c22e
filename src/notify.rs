//! Node notifications
//!
//! The boundary between the container and whatever owns the nodes. The
//! reader pushes configuration and data events through `NodeNotifications`;
//! the writer accepts the same calls, so a reader can be piped straight into
//! a writer.

use crate::codec::CodecId;
use crate::error::Result;
use crate::node::NodeType;

/// Receiver of node lifecycle, property and data events
///
/// Every method defaults to accepting the event. Returning an error aborts
/// the operation that produced it.
#[allow(unused_variables)]
pub trait NodeNotifications {
    fn on_node_added(&mut self, node: &str, node_type: NodeType, codec: CodecId) -> Result<()> {
        Ok(())
    }

    fn on_node_removed(&mut self, node: &str) -> Result<()> {
        Ok(())
    }

    fn on_node_int_prop_changed(&mut self, node: &str, prop: &str, value: u64) -> Result<()> {
        Ok(())
    }

    fn on_node_real_prop_changed(&mut self, node: &str, prop: &str, value: f64) -> Result<()> {
        Ok(())
    }

    fn on_node_string_prop_changed(&mut self, node: &str, prop: &str, value: &str) -> Result<()> {
        Ok(())
    }

    fn on_node_general_prop_changed(&mut self, node: &str, prop: &str, value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_node_state_ready(&mut self, node: &str) -> Result<()> {
        Ok(())
    }

    /// A decoded frame. Seeks may synthesize an empty frame (frame 0).
    fn on_node_new_data(&mut self, node: &str, timestamp: u64, frame: u32, data: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Playback reached the End record
    fn on_end_of_file(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: NodeNotifications + ?Sized> NodeNotifications for &mut T {
    fn on_node_added(&mut self, node: &str, node_type: NodeType, codec: CodecId) -> Result<()> {
        (**self).on_node_added(node, node_type, codec)
    }

    fn on_node_removed(&mut self, node: &str) -> Result<()> {
        (**self).on_node_removed(node)
    }

    fn on_node_int_prop_changed(&mut self, node: &str, prop: &str, value: u64) -> Result<()> {
        (**self).on_node_int_prop_changed(node, prop, value)
    }

    fn on_node_real_prop_changed(&mut self, node: &str, prop: &str, value: f64) -> Result<()> {
        (**self).on_node_real_prop_changed(node, prop, value)
    }

    fn on_node_string_prop_changed(&mut self, node: &str, prop: &str, value: &str) -> Result<()> {
        (**self).on_node_string_prop_changed(node, prop, value)
    }

    fn on_node_general_prop_changed(&mut self, node: &str, prop: &str, value: &[u8]) -> Result<()> {
        (**self).on_node_general_prop_changed(node, prop, value)
    }

    fn on_node_state_ready(&mut self, node: &str) -> Result<()> {
        (**self).on_node_state_ready(node)
    }

    fn on_node_new_data(&mut self, node: &str, timestamp: u64, frame: u32, data: &[u8]) -> Result<()> {
        (**self).on_node_new_data(node, timestamp, frame, data)
    }

    fn on_end_of_file(&mut self) -> Result<()> {
        (**self).on_end_of_file()
    }
}

// =============================================================================
// Event Log
// =============================================================================

/// Owned copy of one notification
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NodeAdded { node: String, node_type: NodeType, codec: CodecId },
    NodeRemoved { node: String },
    IntProp { node: String, prop: String, value: u64 },
    RealProp { node: String, prop: String, value: f64 },
    StringProp { node: String, prop: String, value: String },
    GeneralProp { node: String, prop: String, value: Vec<u8> },
    StateReady { node: String },
    NewData { node: String, timestamp: u64, frame: u32, data: Vec<u8> },
    EndOfFile,
}

/// Records every notification in order
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<PlaybackEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    /// Drain everything recorded so far
    pub fn take(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl NodeNotifications for EventLog {
    fn on_node_added(&mut self, node: &str, node_type: NodeType, codec: CodecId) -> Result<()> {
        self.events.push(PlaybackEvent::NodeAdded {
            node: node.to_string(),
            node_type,
            codec,
        });
        Ok(())
    }

    fn on_node_removed(&mut self, node: &str) -> Result<()> {
        self.events.push(PlaybackEvent::NodeRemoved { node: node.to_string() });
        Ok(())
    }

    fn on_node_int_prop_changed(&mut self, node: &str, prop: &str, value: u64) -> Result<()> {
        self.events.push(PlaybackEvent::IntProp {
            node: node.to_string(),
            prop: prop.to_string(),
            value,
        });
        Ok(())
    }

    fn on_node_real_prop_changed(&mut self, node: &str, prop: &str, value: f64) -> Result<()> {
        self.events.push(PlaybackEvent::RealProp {
            node: node.to_string(),
            prop: prop.to_string(),
            value,
        });
        Ok(())
    }

    fn on_node_string_prop_changed(&mut self, node: &str, prop: &str, value: &str) -> Result<()> {
        self.events.push(PlaybackEvent::StringProp {
            node: node.to_string(),
            prop: prop.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn on_node_general_prop_changed(&mut self, node: &str, prop: &str, value: &[u8]) -> Result<()> {
        self.events.push(PlaybackEvent::GeneralProp {
            node: node.to_string(),
            prop: prop.to_string(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn on_node_state_ready(&mut self, node: &str) -> Result<()> {
        self.events.push(PlaybackEvent::StateReady { node: node.to_string() });
        Ok(())
    }

    fn on_node_new_data(&mut self, node: &str, timestamp: u64, frame: u32, data: &[u8]) -> Result<()> {
        self.events.push(PlaybackEvent::NewData {
            node: node.to_string(),
            timestamp,
            frame,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn on_end_of_file(&mut self) -> Result<()> {
        self.events.push(PlaybackEvent::EndOfFile);
        Ok(())
    }
}
