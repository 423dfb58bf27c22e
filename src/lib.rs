//! # onirec
//!
//! Recording and playback of ONI sensor-stream containers:
//! - Append-only record log with per-node configuration and frame records
//! - In-place backpatching of node statistics and the file header
//! - Per-node seek tables for index-assisted seeking
//! - Undo chains for restoring past configuration without an index
//!
//! ## Architecture Overview
//!
//! ```text
//!   device / source                                 viewer / sink
//!         │                                               ▲
//!         │ on_node_*                                     │ on_node_*
//! ┌───────▼───────┐                             ┌─────────┴─────────┐
//! │   OniWriter   │                             │     OniReader     │
//! │   (recorder)  │                             │ (player + seeking)│
//! └───┬───────┬───┘                             └───┬───────────┬───┘
//!     │       │                                     │           │
//!     │  ┌────▼─────────────────────────────────────▼────┐      │
//!     │  │          format (records, header, index)      │      │
//!     │  └───────────────────────────────────────────────┘      │
//!     │  ┌───────────────────────────────────────────────┐      │
//!     └─►│          codec (payload encode / decode)      │◄─────┘
//!        └───────────────────────────────────────────────┘
//!                      │ std::io::{Read, Write, Seek}
//!                      ▼
//!                  .oni file
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod node;

pub mod format;
pub mod codec;
pub mod notify;
pub mod recorder;
pub mod player;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{OniError, Result};
pub use config::Config;
pub use node::NodeType;
pub use codec::{CodecId, CodecRegistry, PayloadCodec};
pub use notify::{EventLog, NodeNotifications, PlaybackEvent};
pub use recorder::OniWriter;
pub use player::{NodeSummary, OniReader, RecordScanner, SeekOrigin};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of onirec
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
