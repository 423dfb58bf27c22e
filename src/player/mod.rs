//! Playback
//!
//! `OniReader` replays a recording into a `NodeNotifications` sink and can
//! jump any generator node to an arbitrary frame while restoring the
//! configuration that was in effect there.
//!
//! ## Undo Chains
//! ```text
//!   offset:  100        400        900        1500
//!            Prop(A=1)  NewData#1  Prop(A=2)  NewData#2
//!              ▲          ▲          │           │
//!              └──────────┼──────────┘ undo      │
//!                         └──────────────────────┘ undo
//! ```
//! Every record points back to the previous record for the same node and
//! property (or the same node's previous frame), so past state is found by
//! following offsets instead of rescanning the file.

mod node;
mod reader;
mod scanner;
mod seek;
mod stream;

pub use node::NodeSummary;
pub use reader::OniReader;
pub use scanner::{RecordScanner, ScannedRecord};
pub use seek::SeekOrigin;
