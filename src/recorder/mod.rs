//! Recording
//!
//! `OniWriter` appends records for node lifecycle, property changes and
//! frames, keeps a seek index per node in memory, and backpatches each
//! node's NodeAdded record and the file header once final statistics are
//! known.
//!
//! ## Backpatch Flow
//! ```text
//!   open()            header(sentinels) ──────────────────────────┐
//!   on_node_added()   NodeAdded(v3, blank seek info) ◄──┐         │
//!   on_node_new_data  DataBegin, NewData, NewData ...   │         │
//!   on_node_removed() NodeRemoved, SeekTable ───────────┘ rewrite │
//!   close()           End, trailers for live nodes ───────────────┘ rewrite
//! ```

mod node;
mod writer;

pub use writer::OniWriter;
