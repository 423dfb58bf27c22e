//! Frame seeking
//!
//! ## Strategy Selection
//! ```text
//!   dest == current ─────────────────────────► re-decode last frame
//!   index on every generator, config ids equal ► fast: jump to index offsets
//!   otherwise, dest < current ───────────────► slow backward: walk undo chains
//!   otherwise ───────────────────────────────► slow forward: replay records
//!                                               │
//!   slow paths finish by re-decoding each generator's last frame,
//!   the requesting node last
//! ```
//!
//! A configuration id is bumped by every lifecycle or property event, so two
//! index entries with equal ids prove nothing happened between them and the
//! fast path needs no replay.

use std::io::{Read, Seek};

use crate::error::{OniError, Result};
use crate::format::{Record, RecordBody};
use crate::notify::NodeNotifications;

use super::node::RecordUndoInfo;
use super::reader::OniReader;

/// Reference point for `seek_to_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset from frame 0
    Set,
    /// Offset from the node's current frame
    Current,
    /// Offset from the node's last frame
    End,
}

impl<R: Read + Seek, N: NodeNotifications> OniReader<R, N> {
    /// Move `node` to another frame and restore the configuration that was
    /// in effect when that frame was recorded.
    ///
    /// The destination is clamped to `1..=frames`. Every live generator ends
    /// up showing the frame it had at that point of the recording. On
    /// failure the read offset is put back where it was.
    pub fn seek_to_frame(&mut self, node: &str, delta: i64, origin: SeekOrigin) -> Result<()> {
        let node_id = self.node_id_by_name(node)?;
        let (frames, cur_frame) = match self.nodes.get(&node_id) {
            Some(info) if info.is_generator() => (info.frames, info.cur_frame),
            _ => {
                return Err(OniError::InvalidOperation(format!(
                    "node '{}' does not produce frames",
                    node
                )))
            }
        };
        if frames == 0 {
            return Err(OniError::InvalidOperation(format!(
                "node '{}' has no frames",
                node
            )));
        }

        let base = match origin {
            SeekOrigin::Set => 0,
            SeekOrigin::Current => i64::from(cur_frame),
            SeekOrigin::End => i64::from(frames),
        };
        let dest = base.saturating_add(delta).clamp(1, i64::from(frames)) as u32;

        let start_pos = self.stream.tell();
        let result = self.seek_node_to(node_id, cur_frame, dest);
        if result.is_err() && self.stream.is_open() {
            let _ = self.stream.seek_to(start_pos);
        }
        result
    }

    fn seek_node_to(&mut self, node_id: u32, cur_frame: u32, dest: u32) -> Result<()> {
        if dest == cur_frame {
            let pos = self.nodes.get(&node_id).map_or(0, |info| info.last_data_pos);
            tracing::debug!("Seek node {} to current frame {}", node_id, dest);
            self.stream.seek_to(pos)?;
            return self.process_record(true);
        }

        if self.config.fast_seek {
            if let Some(targets) = self.fast_seek_targets(node_id, cur_frame, dest) {
                tracing::debug!("Fast seek node {}: {} -> {}", node_id, cur_frame, dest);
                return self.apply_fast_seek(&targets);
            }
        }

        if dest < cur_frame {
            tracing::debug!("Slow seek node {} backward: {} -> {}", node_id, cur_frame, dest);
            self.seek_backward(node_id, dest)?;
        } else {
            tracing::debug!("Slow seek node {} forward: {} -> {}", node_id, cur_frame, dest);
            self.seek_forward(node_id, dest)?;
        }
        self.process_each_node_last_data(node_id)
    }

    // -------------------------------------------------------------------------
    // Fast Seek
    // -------------------------------------------------------------------------

    /// Resolve an index offset for every live generator, requesting node last.
    ///
    /// `None` when any generator lacks an index or its nearest preceding
    /// entry was recorded under a different configuration.
    fn fast_seek_targets(&self, node_id: u32, cur_frame: u32, dest: u32) -> Option<Vec<u64>> {
        let index = self.nodes.get(&node_id)?.data_index.as_ref()?;
        let current = index.get(cur_frame as usize)?;
        let target = index.get(dest as usize)?;
        if current.config_id != target.config_id {
            return None;
        }

        let mut targets = Vec::with_capacity(self.nodes.len());
        for (id, info) in &self.nodes {
            if *id == node_id || !info.is_generator() {
                continue;
            }
            let frames = info.data_index.as_ref()?.get(1..)?;
            let preceding = frames.partition_point(|entry| entry.seek_pos <= target.seek_pos);
            let entry = frames.get(preceding.checked_sub(1)?)?;
            if entry.config_id != target.config_id {
                return None;
            }
            targets.push(entry.seek_pos);
        }
        targets.push(target.seek_pos);
        Some(targets)
    }

    /// Decode the frame at each target and leave the stream after the
    /// furthest one.
    fn apply_fast_seek(&mut self, targets: &[u64]) -> Result<()> {
        let mut furthest = 0;
        for pos in targets {
            self.stream.seek_to(*pos)?;
            self.process_record(true)?;
            furthest = furthest.max(self.stream.tell());
        }
        self.stream.seek_to(furthest)
    }

    // -------------------------------------------------------------------------
    // Slow Seek
    // -------------------------------------------------------------------------

    fn seek_forward(&mut self, node_id: u32, dest: u32) -> Result<()> {
        while self
            .nodes
            .get(&node_id)
            .map_or(false, |info| info.cur_frame < dest)
        {
            self.process_record(false)?;
        }
        Ok(())
    }

    /// Walk the requesting node's data chain back to `dest`, then undo every
    /// property and every other generator's frame written after it.
    fn seek_backward(&mut self, node_id: u32, dest: u32) -> Result<()> {
        let head = self
            .nodes
            .get(&node_id)
            .map_or(0, |info| info.last_data_pos);

        let mut pos = head;
        let mut steps = 0;
        let dest_pos = loop {
            steps += 1;
            if steps > self.config.max_undo_steps {
                return Err(chain_too_long(node_id, self.config.max_undo_steps));
            }
            let record = self.read_chain_link(pos, node_id, None)?;
            let reached = matches!(record.body, RecordBody::NewData { frame, .. } if frame <= dest);
            if reached {
                self.handle_record(pos, record, false)?;
                break pos;
            }
            pos = record.undo_pos;
        };

        // Properties changed after the destination frame
        let mut props: Vec<(u32, String, RecordUndoInfo)> = Vec::new();
        for (id, info) in &self.nodes {
            for (name, undo) in &info.prop_undo {
                if undo.record_pos > dest_pos {
                    props.push((*id, name.clone(), *undo));
                }
            }
        }
        for (id, name, undo) in props {
            if !self.undo_to(id, Some(&name), undo, dest_pos)? {
                tracing::trace!("Node {}: '{}' has no value before offset {}", id, name, dest_pos);
            }
        }

        // Other generators' frames written after the destination frame
        let others: Vec<(u32, RecordUndoInfo)> = self
            .nodes
            .iter()
            .filter(|(id, info)| {
                **id != node_id && info.is_generator() && info.new_data_undo.record_pos > dest_pos
            })
            .map(|(id, info)| (*id, info.new_data_undo))
            .collect();
        for (id, undo) in others {
            if !self.undo_to(id, None, undo, dest_pos)? {
                if let Some(info) = self.nodes.get_mut(&id) {
                    info.last_data_pos = 0;
                    info.new_data_undo = RecordUndoInfo::default();
                }
            }
        }
        Ok(())
    }

    /// Follow one undo chain from `undo` to the newest record before
    /// `dest_pos` and apply it without its payload.
    ///
    /// `prop` selects a property chain; `None` walks the node's data chain.
    /// Returns false when the chain ends before reaching `dest_pos`.
    fn undo_to(&mut self, node_id: u32, prop: Option<&str>, undo: RecordUndoInfo, dest_pos: u64) -> Result<bool> {
        let mut pos = undo.undo_pos;
        for _ in 0..self.config.max_undo_steps {
            if pos == 0 {
                return Ok(false);
            }
            let record = self.read_chain_link(pos, node_id, prop)?;
            if pos < dest_pos {
                self.handle_record(pos, record, false)?;
                return Ok(true);
            }
            pos = record.undo_pos;
        }
        Err(chain_too_long(node_id, self.config.max_undo_steps))
    }

    /// Read the record at `pos` and check it belongs to the chain being walked.
    ///
    /// The record must be NewData (or the named property) of `node_id`, and
    /// its own undo offset must point further back.
    fn read_chain_link(&mut self, pos: u64, node_id: u32, prop: Option<&str>) -> Result<Record<'static>> {
        if pos == 0 {
            return Err(OniError::NoMatchingUndoRecord(pos));
        }
        self.stream.seek_to(pos)?;
        let record = self.stream.read_record(&mut self.record_buf, self.width)?;

        let matches = record.node_id == node_id
            && match (&record.body, prop) {
                (RecordBody::NewData { .. }, None) => true,
                (RecordBody::Property(p), Some(name)) => p.name == name,
                _ => false,
            };
        if !matches || record.undo_pos >= pos {
            return Err(OniError::NoMatchingUndoRecord(pos));
        }
        Ok(record)
    }

    /// Re-decode every generator's last frame, the requesting node last so
    /// the stream ends up right after its record.
    ///
    /// A generator with no frame before the destination gets an empty one.
    fn process_each_node_last_data(&mut self, node_id: u32) -> Result<()> {
        let order: Vec<u32> = self
            .nodes
            .iter()
            .filter(|(id, info)| **id != node_id && info.is_generator())
            .map(|(id, _)| *id)
            .chain(std::iter::once(node_id))
            .collect();

        for id in order {
            let info = match self.nodes.get_mut(&id) {
                Some(info) => info,
                None => continue,
            };
            if info.last_data_pos == 0 {
                info.cur_frame = 0;
                self.notifications.on_node_new_data(&info.name, 0, 0, &[])?;
            } else {
                let pos = info.last_data_pos;
                self.stream.seek_to(pos)?;
                self.process_record(true)?;
            }
        }
        Ok(())
    }
}

fn chain_too_long(node_id: u32, max_steps: usize) -> OniError {
    OniError::CorruptFile(format!(
        "undo chain of node {} exceeds {} steps",
        node_id, max_steps
    ))
}
