//! Frame buffer keyed by frame index.
//!
//! Backed by a `BTreeMap` so iteration is always in index order, never in
//! insertion or hash order.

use std::collections::BTreeMap;

use lockstep_protocol::{Frame, FrameId, VKey};

use crate::error::SyncError;

/// Where a buffered command came from.
#[derive(Debug)]
pub enum Ingest {
    /// A whole frame from the relay, already rescaled to local ticks.
    /// Each index may arrive only once.
    Network(Frame),

    /// A command submitted in local mode, appended to `frame_id`.
    Local { frame_id: FrameId, command: VKey },
}

/// Frames waiting to execute.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    frames: BTreeMap<FrameId, Frame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single insertion routine for both sources. Returns the index written.
    pub fn ingest(&mut self, source: Ingest) -> Result<FrameId, SyncError> {
        match source {
            Ingest::Network(frame) => {
                let frame_id = frame.frame_id;
                if self.frames.contains_key(&frame_id) {
                    return Err(SyncError::DuplicateFrame(frame_id));
                }
                self.frames.insert(frame_id, frame);
                Ok(frame_id)
            }
            Ingest::Local { frame_id, command } => {
                self.frames
                    .entry(frame_id)
                    .or_insert_with(|| Frame::empty(frame_id))
                    .vkeys
                    .push(command);
                Ok(frame_id)
            }
        }
    }

    pub fn get(&self, frame_id: FrameId) -> Option<&Frame> {
        self.frames.get(&frame_id)
    }

    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.frames.contains_key(&frame_id)
    }

    /// Buffered indices in ascending order.
    pub fn frame_ids(&self) -> Vec<FrameId> {
        self.frames.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
