//! Frame pacing.
//!
//! The manager asks its [`FramePacer`] each drive how many local ticks may
//! run. [`FrameController`] is the default: one tick per drive while the
//! backlog is small, faster when it falls behind, and never past a network
//! slot that has not arrived.

use std::collections::BTreeSet;

use lockstep_protocol::FrameId;

use crate::config::PacerConfig;

/// Decides how many local ticks run per drive.
pub trait FramePacer {
    /// Number of ticks that may execute starting after `current`.
    fn advance(&mut self, current: FrameId) -> u32;

    /// A network frame with this (rescaled) index was buffered.
    fn notify_arrived(&mut self, frame_id: FrameId);

    /// Forget all arrivals. Called on round restart.
    fn reset(&mut self);
}

/// Default pacer. Tracks the contiguous run of arrived network slots.
#[derive(Debug, Clone)]
pub struct FrameController {
    config: PacerConfig,
    multiple: i32,
    /// Highest slot with every earlier slot present. 0 before any arrival.
    head: FrameId,
    /// Arrived slots beyond a gap.
    pending: BTreeSet<FrameId>,
}

impl FrameController {
    pub fn new(config: PacerConfig, multiple: i32) -> Self {
        Self {
            config,
            multiple: multiple.max(1),
            head: 0,
            pending: BTreeSet::new(),
        }
    }

    /// Last tick that may run without crossing a missing slot.
    pub fn ready_ceiling(&self) -> FrameId {
        self.head + self.multiple - 1
    }

    pub fn head(&self) -> FrameId {
        self.head
    }
}

impl FramePacer for FrameController {
    fn advance(&mut self, current: FrameId) -> u32 {
        let ceiling = self.ready_ceiling();
        if current >= ceiling {
            return 0;
        }

        let backlog = (ceiling - current) as u32;
        if backlog > self.config.catch_up_threshold {
            let speed = backlog.min(self.config.max_speed.max(1));
            tracing::trace!(current, backlog, speed, "catching up");
            speed
        } else {
            1
        }
    }

    fn notify_arrived(&mut self, frame_id: FrameId) {
        if frame_id <= self.head {
            return;
        }
        self.pending.insert(frame_id);
        while self.pending.remove(&(self.head + self.multiple)) {
            self.head += self.multiple;
        }
    }

    fn reset(&mut self) {
        self.head = 0;
        self.pending.clear();
    }
}
