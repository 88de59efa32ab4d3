//! Consumer-facing callbacks.
//!
//! Flow-control commands are reported to every registered [`SyncObserver`] in
//! registration order. Whole frames go to a single [`FrameListener`] after
//! their flow commands have been handled.

use lockstep_protocol::{Frame, FrameId, PlayerId};

/// Receives flow-control events. All methods default to no-ops.
pub trait SyncObserver {
    fn game_begin(&mut self, _arg: i32) {}
    fn round_begin(&mut self, _arg: i32) {}
    fn control_start(&mut self, _arg: i32) {}
    fn round_end(&mut self, _arg: i32) {}
    fn game_end(&mut self, _arg: i32) {}
    fn game_exit(&mut self, _player_id: PlayerId) {}
}

/// Receives every executed frame exactly once.
pub trait FrameListener {
    fn on_frame(&mut self, frame_id: FrameId, frame: &Frame);
}

impl<F> FrameListener for F
where
    F: FnMut(FrameId, &Frame),
{
    fn on_frame(&mut self, frame_id: FrameId, frame: &Frame) {
        self(frame_id, frame)
    }
}
