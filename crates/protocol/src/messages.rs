//! Network message types.
//!
//! Clients send one [`ClientMessage`] per command; the relay answers with
//! batches of [`Frame`]s wrapped in a [`ServerMessage`].

use serde::{Deserialize, Serialize};

/// Frame index. Values `<= 0` are out-of-band and execute on arrival.
pub type FrameId = i32;

/// Player identifier assigned by the session.
pub type PlayerId = u32;

/// A single command.
///
/// `origin_id` is the sender's player id on inbound and local frames, and the
/// sender's current client frame on outbound messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VKey {
    pub vkey: i32,
    pub args: Vec<i32>,
    pub origin_id: u32,
}

impl VKey {
    pub fn new(vkey: i32, args: Vec<i32>, origin_id: u32) -> Self {
        Self { vkey, args, origin_id }
    }

    /// Command carrying a single argument.
    pub fn with_arg(vkey: i32, arg: i32, origin_id: u32) -> Self {
        Self::new(vkey, vec![arg], origin_id)
    }

    /// First argument, or 0 when the command carries none.
    pub fn arg(&self) -> i32 {
        self.args.first().copied().unwrap_or(0)
    }
}

/// Atomic unit of lockstep execution: every command runs once, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: FrameId,
    pub vkeys: Vec<VKey>,
}

impl Frame {
    /// Frame with no commands.
    pub fn empty(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            vkeys: Vec::new(),
        }
    }

    pub fn new(frame_id: FrameId, vkeys: Vec<VKey>) -> Self {
        Self { frame_id, vkeys }
    }

    pub fn is_empty(&self) -> bool {
        self.vkeys.is_empty()
    }

    /// Out-of-band frames bypass the buffer.
    pub fn is_out_of_band(&self) -> bool {
        self.frame_id <= 0
    }
}

/// Outbound envelope, client to relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub session_id: u32,
    pub vkeys: Vec<VKey>,
}

/// Inbound batch, relay to client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub frames: Vec<Frame>,
}

impl ServerMessage {
    pub fn single(frame: Frame) -> Self {
        Self { frames: vec![frame] }
    }
}
