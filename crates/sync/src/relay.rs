//! In-process relay.
//!
//! Stands in for the authoritative server in single-process matches: every
//! [`LoopbackRelay::tick`] closes one network frame containing the commands
//! received since the previous tick, tagged with the sender's player id.
//! Commands reach the relay as encoded [`ClientMessage`] bytes, the same
//! wire format a socket transport would carry.

use std::cell::RefCell;
use std::rc::Rc;

use lockstep_protocol::{
    decode_client, encode_client, vkey, ClientMessage, Frame, FrameId, PlayerId, ServerMessage, VKey,
};

use crate::error::TransportError;
use crate::transport::Transport;

#[derive(Debug)]
struct RelayState {
    session_id: u32,
    last_frame: FrameId,
    inbox: Vec<VKey>,
    authenticated: Vec<PlayerId>,
    available: bool,
}

impl RelayState {
    fn receive(&mut self, player_id: PlayerId, data: &[u8]) -> Result<(), TransportError> {
        let message = decode_client(data)?;
        if message.session_id != self.session_id {
            return Err(TransportError::Rejected(format!(
                "session {} does not match relay session {}",
                message.session_id, self.session_id
            )));
        }

        for cmd in message.vkeys {
            if cmd.vkey == vkey::AUTH {
                if !self.authenticated.contains(&player_id) {
                    tracing::debug!(player = player_id, "relay authenticated player");
                    self.authenticated.push(player_id);
                }
                continue;
            }
            self.inbox.push(VKey::new(cmd.vkey, cmd.args, player_id));
        }
        Ok(())
    }
}

/// Shared in-process authority. Cloning shares the same relay.
#[derive(Debug, Clone)]
pub struct LoopbackRelay {
    state: Rc<RefCell<RelayState>>,
}

impl LoopbackRelay {
    pub fn new(session_id: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(RelayState {
                session_id,
                last_frame: 0,
                inbox: Vec::new(),
                authenticated: Vec::new(),
                available: true,
            })),
        }
    }

    /// Transport for one player.
    pub fn connect(&self, player_id: PlayerId) -> RelayTransport {
        RelayTransport {
            player_id,
            connected: false,
            state: self.state.clone(),
        }
    }

    /// Closes the next frame and returns it as a broadcast batch.
    ///
    /// Numbering starts at 1 and restarts after a frame carrying `ROUND_BEGIN`,
    /// matching the client's cursor reset.
    pub fn tick(&self) -> ServerMessage {
        let mut state = self.state.borrow_mut();
        let frame_id = state.last_frame + 1;

        let vkeys: Vec<VKey> = state.inbox.drain(..).collect();
        let restarts_round = vkeys.iter().any(|cmd| cmd.vkey == vkey::ROUND_BEGIN);
        state.last_frame = if restarts_round { 0 } else { frame_id };

        if !vkeys.is_empty() {
            tracing::debug!(frame = frame_id, commands = vkeys.len(), "relay closed frame");
        }
        ServerMessage::single(Frame::new(frame_id, vkeys))
    }

    /// Accepts one encoded [`ClientMessage`] from `player_id`.
    pub fn receive(&self, player_id: PlayerId, data: &[u8]) -> Result<(), TransportError> {
        self.state.borrow_mut().receive(player_id, data)
    }

    /// Players whose `AUTH` reached the relay, in arrival order.
    pub fn authenticated_players(&self) -> Vec<PlayerId> {
        self.state.borrow().authenticated.clone()
    }

    /// Commands waiting for the next tick.
    pub fn pending_commands(&self) -> usize {
        self.state.borrow().inbox.len()
    }

    /// Simulates connectivity loss or recovery for every transport.
    pub fn set_available(&self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    pub fn is_available(&self) -> bool {
        self.state.borrow().available
    }
}

/// One player's link to a [`LoopbackRelay`].
#[derive(Debug)]
pub struct RelayTransport {
    player_id: PlayerId,
    connected: bool,
    state: Rc<RefCell<RelayState>>,
}

impl Transport for RelayTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        if !self.is_available() {
            return Err(TransportError::Unavailable);
        }
        if !self.connected {
            return Err(TransportError::Closed);
        }

        let bytes = encode_client(message)?;
        self.state.borrow_mut().receive(self.player_id, &bytes)
    }

    fn is_available(&self) -> bool {
        self.state.borrow().available
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if !self.state.borrow().available {
            return Err(TransportError::Unavailable);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}
