//! One player's authenticated link to the relay.
//!
//! Owns the connection lifecycle, the `AUTH` handshake and the outbound
//! envelope. Connectivity loss is never surfaced to callers: it raises a
//! pending-reconnect flag that [`SyncClient::drive`] polls once per tick.

use lockstep_protocol::{vkey, ClientMessage, VKey};

use crate::transport::Transport;

/// Reusable outbound envelope.
///
/// [`Envelope::write`] clears every command before writing the new one, so
/// no field from a previous send can leak into the next.
#[derive(Debug, Default)]
struct Envelope {
    message: ClientMessage,
}

impl Envelope {
    fn bind(&mut self, session_id: u32) {
        self.message.session_id = session_id;
        self.message.vkeys.clear();
    }

    fn write(&mut self, vkey: i32, arg: i32, client_frame_id: u32) -> &ClientMessage {
        self.message.vkeys.clear();
        self.message.vkeys.push(VKey::with_arg(vkey, arg, client_frame_id));
        &self.message
    }
}

pub struct SyncClient {
    transport: Box<dyn Transport>,
    envelope: Envelope,
    auth_id: i32,
    running: bool,
    reconnect_pending: bool,
    auth_pending: bool,
}

impl SyncClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            envelope: Envelope::default(),
            auth_id: 0,
            running: false,
            reconnect_pending: false,
            auth_pending: false,
        }
    }

    /// Resets the envelope and binds it to `session_id`.
    pub fn set_session_identity(&mut self, session_id: u32) {
        self.envelope.bind(session_id);
    }

    pub fn set_auth_info(&mut self, auth_id: i32) {
        self.auth_id = auth_id;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn is_auth_pending(&self) -> bool {
        self.auth_pending
    }

    /// Opens the link. On failure a reconnect is scheduled and `false` returned.
    pub fn connect(&mut self) -> bool {
        match self.transport.connect() {
            Ok(()) => {
                self.running = true;
                tracing::debug!(session = self.envelope.message.session_id, "sync client connected");
                true
            }
            Err(e) => {
                tracing::warn!("sync client connect failed: {e}");
                self.connection_lost();
                false
            }
        }
    }

    fn disconnect(&mut self) {
        self.running = false;
        self.transport.disconnect();
    }

    /// Sends `AUTH`. If the send fails the handshake is retried on the next drive.
    pub fn verify_auth(&mut self) {
        self.auth_pending = false;
        if !self.send(vkey::AUTH, self.auth_id, 0) {
            self.auth_pending = true;
        }
    }

    /// Disconnect, connect, then authenticate.
    pub fn reconnect(&mut self) {
        tracing::info!(session = self.envelope.message.session_id, "sync client reconnecting");
        self.reconnect_pending = false;

        self.disconnect();
        self.connect();
        self.verify_auth();
    }

    /// Records a transport-reported loss of connection.
    pub fn connection_lost(&mut self) {
        self.running = false;
        self.reconnect_pending = true;
    }

    /// Sends one command tagged with the sender's client frame.
    ///
    /// Returns `false` without sending when the link is down. A transport
    /// error drops the link and schedules a reconnect.
    pub fn send(&mut self, vkey: i32, arg: i32, client_frame_id: u32) -> bool {
        if !self.running {
            return false;
        }

        let message = self.envelope.write(vkey, arg, client_frame_id);
        match self.transport.send(message) {
            Ok(()) => {
                tracing::trace!(vkey = vkey::name(vkey), arg, client_frame_id, "sent command");
                true
            }
            Err(e) => {
                tracing::warn!(vkey = vkey::name(vkey), "send failed, scheduling reconnect: {e}");
                self.connection_lost();
                false
            }
        }
    }

    /// Per-tick retry site for reconnect and authentication.
    pub fn drive(&mut self) {
        if self.reconnect_pending && self.transport.is_available() {
            self.reconnect();
        }

        if self.auth_pending && self.running {
            self.verify_auth();
        }
    }

    /// Disconnects and clears pending work. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.running {
            self.disconnect();
        }
        self.reconnect_pending = false;
        self.auth_pending = false;
    }
}
