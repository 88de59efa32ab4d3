//! Outbound transport capability.
//!
//! The client never reaches a socket directly; it is handed a [`Transport`]
//! at construction. Inbound frames take the other direction, through
//! [`crate::SyncManager::on_receive`].

use lockstep_protocol::ClientMessage;

use crate::error::TransportError;

/// Narrow send capability plus a connectivity probe.
pub trait Transport {
    /// Send one envelope.
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError>;

    /// Connectivity probe polled while a reconnect is pending.
    fn is_available(&self) -> bool;

    /// Open the link.
    fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Close the link.
    fn disconnect(&mut self) {}
}
