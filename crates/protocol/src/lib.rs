//! Wire protocol for lockstep frame sync.
//!
//! Defines the frames and commands exchanged between clients and the relay.
//! Uses binary encoding for minimal bandwidth usage.

pub mod codec;
pub mod messages;
pub mod vkey;

pub use codec::*;
pub use messages::*;
