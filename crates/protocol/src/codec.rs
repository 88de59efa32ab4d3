//! Binary codec for network messages.
//!
//! Provides compact serialization for transport implementations.

use crate::{ClientMessage, ServerMessage};
use thiserror::Error;

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Encode an outbound message to bytes.
pub fn encode_client(message: &ClientMessage) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serde::encode_to_vec(message, bincode::config::standard())?)
}

/// Decode an outbound message from bytes.
pub fn decode_client(data: &[u8]) -> Result<ClientMessage, CodecError> {
    let (message, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(message)
}

/// Encode an inbound frame batch to bytes.
pub fn encode_server(message: &ServerMessage) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serde::encode_to_vec(message, bincode::config::standard())?)
}

/// Decode an inbound frame batch from bytes.
pub fn decode_server(data: &[u8]) -> Result<ServerMessage, CodecError> {
    let (message, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(message)
}
