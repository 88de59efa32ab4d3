//! Error types for the sync layer.

use lockstep_protocol::{CodecError, FrameId};
use thiserror::Error;

/// Errors surfaced by [`crate::SyncManager`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync manager is not running")]
    NotRunning,

    #[error("networked session started without a transport")]
    MissingTransport,

    #[error("invalid sync parameters: {0}")]
    InvalidParams(String),

    /// A network slot was due but never arrived. The session is halted.
    #[error("frame {0} is not in the buffer")]
    MissingFrame(FrameId),

    #[error("frame {0} is already buffered")]
    DuplicateFrame(FrameId),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors reported by a [`crate::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is unavailable")]
    Unavailable,

    #[error("transport is closed")]
    Closed,

    #[error("transport rejected message: {0}")]
    Rejected(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors loading [`crate::SyncParams`] from TOML.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
