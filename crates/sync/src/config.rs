//! Session configuration.
//!
//! [`SyncParams`] is fixed for one session and consumed at
//! [`crate::SyncManager::start`]. [`PacerConfig`] tunes the default
//! [`crate::FrameController`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SyncError};

/// Parameters for one sync session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncParams {
    /// Run without a relay. Commands go straight into the local frame buffer.
    pub use_local: bool,

    /// Session the outbound envelope is bound to.
    pub session_id: u32,

    /// Credential sent with `AUTH`.
    pub auth_id: i32,

    /// Local ticks per network frame. Must be at least 1.
    pub client_frame_rate_multiple: i32,

    /// Local-mode ceiling. 0 means unbounded.
    pub max_frame_id: i32,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            use_local: false,
            session_id: 0,
            auth_id: 0,
            client_frame_rate_multiple: 1,
            max_frame_id: 0,
        }
    }
}

impl SyncParams {
    /// Local-only session.
    pub fn local(max_frame_id: i32) -> Self {
        Self {
            use_local: true,
            max_frame_id,
            ..Self::default()
        }
    }

    /// Networked session.
    pub fn networked(session_id: u32, auth_id: i32, client_frame_rate_multiple: i32) -> Self {
        Self {
            use_local: false,
            session_id,
            auth_id,
            client_frame_rate_multiple,
            max_frame_id: 0,
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.client_frame_rate_multiple < 1 {
            return Err(SyncError::InvalidParams(format!(
                "client_frame_rate_multiple must be >= 1, got {}",
                self.client_frame_rate_multiple
            )));
        }
        if self.max_frame_id < 0 {
            return Err(SyncError::InvalidParams(format!(
                "max_frame_id must be >= 0, got {}",
                self.max_frame_id
            )));
        }
        Ok(())
    }
}

/// Tuning for [`crate::FrameController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Backlog (in local ticks) above which the pacer runs several ticks per drive.
    pub catch_up_threshold: u32,

    /// Most ticks run in one drive while catching up.
    pub max_speed: u32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            catch_up_threshold: 8,
            max_speed: 4,
        }
    }
}
