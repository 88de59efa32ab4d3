//! Lockstep Sync - Frame Synchronization Engine
//!
//! Buffers command frames from the relay (or from local input), paces their
//! execution against the frame-rate multiple and dispatches flow-control and
//! gameplay commands in the same order on every client.
//!
//! # Determinism Rules
//!
//! 1. Frames execute in strictly increasing index order, never arrival order
//! 2. Commands inside a frame execute in stored order
//! 3. Ordered containers only (`BTreeMap`, `Vec`), never `HashMap`
//! 4. No threads, no clocks: everything advances from [`SyncManager::drive`]

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod pacer;
pub mod relay;
pub mod state;
pub mod transport;

pub use buffer::{FrameBuffer, Ingest};
pub use client::SyncClient;
pub use config::{PacerConfig, SyncParams};
pub use error::{ConfigError, SyncError, TransportError};
pub use events::{FrameListener, SyncObserver};
pub use manager::SyncManager;
pub use pacer::{FrameController, FramePacer};
pub use relay::{LoopbackRelay, RelayTransport};
pub use state::GameState;
pub use transport::Transport;
