//! pinbridge - pinball emulation core driver
//!
//! Feeds an emulation core's variable-rate PCM frames into a small fixed pool
//! of playback buffers with bounded latency, and renders dot-matrix and
//! alphanumeric displays as text.

pub mod audio;
pub mod config;
pub mod core;
pub mod display;
pub mod driver;
pub mod error;
pub mod sync;

pub use error::{BridgeError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
