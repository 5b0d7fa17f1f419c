//! Unified error types for pinbridge

use crate::audio::device::BufferId;
use crate::audio::SampleFormat;
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Stream negotiation was requested for a session that is already live
    #[error("Audio stream already negotiated")]
    AlreadyNegotiated,

    /// Frame delivered before the stream was negotiated
    #[error("Audio stream not negotiated")]
    NotNegotiated,

    /// Stream descriptor cannot size a buffer pool
    #[error("Invalid stream descriptor: {0}")]
    InvalidDescriptor(String),

    /// The bridge only moves 16-bit PCM into the device
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(SampleFormat),

    /// Payload length does not match the negotiated frame geometry
    #[error("Frame of {len} samples rejected (capacity {capacity}, {channels} channels)")]
    FrameSize {
        len: usize,
        capacity: usize,
        channels: u16,
    },

    /// Frame storage could not be reserved
    #[error("Failed to allocate {bytes} bytes of frame storage")]
    Allocation { bytes: usize },

    /// Playback device operation error
    #[error("Playback device error: {0}")]
    Device(String),

    /// Device handed back a buffer the bridge never registered
    #[error("Playback device returned unknown buffer {0}")]
    UnknownBuffer(BufferId),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Create a device error with context
    pub fn device_error(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }

    /// Check if the caller broke the negotiation/ingestion contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::AlreadyNegotiated
                | BridgeError::NotNegotiated
                | BridgeError::InvalidDescriptor(_)
                | BridgeError::UnsupportedFormat(_)
                | BridgeError::FrameSize { .. }
        )
    }

    /// Check if this error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::Device(_) | BridgeError::Allocation { .. } | BridgeError::FrameSize { .. }
        )
    }
}
