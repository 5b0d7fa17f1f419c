//! Audio bridge, frame pooling, and playback devices

pub mod bridge;
pub mod convert;
pub mod device;
mod frame_pool;

pub use bridge::{AudioBridge, BridgeConfig, BridgeState, BridgeStats, SharedStats, UnderflowFill};
pub use device::{BufferId, PlaybackDevice, PlaybackStatus};
pub use frame_pool::FramePool;

use serde::{Deserialize, Serialize};

/// Default number of device playback buffers
pub const DEFAULT_BUFFER_COUNT: usize = 4;

/// Default bound on frames waiting for a playback buffer
pub const DEFAULT_QUEUE_LIMIT: usize = 10;

/// PCM sample encoding delivered by the emulation core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit integer PCM
    Int16,
    /// 32-bit float PCM in [-1.0, 1.0]
    Float32,
}

impl SampleFormat {
    /// Width of one sample in bytes
    pub fn sample_width(&self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Float32 => 4,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::Int16 => write!(f, "int16"),
            SampleFormat::Float32 => write!(f, "float32"),
        }
    }
}

/// Stream parameters negotiated once per session
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    /// Per-channel samples delivered by each update callback
    pub samples_per_frame: usize,
    /// Update callbacks per second, as reported by the core
    pub frames_per_second: f64,
    /// Size of the core's internal sound buffer, in samples
    pub buffer_size: usize,
}

impl StreamDescriptor {
    /// Create a descriptor, deriving the callback rate from the frame size
    pub fn new(format: SampleFormat, channels: u16, sample_rate: u32, samples_per_frame: usize) -> Self {
        let frames_per_second = if samples_per_frame == 0 {
            0.0
        } else {
            sample_rate as f64 / samples_per_frame as f64
        };

        Self {
            format,
            channels,
            sample_rate,
            samples_per_frame,
            frames_per_second,
            buffer_size: samples_per_frame,
        }
    }

    /// Interleaved samples in one frame
    pub fn frame_len(&self) -> usize {
        self.samples_per_frame * self.channels as usize
    }

    /// Bytes in one frame
    pub fn frame_bytes(&self) -> usize {
        self.frame_len() * self.format.sample_width()
    }

    /// Wall-clock duration of one frame
    pub fn frame_duration(&self) -> std::time::Duration {
        frame_duration(self.samples_per_frame, self.sample_rate)
    }

    /// Same stream with a different sample encoding
    pub fn with_format(&self, format: SampleFormat) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Hz {}ch {} {} samples/frame",
            self.sample_rate, self.channels, self.format, self.samples_per_frame
        )
    }
}

/// Playback time of `samples` per-channel samples at `sample_rate`
pub(crate) fn frame_duration(samples: usize, sample_rate: u32) -> std::time::Duration {
    if sample_rate == 0 {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::from_secs_f64(samples as f64 / sample_rate as f64)
}
