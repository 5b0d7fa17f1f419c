//! Playback device abstraction
//!
//! A playback device owns a queue of registered buffers. The bridge uploads
//! samples into a buffer, queues it, and later dequeues it once the device
//! reports it as processed. All calls are non-blocking.

mod clocked;
mod mock;
#[cfg(feature = "playback")]
mod output;

pub use clocked::ClockedDevice;
pub use mock::{DeviceCall, MockDevice};
#[cfg(feature = "playback")]
pub use output::RodioDevice;

use crate::audio::StreamDescriptor;
use crate::error::Result;

/// Device-side handle for one playback buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback status reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Never started
    Initial,
    /// Consuming queued buffers
    Playing,
    /// Paused externally
    Paused,
    /// Ran out of queued audio
    Stopped,
}

/// Queued-buffer playback device
pub trait PlaybackDevice {
    /// Register `count` new buffers
    fn allocate_buffers(&mut self, count: usize) -> Result<Vec<BufferId>>;

    /// Upload interleaved samples into a buffer that is not currently queued
    fn upload(&mut self, buffer: BufferId, descriptor: &StreamDescriptor, samples: &[i16]) -> Result<()>;

    /// Append buffers to the playback queue, in order
    fn queue_buffers(&mut self, buffers: &[BufferId]) -> Result<()>;

    /// Number of queued buffers that have finished playing
    fn processed_count(&mut self) -> Result<usize>;

    /// Remove the oldest processed buffer from the queue
    fn dequeue_processed(&mut self) -> Result<Option<BufferId>>;

    /// Start (or restart) playback
    fn play(&mut self) -> Result<()>;

    /// Current playback status
    fn status(&mut self) -> Result<PlaybackStatus>;

    /// Release buffers at session teardown
    fn release_buffers(&mut self, buffers: &[BufferId]) -> Result<()>;
}

impl<D: PlaybackDevice + ?Sized> PlaybackDevice for Box<D> {
    fn allocate_buffers(&mut self, count: usize) -> Result<Vec<BufferId>> {
        (**self).allocate_buffers(count)
    }

    fn upload(&mut self, buffer: BufferId, descriptor: &StreamDescriptor, samples: &[i16]) -> Result<()> {
        (**self).upload(buffer, descriptor, samples)
    }

    fn queue_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        (**self).queue_buffers(buffers)
    }

    fn processed_count(&mut self) -> Result<usize> {
        (**self).processed_count()
    }

    fn dequeue_processed(&mut self) -> Result<Option<BufferId>> {
        (**self).dequeue_processed()
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn status(&mut self) -> Result<PlaybackStatus> {
        (**self).status()
    }

    fn release_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        (**self).release_buffers(buffers)
    }
}
