//! Audio bridge - feeds emulator PCM frames into a fixed ring of device buffers
//!
//! The emulation core produces one frame per update callback on its own
//! cadence; the device drains buffers at the playback rate. Frames wait in a
//! bounded [`FramePool`] until a device buffer is handed back as processed.

use crate::audio::device::{BufferId, PlaybackDevice, PlaybackStatus};
use crate::audio::frame_pool::{alloc_zeroed, FramePool};
use crate::audio::{SampleFormat, StreamDescriptor, DEFAULT_BUFFER_COUNT, DEFAULT_QUEUE_LIMIT};
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What a recycled buffer plays when no frame is waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnderflowFill {
    /// Zero the buffer before re-queuing it
    #[default]
    Silence,
    /// Re-queue the buffer with its previous contents
    Repeat,
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Number of device playback buffers
    pub buffer_count: usize,
    /// Maximum frames waiting for a playback buffer
    pub queue_limit: usize,
    /// Underflow behavior during recycling
    pub underflow_fill: UnderflowFill,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_count: DEFAULT_BUFFER_COUNT,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            underflow_fill: UnderflowFill::default(),
        }
    }
}

impl BridgeConfig {
    /// Check the configuration can size a session
    pub fn validate(&self) -> Result<()> {
        if self.buffer_count == 0 {
            return Err(BridgeError::InvalidConfig(
                "buffer_count must be at least 1".to_string(),
            ));
        }
        if self.queue_limit == 0 {
            return Err(BridgeError::InvalidConfig(
                "queue_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bridge state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No stream negotiated
    Uninitialized,
    /// Stream accepted, buffers not yet started
    Negotiated,
    /// Device is playing
    Playing,
    /// Device starved; restart pending
    Underrun,
}

/// Counters for monitoring buffer health
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Frames accepted from the core
    pub frames_received: u64,
    /// Frames copied into a device buffer
    pub frames_played: u64,
    /// Frames discarded by overflow flushes
    pub frames_dropped: u64,
    /// Number of overflow flushes
    pub overflow_flushes: u64,
    /// Processed buffers handed back to the device
    pub buffers_recycled: u64,
    /// Buffers re-queued with no fresh frame
    pub stale_requeues: u64,
    /// Playback restarts after starvation
    pub underruns: u64,
}

/// Stats shared between the bridge and observers on other threads
pub type SharedStats = Arc<Mutex<BridgeStats>>;

/// One device buffer and the bridge-side copy of its payload
struct PlaybackBuffer {
    id: BufferId,
    samples: Box<[i16]>,
}

/// Everything sized from the negotiated stream
struct Session {
    descriptor: StreamDescriptor,
    buffers: Vec<PlaybackBuffer>,
    pending: FramePool,
}

/// Bridge between emulator frame callbacks and a playback device
pub struct AudioBridge<D: PlaybackDevice> {
    device: D,
    config: BridgeConfig,
    state: BridgeState,
    session: Option<Session>,
    stats: SharedStats,
}

impl<D: PlaybackDevice> AudioBridge<D> {
    /// Create a bridge over `device`
    pub fn new(device: D, config: BridgeConfig) -> Result<Self> {
        Self::with_shared_stats(device, config, SharedStats::default())
    }

    /// Create a bridge that publishes into an existing stats handle
    pub fn with_shared_stats(device: D, config: BridgeConfig, stats: SharedStats) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            device,
            config,
            state: BridgeState::Uninitialized,
            session: None,
            stats,
        })
    }

    /// Get current bridge state
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Get the negotiated stream (available after negotiation)
    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.session.as_ref().map(|s| &s.descriptor)
    }

    /// Get the configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Frames waiting for a device buffer
    pub fn pending_frames(&self) -> usize {
        self.session.as_ref().map(|s| s.pending.len()).unwrap_or(0)
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> BridgeStats {
        self.stats.lock().clone()
    }

    /// Handle for observing counters from another thread
    pub fn stats_handle(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Get the playback device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Get the playback device mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Accept the stream, prime every buffer with silence and start playback
    ///
    /// Returns the per-channel samples the core should deliver per update.
    pub fn on_stream_negotiated(&mut self, descriptor: StreamDescriptor) -> Result<usize> {
        if self.state != BridgeState::Uninitialized {
            return Err(BridgeError::AlreadyNegotiated);
        }
        validate_descriptor(&descriptor)?;

        info!("Negotiating audio stream: {}", descriptor);

        let frame_len = descriptor.frame_len();
        let samples_per_frame = descriptor.samples_per_frame;
        let pending = FramePool::new(self.config.queue_limit, frame_len)?;

        let ids = self.device.allocate_buffers(self.config.buffer_count)?;
        let buffers = match self.start_buffers(&descriptor, &ids) {
            Ok(buffers) => buffers,
            Err(e) => {
                self.state = BridgeState::Uninitialized;
                if let Err(release) = self.device.release_buffers(&ids) {
                    warn!("Failed to release buffers after negotiation error: {}", release);
                }
                return Err(e);
            }
        };

        debug!(
            "Primed {} playback buffers of {} bytes, queue limit {}",
            buffers.len(),
            descriptor.frame_bytes(),
            self.config.queue_limit
        );

        self.session = Some(Session {
            descriptor,
            buffers,
            pending,
        });
        self.state = BridgeState::Playing;

        Ok(samples_per_frame)
    }

    /// Upload silence into fresh buffers, queue them as one batch and play
    fn start_buffers(&mut self, descriptor: &StreamDescriptor, ids: &[BufferId]) -> Result<Vec<PlaybackBuffer>> {
        if ids.len() != self.config.buffer_count {
            return Err(BridgeError::device_error(format!(
                "requested {} buffers, device allocated {}",
                self.config.buffer_count,
                ids.len()
            )));
        }

        let mut buffers = Vec::with_capacity(ids.len());
        for &id in ids {
            let samples = alloc_zeroed(descriptor.frame_len())?;
            self.device.upload(id, descriptor, &samples)?;
            buffers.push(PlaybackBuffer { id, samples });
        }
        self.state = BridgeState::Negotiated;

        self.device.queue_buffers(ids)?;
        self.device.play()?;
        Ok(buffers)
    }

    /// Take one frame from the core and recycle whatever the device finished
    ///
    /// `payload` holds interleaved samples for all channels. Returns the
    /// per-channel sample count accepted, which is always the whole payload.
    pub fn on_frame_ready(&mut self, payload: &[i16]) -> Result<usize> {
        let session = self.session.as_mut().ok_or(BridgeError::NotNegotiated)?;

        let channels = session.descriptor.channels;
        let capacity = session.descriptor.frame_len();
        if payload.len() > capacity || payload.len() % channels as usize != 0 {
            return Err(BridgeError::FrameSize {
                len: payload.len(),
                capacity,
                channels,
            });
        }
        let accepted = payload.len() / channels as usize;

        let outcome = session.pending.push(payload)?;
        {
            let mut stats = self.stats.lock();
            stats.frames_received += 1;
            if outcome.flushed > 0 {
                stats.overflow_flushes += 1;
                stats.frames_dropped += outcome.flushed as u64;
            }
        }
        if outcome.flushed > 0 {
            warn!(
                "Pending audio queue full, dropped {} frames",
                outcome.flushed
            );
        }

        let mut processed = self.device.processed_count()?;
        if processed == 0 {
            return Ok(accepted);
        }

        while processed > 0 {
            let id = match self.device.dequeue_processed()? {
                Some(id) => id,
                None => {
                    debug!("Device reported {} processed buffers but returned none", processed);
                    break;
                }
            };

            // A dequeued buffer goes back to the device even when refilling fails
            let refilled = refill(&mut self.device, session, self.config.underflow_fill, id);
            let requeued = self.device.queue_buffers(&[id]);
            let fresh = refilled?;
            requeued?;
            processed -= 1;

            let mut stats = self.stats.lock();
            stats.buffers_recycled += 1;
            if fresh {
                stats.frames_played += 1;
            } else {
                stats.stale_requeues += 1;
            }
            drop(stats);

            trace!("Recycled buffer {} (fresh: {})", id, fresh);
        }

        if self.device.status()? != PlaybackStatus::Playing {
            self.state = BridgeState::Underrun;
            warn!("Audio playback starved, restarting");
            self.stats.lock().underruns += 1;
            self.device.play()?;
        }
        self.state = BridgeState::Playing;

        Ok(accepted)
    }

    /// End the session, dropping pending frames and releasing device buffers
    ///
    /// Returns the device so it can be reused for a new session.
    pub fn teardown(mut self) -> Result<D> {
        if let Some(mut session) = self.session.take() {
            let dropped = session.pending.flush();
            let ids: Vec<BufferId> = session.buffers.iter().map(|b| b.id).collect();
            self.device.release_buffers(&ids)?;
            info!(
                "Audio session closed ({} pending frames dropped)",
                dropped
            );
        }
        Ok(self.device)
    }
}

/// Load the next pending frame into a dequeued buffer, or apply the fill policy
///
/// Returns whether a fresh frame was loaded.
fn refill<D: PlaybackDevice>(
    device: &mut D,
    session: &mut Session,
    fill: UnderflowFill,
    id: BufferId,
) -> Result<bool> {
    let buffer = session
        .buffers
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or(BridgeError::UnknownBuffer(id))?;

    let fresh = session.pending.pop_into(&mut buffer.samples).is_some();
    if fresh {
        device.upload(id, &session.descriptor, &buffer.samples)?;
    } else if fill == UnderflowFill::Silence {
        buffer.samples.fill(0);
        device.upload(id, &session.descriptor, &buffer.samples)?;
    }
    Ok(fresh)
}

fn validate_descriptor(descriptor: &StreamDescriptor) -> Result<()> {
    if descriptor.format != SampleFormat::Int16 {
        return Err(BridgeError::UnsupportedFormat(descriptor.format));
    }
    if descriptor.channels == 0 {
        return Err(BridgeError::InvalidDescriptor(
            "channel count must be at least 1".to_string(),
        ));
    }
    if descriptor.sample_rate == 0 {
        return Err(BridgeError::InvalidDescriptor(
            "sample rate must be positive".to_string(),
        ));
    }
    if descriptor.samples_per_frame == 0 {
        return Err(BridgeError::InvalidDescriptor(
            "samples per frame must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{DeviceCall, MockDevice};

    const LIMIT: usize = 10;

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor::new(SampleFormat::Int16, 2, 44100, 4)
    }

    fn frame(value: i16) -> Vec<i16> {
        vec![value; 8]
    }

    fn negotiated(config: BridgeConfig) -> AudioBridge<MockDevice> {
        let mut bridge = AudioBridge::new(MockDevice::new(), config).unwrap();
        assert_eq!(bridge.on_stream_negotiated(descriptor()).unwrap(), 4);
        bridge.device_mut().clear_calls();
        bridge
    }

    #[test]
    fn test_negotiation_primes_and_starts() {
        let mut bridge = AudioBridge::new(MockDevice::new(), BridgeConfig::default()).unwrap();
        assert_eq!(bridge.state(), BridgeState::Uninitialized);

        let spf = bridge.on_stream_negotiated(descriptor()).unwrap();
        assert_eq!(spf, 4);
        assert_eq!(bridge.state(), BridgeState::Playing);

        let device = bridge.device();
        assert_eq!(device.committed(), DEFAULT_BUFFER_COUNT);
        let calls = device.calls();
        assert_eq!(calls.first(), Some(&DeviceCall::Allocate(DEFAULT_BUFFER_COUNT)));
        assert_eq!(calls.last(), Some(&DeviceCall::Play));
        // One batch queue of every buffer
        let queues: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Queue(ids) => Some(ids.len()),
                _ => None,
            })
            .collect();
        assert_eq!(queues, vec![DEFAULT_BUFFER_COUNT]);
        for id in 1..=DEFAULT_BUFFER_COUNT as u32 {
            assert_eq!(device.contents(BufferId(id)), Some(&[0i16; 8][..]));
        }
    }

    #[test]
    fn test_renegotiation_rejected() {
        let mut bridge = negotiated(BridgeConfig::default());
        let err = bridge.on_stream_negotiated(descriptor()).unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyNegotiated));
        assert!(err.is_contract_violation());
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
    }

    #[test]
    fn test_frame_before_negotiation_rejected() {
        let mut bridge = AudioBridge::new(MockDevice::new(), BridgeConfig::default()).unwrap();
        assert!(matches!(
            bridge.on_frame_ready(&frame(1)),
            Err(BridgeError::NotNegotiated)
        ));
    }

    #[test]
    fn test_float_descriptor_rejected() {
        let mut bridge = AudioBridge::new(MockDevice::new(), BridgeConfig::default()).unwrap();
        let desc = descriptor().with_format(SampleFormat::Float32);
        assert!(matches!(
            bridge.on_stream_negotiated(desc),
            Err(BridgeError::UnsupportedFormat(SampleFormat::Float32))
        ));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
    }

    #[test]
    fn test_bad_frame_sizes_rejected() {
        let mut bridge = negotiated(BridgeConfig::default());
        assert!(matches!(
            bridge.on_frame_ready(&[0; 9]),
            Err(BridgeError::FrameSize { len: 9, capacity: 8, channels: 2 })
        ));
        assert!(matches!(
            bridge.on_frame_ready(&[0; 3]),
            Err(BridgeError::FrameSize { .. })
        ));
        assert_eq!(bridge.pending_frames(), 0);
    }

    #[test]
    fn test_queue_grows_without_processed_buffers() {
        let mut bridge = negotiated(BridgeConfig::default());
        for i in 0..5 {
            assert_eq!(bridge.on_frame_ready(&frame(i)).unwrap(), 4);
            assert_eq!(bridge.pending_frames(), i as usize + 1);
        }
        // No processed buffers: nothing past the processed-count query
        assert!(!bridge
            .device()
            .calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::Dequeue | DeviceCall::Status | DeviceCall::Play)));
    }

    #[test]
    fn test_overflow_flushes_whole_queue() {
        let mut bridge = negotiated(BridgeConfig::default());
        for i in 0..LIMIT {
            bridge.on_frame_ready(&frame(i as i16)).unwrap();
        }
        assert_eq!(bridge.pending_frames(), LIMIT);

        bridge.on_frame_ready(&frame(99)).unwrap();
        assert_eq!(bridge.pending_frames(), 1);

        let stats = bridge.stats();
        assert_eq!(stats.overflow_flushes, 1);
        assert_eq!(stats.frames_dropped, LIMIT as u64);
        assert_eq!(stats.frames_received, LIMIT as u64 + 1);

        // The survivor is the newest frame
        bridge.device_mut().complete(1);
        bridge.on_frame_ready(&frame(100)).unwrap();
        let id = BufferId(1);
        assert_eq!(bridge.device().contents(id), Some(&frame(99)[..]));
    }

    #[test]
    fn test_recycle_drains_oldest_first() {
        let mut bridge = negotiated(BridgeConfig::default());
        bridge.on_frame_ready(&frame(1)).unwrap();
        bridge.on_frame_ready(&frame(2)).unwrap();

        bridge.device_mut().complete(2);
        bridge.on_frame_ready(&frame(3)).unwrap();

        // 3 queued, 2 drained
        assert_eq!(bridge.pending_frames(), 1);
        assert_eq!(bridge.device().contents(BufferId(1)), Some(&frame(1)[..]));
        assert_eq!(bridge.device().contents(BufferId(2)), Some(&frame(2)[..]));
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
        assert_eq!(bridge.stats().frames_played, 2);
    }

    #[test]
    fn test_committed_count_invariant() {
        let mut bridge = negotiated(BridgeConfig::default());
        for round in 0..30 {
            let before = bridge.device().committed();
            bridge.device_mut().complete(round % 5);
            bridge.on_frame_ready(&frame(round as i16)).unwrap();
            assert_eq!(bridge.device().committed(), before);
        }
    }

    #[test]
    fn test_empty_queue_requeues_silence() {
        let mut bridge = negotiated(BridgeConfig::default());
        bridge.device_mut().complete(2);
        bridge.on_frame_ready(&frame(5)).unwrap();
        assert_eq!(bridge.device().contents(BufferId(1)), Some(&frame(5)[..]));
        assert_eq!(bridge.stats().stale_requeues, 1);

        // Every buffer comes back with one frame waiting
        bridge.device_mut().complete(DEFAULT_BUFFER_COUNT);
        bridge.on_frame_ready(&frame(6)).unwrap();

        assert_eq!(bridge.device().contents(BufferId(3)), Some(&frame(6)[..]));
        assert_eq!(bridge.device().contents(BufferId(1)), Some(&[0i16; 8][..]));
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
        let stats = bridge.stats();
        assert_eq!(stats.frames_played, 2);
        assert_eq!(stats.stale_requeues, 4);
    }

    #[test]
    fn test_empty_queue_repeat_keeps_stale_audio() {
        let config = BridgeConfig {
            underflow_fill: UnderflowFill::Repeat,
            ..BridgeConfig::default()
        };
        let mut bridge = negotiated(config);
        bridge.device_mut().complete(2);
        bridge.on_frame_ready(&frame(5)).unwrap();

        bridge.device_mut().complete(DEFAULT_BUFFER_COUNT);
        bridge.device_mut().clear_calls();
        bridge.on_frame_ready(&frame(6)).unwrap();

        let uploads = bridge
            .device()
            .calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Upload(_)))
            .count();
        assert_eq!(uploads, 1);
        assert_eq!(bridge.device().contents(BufferId(3)), Some(&frame(6)[..]));
        assert_eq!(bridge.device().contents(BufferId(1)), Some(&frame(5)[..]));
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
    }

    #[test]
    fn test_starved_device_is_restarted() {
        let mut bridge = negotiated(BridgeConfig::default());
        // Drain everything: device stops
        bridge.device_mut().complete(DEFAULT_BUFFER_COUNT);
        bridge.on_frame_ready(&frame(1)).unwrap();

        let calls = bridge.device().calls();
        let status_at = calls
            .iter()
            .position(|c| *c == DeviceCall::Status)
            .unwrap();
        assert_eq!(calls.get(status_at + 1), Some(&DeviceCall::Play));
        assert_eq!(calls.len(), status_at + 2);
        assert_eq!(bridge.stats().underruns, 1);
        assert_eq!(bridge.state(), BridgeState::Playing);
    }

    #[test]
    fn test_playing_device_not_restarted() {
        let mut bridge = negotiated(BridgeConfig::default());
        bridge.device_mut().complete(1);
        bridge.on_frame_ready(&frame(1)).unwrap();

        assert_eq!(bridge.device().calls().last(), Some(&DeviceCall::Status));
        assert_eq!(bridge.stats().underruns, 0);
    }

    #[test]
    fn test_device_error_propagates() {
        let mut bridge = negotiated(BridgeConfig::default());
        bridge.device_mut().fail_next("unplugged");
        let err = bridge.on_frame_ready(&frame(1)).unwrap_err();
        assert!(matches!(err, BridgeError::Device(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_failed_upload_requeues_buffer() {
        let mut bridge = negotiated(BridgeConfig::default());
        bridge
            .device_mut()
            .fail_on(|call| matches!(call, DeviceCall::Upload(_)), "glitch");

        bridge.device_mut().complete(1);
        let err = bridge.on_frame_ready(&frame(1)).unwrap_err();
        assert!(matches!(err, BridgeError::Device(_)));
        assert!(err.is_recoverable());
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);

        // The ring keeps its size and the next frame plays normally
        bridge.device_mut().complete(1);
        bridge.on_frame_ready(&frame(2)).unwrap();
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
        assert_eq!(bridge.device().contents(BufferId(2)), Some(&frame(2)[..]));
        assert_eq!(bridge.stats().frames_played, 1);
    }

    #[test]
    fn test_failed_priming_releases_buffers() {
        let mut bridge = AudioBridge::new(MockDevice::new(), BridgeConfig::default()).unwrap();
        bridge
            .device_mut()
            .fail_on(|call| matches!(call, DeviceCall::Upload(_)), "glitch");

        assert!(bridge.on_stream_negotiated(descriptor()).is_err());
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert!(bridge.descriptor().is_none());
        assert!(matches!(
            bridge.device().calls().last(),
            Some(DeviceCall::Release(ids)) if ids.len() == DEFAULT_BUFFER_COUNT
        ));

        // A retry gets a working session
        assert_eq!(bridge.on_stream_negotiated(descriptor()).unwrap(), 4);
        assert_eq!(bridge.state(), BridgeState::Playing);
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
    }

    #[test]
    fn test_failed_start_allows_renegotiation() {
        let mut bridge = AudioBridge::new(MockDevice::new(), BridgeConfig::default()).unwrap();
        bridge
            .device_mut()
            .fail_on(|call| matches!(call, DeviceCall::Play), "no output");

        assert!(bridge.on_stream_negotiated(descriptor()).is_err());
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert_eq!(bridge.device().committed(), 0);
        assert!(matches!(
            bridge.on_frame_ready(&frame(1)),
            Err(BridgeError::NotNegotiated)
        ));

        bridge.on_stream_negotiated(descriptor()).unwrap();
        assert_eq!(bridge.device().committed(), DEFAULT_BUFFER_COUNT);
        assert_eq!(bridge.device().calls().last(), Some(&DeviceCall::Play));
    }

    #[test]
    fn test_teardown_releases_buffers() {
        let mut bridge = negotiated(BridgeConfig::default());
        bridge.on_frame_ready(&frame(1)).unwrap();
        let device = bridge.teardown().unwrap();
        assert_eq!(device.committed(), 0);
        assert!(matches!(device.calls().last(), Some(DeviceCall::Release(ids)) if ids.len() == DEFAULT_BUFFER_COUNT));
    }

    #[test]
    fn test_zero_buffer_config_rejected() {
        let config = BridgeConfig {
            buffer_count: 0,
            ..BridgeConfig::default()
        };
        assert!(AudioBridge::new(MockDevice::new(), config).is_err());
    }
}
