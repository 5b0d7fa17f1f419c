//! Wall-clock simulated playback device

use super::{BufferId, PlaybackDevice, PlaybackStatus};
use crate::audio::{frame_duration, StreamDescriptor};
use crate::error::{BridgeError, Result};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Playback device that consumes queued buffers at the stream's real-time rate
///
/// Produces no sound. Each buffer plays for the duration implied by its
/// uploaded sample count; when the queue runs dry the device stops, the same
/// way a hardware source does on starvation.
pub struct ClockedDevice {
    next_id: u32,
    durations: HashMap<BufferId, Duration>,
    pending: VecDeque<BufferId>,
    processed: VecDeque<BufferId>,
    status: PlaybackStatus,
    /// When the head of `pending` started playing
    head_started: Option<Instant>,
}

impl ClockedDevice {
    /// Create an idle device
    pub fn new() -> Self {
        Self {
            next_id: 0,
            durations: HashMap::new(),
            pending: VecDeque::new(),
            processed: VecDeque::new(),
            status: PlaybackStatus::Initial,
            head_started: None,
        }
    }

    /// Advance playback to `now`
    pub fn advance_to(&mut self, now: Instant) {
        if self.status != PlaybackStatus::Playing {
            return;
        }

        while let Some(&head) = self.pending.front() {
            let started = *self.head_started.get_or_insert(now);
            let duration = self.durations.get(&head).copied().unwrap_or_default();
            let finished = started + duration;
            if finished > now {
                break;
            }

            self.pending.pop_front();
            self.processed.push_back(head);
            // Next buffer starts exactly where this one ended
            self.head_started = Some(finished);
            trace!("Clocked device finished buffer {}", head);
        }

        if self.pending.is_empty() {
            debug!("Clocked device starved, stopping");
            self.status = PlaybackStatus::Stopped;
            self.head_started = None;
        }
    }

    /// Play from `now`
    pub fn play_at(&mut self, now: Instant) {
        if self.status != PlaybackStatus::Playing {
            self.status = PlaybackStatus::Playing;
            self.head_started = Some(now);
        }
    }

    fn is_queued(&self, id: BufferId) -> bool {
        self.pending.contains(&id) || self.processed.contains(&id)
    }
}

impl Default for ClockedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackDevice for ClockedDevice {
    fn allocate_buffers(&mut self, count: usize) -> Result<Vec<BufferId>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            self.next_id += 1;
            let id = BufferId(self.next_id);
            self.durations.insert(id, Duration::ZERO);
            ids.push(id);
        }
        Ok(ids)
    }

    fn upload(&mut self, buffer: BufferId, descriptor: &StreamDescriptor, samples: &[i16]) -> Result<()> {
        if self.is_queued(buffer) {
            return Err(BridgeError::device_error(format!(
                "upload into queued buffer {}",
                buffer
            )));
        }
        let channels = descriptor.channels.max(1) as usize;
        match self.durations.get_mut(&buffer) {
            Some(duration) => {
                *duration = frame_duration(samples.len() / channels, descriptor.sample_rate);
                Ok(())
            }
            None => Err(BridgeError::UnknownBuffer(buffer)),
        }
    }

    fn queue_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        for id in buffers {
            if !self.durations.contains_key(id) {
                return Err(BridgeError::UnknownBuffer(*id));
            }
            self.pending.push_back(*id);
        }
        Ok(())
    }

    fn processed_count(&mut self) -> Result<usize> {
        self.advance_to(Instant::now());
        Ok(self.processed.len())
    }

    fn dequeue_processed(&mut self) -> Result<Option<BufferId>> {
        Ok(self.processed.pop_front())
    }

    fn play(&mut self) -> Result<()> {
        self.play_at(Instant::now());
        Ok(())
    }

    fn status(&mut self) -> Result<PlaybackStatus> {
        self.advance_to(Instant::now());
        Ok(self.status)
    }

    fn release_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        for id in buffers {
            self.durations.remove(id);
            self.pending.retain(|queued| queued != id);
            self.processed.retain(|queued| queued != id);
        }
        if self.pending.is_empty() {
            self.status = PlaybackStatus::Stopped;
            self.head_started = None;
        }
        Ok(())
    }
}
