//! Scripted playback device for testing without hardware.

use super::{BufferId, PlaybackDevice, PlaybackStatus};
use crate::audio::StreamDescriptor;
use crate::error::{BridgeError, Result};
use std::collections::{HashMap, VecDeque};

/// A device call, as recorded by [`MockDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Allocate(usize),
    Upload(BufferId),
    Queue(Vec<BufferId>),
    ProcessedCount,
    Dequeue,
    Play,
    Status,
    Release(Vec<BufferId>),
}

/// A playback device whose progress is driven by the test.
///
/// Nothing plays on its own: [`MockDevice::complete`] marks queued buffers
/// as processed, and [`MockDevice::set_status`] forces the reported status.
/// Every trait call is appended to a call log.
///
/// # Example
///
/// ```
/// use pinbridge::audio::device::{MockDevice, PlaybackDevice, PlaybackStatus};
///
/// let mut device = MockDevice::new();
/// let ids = device.allocate_buffers(2).unwrap();
/// device.queue_buffers(&ids).unwrap();
/// device.play().unwrap();
///
/// device.complete(1);
/// assert_eq!(device.processed_count().unwrap(), 1);
/// assert_eq!(device.status().unwrap(), PlaybackStatus::Playing);
/// ```
#[derive(Debug, Default)]
pub struct MockDevice {
    next_id: u32,
    contents: HashMap<BufferId, Vec<i16>>,
    /// Queued and not yet played
    pending: VecDeque<BufferId>,
    /// Played, still queued until dequeued
    processed: VecDeque<BufferId>,
    status: Option<PlaybackStatus>,
    calls: Vec<DeviceCall>,
    fail_next: Option<String>,
    fail_on: Option<FailOn>,
}

/// One-shot failure armed for a kind of call
struct FailOn {
    matches: fn(&DeviceCall) -> bool,
    message: String,
}

impl std::fmt::Debug for FailOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailOn")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl MockDevice {
    /// Create an idle device with no buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark up to `count` of the oldest queued buffers as processed
    pub fn complete(&mut self, count: usize) -> usize {
        let mut moved = 0;
        while moved < count {
            match self.pending.pop_front() {
                Some(id) => {
                    self.processed.push_back(id);
                    moved += 1;
                }
                None => break,
            }
        }
        if self.pending.is_empty() && self.status == Some(PlaybackStatus::Playing) {
            self.status = Some(PlaybackStatus::Stopped);
        }
        moved
    }

    /// Force the status reported by the next status query
    pub fn set_status(&mut self, status: PlaybackStatus) {
        self.status = Some(status);
    }

    /// Make the next trait call fail with a device error
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    /// Make the next call accepted by `matches` fail with a device error
    ///
    /// ```
    /// use pinbridge::audio::device::{DeviceCall, MockDevice, PlaybackDevice};
    ///
    /// let mut device = MockDevice::new();
    /// device.fail_on(|call| matches!(call, DeviceCall::Play), "no output");
    /// let ids = device.allocate_buffers(1).unwrap();
    /// device.queue_buffers(&ids).unwrap();
    /// assert!(device.play().is_err());
    /// assert!(device.play().is_ok());
    /// ```
    pub fn fail_on(&mut self, matches: fn(&DeviceCall) -> bool, message: impl Into<String>) {
        self.fail_on = Some(FailOn {
            matches,
            message: message.into(),
        });
    }

    /// Buffers currently owned by the device queue (pending + processed)
    pub fn committed(&self) -> usize {
        self.pending.len() + self.processed.len()
    }

    /// Buffers queued and not yet played
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Last uploaded samples of a buffer
    pub fn contents(&self, id: BufferId) -> Option<&[i16]> {
        self.contents.get(&id).map(Vec::as_slice)
    }

    /// Recorded trait calls, oldest first
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn record(&mut self, call: DeviceCall) -> Result<()> {
        let matched = match self.fail_on.take() {
            Some(fail) if (fail.matches)(&call) => Some(fail.message),
            other => {
                self.fail_on = other;
                None
            }
        };
        self.calls.push(call);
        match self.fail_next.take().or(matched) {
            Some(message) => Err(BridgeError::device_error(message)),
            None => Ok(()),
        }
    }

    fn is_queued(&self, id: BufferId) -> bool {
        self.pending.contains(&id) || self.processed.contains(&id)
    }
}

impl PlaybackDevice for MockDevice {
    fn allocate_buffers(&mut self, count: usize) -> Result<Vec<BufferId>> {
        self.record(DeviceCall::Allocate(count))?;
        let ids: Vec<BufferId> = (0..count)
            .map(|_| {
                self.next_id += 1;
                BufferId(self.next_id)
            })
            .collect();
        for id in &ids {
            self.contents.insert(*id, Vec::new());
        }
        Ok(ids)
    }

    fn upload(&mut self, buffer: BufferId, _descriptor: &StreamDescriptor, samples: &[i16]) -> Result<()> {
        self.record(DeviceCall::Upload(buffer))?;
        if self.is_queued(buffer) {
            return Err(BridgeError::device_error(format!(
                "upload into queued buffer {}",
                buffer
            )));
        }
        match self.contents.get_mut(&buffer) {
            Some(contents) => {
                contents.clear();
                contents.extend_from_slice(samples);
                Ok(())
            }
            None => Err(BridgeError::UnknownBuffer(buffer)),
        }
    }

    fn queue_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        self.record(DeviceCall::Queue(buffers.to_vec()))?;
        for id in buffers {
            if !self.contents.contains_key(id) {
                return Err(BridgeError::UnknownBuffer(*id));
            }
            self.pending.push_back(*id);
        }
        Ok(())
    }

    fn processed_count(&mut self) -> Result<usize> {
        self.record(DeviceCall::ProcessedCount)?;
        Ok(self.processed.len())
    }

    fn dequeue_processed(&mut self) -> Result<Option<BufferId>> {
        self.record(DeviceCall::Dequeue)?;
        Ok(self.processed.pop_front())
    }

    fn play(&mut self) -> Result<()> {
        self.record(DeviceCall::Play)?;
        self.status = Some(PlaybackStatus::Playing);
        Ok(())
    }

    fn status(&mut self) -> Result<PlaybackStatus> {
        self.record(DeviceCall::Status)?;
        Ok(self.status.unwrap_or(PlaybackStatus::Initial))
    }

    fn release_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        self.record(DeviceCall::Release(buffers.to_vec()))?;
        for id in buffers {
            self.contents.remove(id);
            self.pending.retain(|queued| queued != id);
            self.processed.retain(|queued| queued != id);
        }
        Ok(())
    }
}
