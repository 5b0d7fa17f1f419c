//! Audio device integration using rodio
//!
//! Each queued buffer is appended to a rodio sink as its own sample source.
//! The sink drops sources as they finish, so the number of processed
//! buffers is the number this device queued minus what the sink still holds.

use super::{BufferId, PlaybackDevice, PlaybackStatus};
use crate::audio::StreamDescriptor;
use crate::error::{BridgeError, Result};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

struct BufferData {
    channels: u16,
    sample_rate: u32,
    samples: Vec<i16>,
}

/// Playback device on the system default output
///
/// Not `Send`: the rodio output stream must stay on the thread that opened it.
pub struct RodioDevice {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
    next_id: u32,
    buffers: HashMap<BufferId, BufferData>,
    /// Buffers appended to the sink, oldest first
    committed: VecDeque<BufferId>,
    started: bool,
}

impl RodioDevice {
    /// Open the default output device, paused
    pub fn open_default() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| BridgeError::device_error(format!("Failed to create audio stream: {}", e)))?;

        let sink = Sink::try_new(&handle)
            .map_err(|e| BridgeError::device_error(format!("Failed to create audio sink: {}", e)))?;
        sink.pause();

        info!("Opened default audio output");

        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
            next_id: 0,
            buffers: HashMap::new(),
            committed: VecDeque::new(),
            started: false,
        })
    }

    fn processed(&self) -> usize {
        self.committed.len().saturating_sub(self.sink.len())
    }
}

impl PlaybackDevice for RodioDevice {
    fn allocate_buffers(&mut self, count: usize) -> Result<Vec<BufferId>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            self.next_id += 1;
            let id = BufferId(self.next_id);
            self.buffers.insert(
                id,
                BufferData {
                    channels: 1,
                    sample_rate: 44100,
                    samples: Vec::new(),
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    fn upload(&mut self, buffer: BufferId, descriptor: &StreamDescriptor, samples: &[i16]) -> Result<()> {
        let data = self
            .buffers
            .get_mut(&buffer)
            .ok_or(BridgeError::UnknownBuffer(buffer))?;
        data.channels = descriptor.channels;
        data.sample_rate = descriptor.sample_rate;
        data.samples.clear();
        data.samples.extend_from_slice(samples);
        Ok(())
    }

    fn queue_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        for id in buffers {
            let data = self.buffers.get(id).ok_or(BridgeError::UnknownBuffer(*id))?;
            self.sink.append(SamplesBuffer::new(
                data.channels,
                data.sample_rate,
                data.samples.clone(),
            ));
            self.committed.push_back(*id);
        }
        Ok(())
    }

    fn processed_count(&mut self) -> Result<usize> {
        Ok(self.processed())
    }

    fn dequeue_processed(&mut self) -> Result<Option<BufferId>> {
        if self.processed() == 0 {
            return Ok(None);
        }
        Ok(self.committed.pop_front())
    }

    fn play(&mut self) -> Result<()> {
        if !self.started {
            debug!("Starting rodio sink");
        }
        self.started = true;
        self.sink.play();
        Ok(())
    }

    fn status(&mut self) -> Result<PlaybackStatus> {
        let status = if !self.started {
            PlaybackStatus::Initial
        } else if self.sink.is_paused() {
            PlaybackStatus::Paused
        } else if self.sink.empty() {
            PlaybackStatus::Stopped
        } else {
            PlaybackStatus::Playing
        };
        Ok(status)
    }

    fn release_buffers(&mut self, buffers: &[BufferId]) -> Result<()> {
        for id in buffers {
            self.buffers.remove(id);
        }
        self.committed.retain(|id| self.buffers.contains_key(id));
        if self.committed.is_empty() {
            self.sink.stop();
        }
        Ok(())
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        self.sink.stop();
    }
}
