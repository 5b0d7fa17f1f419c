//! Driver - the callback sink wiring an emulation core to the audio bridge
//!
//! Audio goes to the [`AudioBridge`]. Display updates are rendered to text and
//! forwarded to an optional observer over a bounded channel; when the
//! observer falls behind, updates are dropped rather than stalling the core.

use crate::audio::convert::f32_slice_into_i16;
use crate::audio::{AudioBridge, PlaybackDevice, SampleFormat, StreamDescriptor};
use crate::core::{AudioPayload, CoreCallbacks, MechInfo};
use crate::display::{self, DisplayFrame, DisplayLayout, HardwareGeneration};
use crate::error::Result;
use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, trace, warn};

/// One rendered display update
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayUpdate {
    pub index: usize,
    pub lines: Vec<String>,
}

/// Callback sink for an emulation core
pub struct Driver<D: PlaybackDevice> {
    bridge: AudioBridge<D>,
    generation: HardwareGeneration,
    layouts: Vec<Option<DisplayLayout>>,
    updates: Option<Sender<DisplayUpdate>>,
    dropped_updates: u64,
    source_format: Option<SampleFormat>,
    converted: Vec<i16>,
    running: bool,
}

impl<D: PlaybackDevice> Driver<D> {
    pub fn new(bridge: AudioBridge<D>, generation: HardwareGeneration) -> Self {
        Self {
            bridge,
            generation,
            layouts: Vec::new(),
            updates: None,
            dropped_updates: 0,
            source_format: None,
            converted: Vec::new(),
            running: false,
        }
    }

    /// Forward rendered display updates to `sender`
    pub fn with_display_sink(mut self, sender: Sender<DisplayUpdate>) -> Self {
        self.updates = Some(sender);
        self
    }

    pub fn bridge(&self) -> &AudioBridge<D> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut AudioBridge<D> {
        &mut self.bridge
    }

    /// Layouts announced so far, by display index
    pub fn layouts(&self) -> &[Option<DisplayLayout>] {
        &self.layouts
    }

    /// Encoding the core delivers, once audio is negotiated
    pub fn source_format(&self) -> Option<SampleFormat> {
        self.source_format
    }

    /// Display updates dropped because the observer was full
    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates
    }

    /// Whether the core last reported itself running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Tear down the audio session and hand back the device
    pub fn shutdown(self) -> Result<D> {
        self.bridge.teardown()
    }

    fn publish(&mut self, update: DisplayUpdate) {
        let Some(sender) = &self.updates else {
            return;
        };

        match sender.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                self.dropped_updates += 1;
                trace!("Display observer full, dropped update for display {}", update.index);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Display observer disconnected");
                self.updates = None;
            }
        }
    }
}

impl<D: PlaybackDevice> CoreCallbacks for Driver<D> {
    fn on_state_updated(&mut self, running: bool) {
        self.running = running;
        if running {
            info!("Machine running");
        } else {
            warn!("Machine stopped");
        }
    }

    fn on_display_available(&mut self, index: usize, count: usize, layout: &DisplayLayout) {
        info!("Display {} of {} available: {}", index, count, layout);

        if self.layouts.len() < count.max(index + 1) {
            self.layouts.resize(count.max(index + 1), None);
        }
        self.layouts[index] = Some(layout.clone());
    }

    fn on_display_updated(&mut self, index: usize, frame: DisplayFrame<'_>, layout: &DisplayLayout) {
        trace!("Display {} updated: {}", index, layout);

        if self.updates.is_none() {
            return;
        }
        let lines = display::render(frame, layout, self.generation);
        self.publish(DisplayUpdate { index, lines });
    }

    fn on_audio_available(&mut self, descriptor: &StreamDescriptor) -> Result<usize> {
        info!(
            "Audio available: {} ({:.2} fps, core buffer {})",
            descriptor, descriptor.frames_per_second, descriptor.buffer_size
        );

        self.source_format = Some(descriptor.format);
        self.bridge
            .on_stream_negotiated(descriptor.with_format(SampleFormat::Int16))
    }

    fn on_audio_updated(&mut self, payload: AudioPayload<'_>) -> Result<usize> {
        match payload {
            AudioPayload::Int16(samples) => self.bridge.on_frame_ready(samples),
            AudioPayload::Float32(samples) => {
                f32_slice_into_i16(samples, &mut self.converted);
                self.bridge.on_frame_ready(&self.converted)
            }
        }
    }

    fn on_solenoid_updated(&mut self, solenoid: u32, active: bool) {
        debug!("Solenoid {} {}", solenoid, if active { "on" } else { "off" });
    }

    fn on_mech_available(&mut self, mech: usize, info: &MechInfo) {
        info!("Mech {} available: {}", mech, info);
    }

    fn on_mech_updated(&mut self, mech: usize, info: &MechInfo) {
        trace!("Mech {} updated: {}", mech, info);
    }

    fn on_console_data(&mut self, data: &[u8]) {
        debug!("Console data: {} bytes", data.len());
    }
}
