//! Deterministic stand-in for an emulation core
//!
//! Announces a dot-matrix and an alphanumeric display, negotiates audio and
//! then emits a sine tone, a moving bar, a segment walk, solenoid pulses and
//! a mechanism position on a fixed frame cadence.

use super::{AudioPayload, CoreCallbacks, EmulationCore, MechConfig, MechInfo};
use crate::audio::{SampleFormat, StreamDescriptor};
use crate::display::{DisplayFrame, DisplayLayout, SegmentTemplate};
use crate::error::{BridgeError, Result};
use crate::sync::{FramePacer, Pace};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

const DMD_WIDTH: usize = 128;
const DMD_HEIGHT: usize = 32;
const DMD_BACKGROUND: u8 = 0x14;
const DMD_BAR: u8 = 0x64;
const DMD_BAR_WIDTH: usize = 4;
const ALPHA_CELLS: usize = 16;

/// Frames between display refreshes
const DISPLAY_EVERY: u64 = 6;

/// Frames between solenoid toggles
const SOLENOID_EVERY: u64 = 30;

/// Periodic stall followed by back-to-back catch-up frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    /// Frames between stalls
    pub every: u64,
    /// Length of each stall, in frame periods
    pub stall_frames: u32,
}

/// Synthetic core settings
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
    /// Audio updates per second
    pub fps: f64,
    /// Tone frequency in Hz
    pub tone_hz: f32,
    /// Tone amplitude in [0, 1]
    pub amplitude: f32,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Sleep to hold the frame cadence; off runs flat out
    pub paced: bool,
    pub burst: Option<Burst>,
    /// Mechanism announced once the machine is running
    pub mech: Option<MechConfig>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            format: SampleFormat::Int16,
            sample_rate: 44100,
            channels: 2,
            fps: 60.0,
            tone_hz: 440.0,
            amplitude: 0.25,
            max_frames: None,
            paced: true,
            burst: None,
            mech: Some(MechConfig::default()),
        }
    }
}

impl SyntheticConfig {
    /// Per-channel samples in one update
    pub fn samples_per_frame(&self) -> usize {
        if self.fps <= 0.0 {
            return 0;
        }
        (self.sample_rate as f64 / self.fps).round() as usize
    }

    /// Stream the core offers at negotiation
    pub fn descriptor(&self) -> StreamDescriptor {
        let mut descriptor = StreamDescriptor::new(
            self.format,
            self.channels,
            self.sample_rate,
            self.samples_per_frame(),
        );
        descriptor.frames_per_second = self.fps;
        descriptor
    }

    /// Display surfaces the core announces, in index order
    pub fn layouts() -> Vec<DisplayLayout> {
        vec![
            DisplayLayout::dmd(DMD_WIDTH, DMD_HEIGHT, 2),
            DisplayLayout::alphanumeric(ALPHA_CELLS, SegmentTemplate::Comma).at(DMD_HEIGHT as u32 + 2, 0),
        ]
    }
}

/// Synthetic emulation core
pub struct SyntheticCore {
    config: SyntheticConfig,
    phase: f32,
    frames: u64,
    pcm_i16: Vec<i16>,
    pcm_f32: Vec<f32>,
    dmd: Vec<u8>,
    cells: [u16; ALPHA_CELLS],
    mech: Option<MechInfo>,
}

impl SyntheticCore {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            phase: 0.0,
            frames: 0,
            pcm_i16: Vec::new(),
            pcm_f32: Vec::new(),
            dmd: vec![DMD_BACKGROUND; DMD_WIDTH * DMD_HEIGHT],
            cells: [0; ALPHA_CELLS],
            mech: None,
        }
    }

    /// Audio frames emitted so far
    pub fn frames_emitted(&self) -> u64 {
        self.frames
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Fill one frame of interleaved tone samples
    fn synthesize(&mut self, samples_per_frame: usize) {
        let channels = self.config.channels as usize;
        let step = TAU * self.config.tone_hz / self.config.sample_rate as f32;

        self.pcm_f32.clear();
        for _ in 0..samples_per_frame {
            let value = self.phase.sin() * self.config.amplitude;
            self.pcm_f32.extend(std::iter::repeat(value).take(channels));
            self.phase = (self.phase + step) % TAU;
        }

        if self.config.format == SampleFormat::Int16 {
            crate::audio::convert::f32_slice_into_i16(&self.pcm_f32, &mut self.pcm_i16);
        }
    }

    fn emit_audio(&mut self, callbacks: &mut dyn CoreCallbacks, samples_per_frame: usize) -> Result<()> {
        self.synthesize(samples_per_frame);
        let payload = match self.config.format {
            SampleFormat::Int16 => AudioPayload::Int16(&self.pcm_i16),
            SampleFormat::Float32 => AudioPayload::Float32(&self.pcm_f32),
        };
        callbacks.on_audio_updated(payload)?;
        Ok(())
    }

    fn emit_displays(&mut self, callbacks: &mut dyn CoreCallbacks, layouts: &[DisplayLayout]) {
        let step = (self.frames / DISPLAY_EVERY) as usize;

        let bar = step % DMD_WIDTH;
        for (i, pixel) in self.dmd.iter_mut().enumerate() {
            let x = i % DMD_WIDTH;
            *pixel = if (bar..bar + DMD_BAR_WIDTH).contains(&x) {
                DMD_BAR
            } else {
                DMD_BACKGROUND
            };
        }
        callbacks.on_display_updated(0, DisplayFrame::Dmd(&self.dmd), &layouts[0]);

        for (i, cell) in self.cells.iter_mut().enumerate() {
            *cell = 1 << ((step + i) % 16);
        }
        callbacks.on_display_updated(1, DisplayFrame::Alphanumeric(&self.cells), &layouts[1]);
    }

    fn emit_mechanics(&mut self, callbacks: &mut dyn CoreCallbacks) {
        let Some(mech_config) = &self.config.mech else {
            return;
        };

        if self.frames % SOLENOID_EVERY == 0 {
            let active = (self.frames / SOLENOID_EVERY) % 2 == 0;
            callbacks.on_solenoid_updated(mech_config.solenoid, active);
        }

        let solenoid_on = (self.frames / SOLENOID_EVERY) % 2 == 0;
        if let Some(info) = self.mech.as_mut() {
            if solenoid_on && info.steps > 0 {
                info.pos = (info.pos + 1) % info.steps;
                info.speed = 1;
                callbacks.on_mech_updated(0, info);
            } else if info.speed != 0 {
                info.speed = 0;
                callbacks.on_mech_updated(0, info);
            }
        }
    }
}

impl EmulationCore for SyntheticCore {
    fn run(&mut self, callbacks: &mut dyn CoreCallbacks, stop: &AtomicBool) -> Result<()> {
        let descriptor = self.config.descriptor();
        if descriptor.samples_per_frame == 0 {
            return Err(BridgeError::InvalidConfig(format!(
                "cannot derive a frame size from {} Hz at {} fps",
                self.config.sample_rate, self.config.fps
            )));
        }

        callbacks.on_state_updated(true);

        let layouts = SyntheticConfig::layouts();
        for (index, layout) in layouts.iter().enumerate() {
            callbacks.on_display_available(index, layouts.len(), layout);
        }

        if let Some(mech_config) = &self.config.mech {
            let info = MechInfo {
                mech_type: mech_config.mech_type,
                length: mech_config.length,
                steps: mech_config.steps,
                pos: 0,
                speed: 0,
            };
            callbacks.on_mech_available(0, &info);
            self.mech = Some(info);
        }

        callbacks.on_console_data(b"synthetic core ready\n");

        let samples_per_frame = callbacks.on_audio_available(&descriptor)?;
        info!(
            "Synthetic core running: {} ({} samples/frame requested)",
            descriptor, samples_per_frame
        );

        let mut pacer = FramePacer::new(self.config.fps);
        if let Some(burst) = self.config.burst {
            pacer = pacer.with_max_lag(burst.stall_frames as f64 * 2.0);
        }

        while !stop.load(Ordering::SeqCst) {
            if self.config.max_frames.is_some_and(|max| self.frames >= max) {
                break;
            }

            if let Some(burst) = self.config.burst {
                if self.config.paced && burst.every > 0 && self.frames > 0 && self.frames % burst.every == 0 {
                    debug!("Synthetic core stalling for {} frames", burst.stall_frames);
                    std::thread::sleep(pacer.frame_period() * burst.stall_frames);
                }
            }

            self.emit_audio(callbacks, samples_per_frame)?;
            if self.frames % DISPLAY_EVERY == 0 {
                self.emit_displays(callbacks, &layouts);
            }
            self.emit_mechanics(callbacks);
            self.frames += 1;

            if self.config.paced {
                if let Pace::Resync(skipped) = pacer.pace() {
                    debug!("Synthetic core skipped {} frames", skipped);
                }
            }
        }

        info!("Synthetic core stopped after {} frames", self.frames);
        callbacks.on_state_updated(false);
        Ok(())
    }
}
