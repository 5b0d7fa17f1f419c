//! Emulation core callback contract
//!
//! The core runs its own timing loop and reports everything it produces
//! through [`CoreCallbacks`]. All hooks are invoked synchronously on the
//! core's thread.

pub mod synthetic;

pub use synthetic::{SyntheticConfig, SyntheticCore};

use crate::audio::StreamDescriptor;
use crate::display::{DisplayFrame, DisplayLayout};
use crate::error::Result;
use std::sync::atomic::AtomicBool;

/// PCM delivered by one audio update, in the negotiated encoding
#[derive(Debug, Clone, Copy)]
pub enum AudioPayload<'a> {
    Int16(&'a [i16]),
    Float32(&'a [f32]),
}

impl AudioPayload<'_> {
    /// Interleaved sample count
    pub fn len(&self) -> usize {
        match self {
            AudioPayload::Int16(samples) => samples.len(),
            AudioPayload::Float32(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mechanism type flags
pub mod mech_type {
    pub const NONLINEAR: u32 = 0x01;
    pub const REVERSE: u32 = 0x02;
    /// Single solenoid driving in one direction
    pub const ONESOL: u32 = 0x00;
}

/// Position switch driven by a mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MechSwitch {
    pub switch: u32,
    pub start_pos: u32,
    pub end_pos: u32,
}

/// Simulated mechanism set up when the machine starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MechConfig {
    /// Driving solenoid
    pub solenoid: u32,
    /// Travel time in update ticks
    pub length: u32,
    /// Position steps over the full travel
    pub steps: u32,
    /// `mech_type` flags
    pub mech_type: u32,
    pub switches: Vec<MechSwitch>,
}

impl Default for MechConfig {
    fn default() -> Self {
        Self {
            solenoid: 11,
            length: 240,
            steps: 240,
            mech_type: mech_type::NONLINEAR | mech_type::REVERSE | mech_type::ONESOL,
            switches: vec![MechSwitch {
                switch: 32,
                start_pos: 0,
                end_pos: 5,
            }],
        }
    }
}

/// Snapshot of a mechanism reported by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MechInfo {
    pub mech_type: u32,
    pub length: u32,
    pub steps: u32,
    pub pos: u32,
    pub speed: i32,
}

impl std::fmt::Display for MechInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type={:#x}, length={}, steps={}, pos={}, speed={}",
            self.mech_type, self.length, self.steps, self.pos, self.speed
        )
    }
}

/// Hooks the emulation core calls as it runs
///
/// Only the audio hooks are required; everything else defaults to ignoring
/// the event.
pub trait CoreCallbacks {
    /// Machine started (`true`) or stopped (`false`)
    fn on_state_updated(&mut self, _running: bool) {}

    /// A display surface exists; called once per display before any update
    fn on_display_available(&mut self, _index: usize, _count: usize, _layout: &DisplayLayout) {}

    /// New contents for a display
    fn on_display_updated(&mut self, _index: usize, _frame: DisplayFrame<'_>, _layout: &DisplayLayout) {}

    /// Negotiate the audio stream; returns per-channel samples per update
    fn on_audio_available(&mut self, descriptor: &StreamDescriptor) -> Result<usize>;

    /// One frame of audio; returns per-channel samples consumed
    fn on_audio_updated(&mut self, payload: AudioPayload<'_>) -> Result<usize>;

    fn on_solenoid_updated(&mut self, _solenoid: u32, _active: bool) {}

    fn on_mech_available(&mut self, _mech: usize, _info: &MechInfo) {}

    fn on_mech_updated(&mut self, _mech: usize, _info: &MechInfo) {}

    /// Raw console output from the machine
    fn on_console_data(&mut self, _data: &[u8]) {}
}

/// A running emulation
pub trait EmulationCore {
    /// Run until the machine stops or `stop` is set
    fn run(&mut self, callbacks: &mut dyn CoreCallbacks, stop: &AtomicBool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mech_flags() {
        let config = MechConfig::default();
        assert_eq!(config.mech_type, 0x03);
        assert_eq!(config.mech_type & mech_type::REVERSE, mech_type::REVERSE);
        assert_eq!(config.switches.len(), 1);
    }

    #[test]
    fn test_mech_info_display() {
        let info = MechInfo {
            mech_type: MechConfig::default().mech_type,
            length: 240,
            steps: 240,
            pos: 12,
            speed: 1,
        };
        assert_eq!(info.to_string(), "type=0x3, length=240, steps=240, pos=12, speed=1");
    }
}
