//! Emulation cadence tracking

pub mod pacer;

pub use pacer::{FramePacer, Pace};
