//! End-to-end sessions: synthetic core -> driver -> bridge -> scripted device

use crossbeam_channel::bounded;
use pinbridge::audio::device::MockDevice;
use pinbridge::audio::{AudioBridge, BridgeConfig, BridgeState, PlaybackDevice, SampleFormat, StreamDescriptor};
use pinbridge::core::{AudioPayload, CoreCallbacks, EmulationCore, SyntheticConfig, SyntheticCore};
use pinbridge::display::{DisplayLayout, HardwareGeneration};
use pinbridge::driver::Driver;
use pinbridge::Result;
use std::sync::atomic::AtomicBool;

fn driver(config: BridgeConfig) -> Driver<MockDevice> {
    let bridge = AudioBridge::new(MockDevice::new(), config).unwrap();
    Driver::new(bridge, HardwareGeneration::Other)
}

fn unpaced(frames: u64) -> SyntheticConfig {
    SyntheticConfig {
        max_frames: Some(frames),
        paced: false,
        ..Default::default()
    }
}

/// Lets the device finish buffers before each audio update
struct Consuming {
    driver: Driver<MockDevice>,
    per_frame: usize,
    committed: Vec<usize>,
}

impl Consuming {
    fn new(per_frame: usize) -> Self {
        Self {
            driver: driver(BridgeConfig::default()),
            per_frame,
            committed: Vec::new(),
        }
    }
}

impl CoreCallbacks for Consuming {
    fn on_display_available(&mut self, index: usize, count: usize, layout: &DisplayLayout) {
        self.driver.on_display_available(index, count, layout);
    }

    fn on_audio_available(&mut self, descriptor: &StreamDescriptor) -> Result<usize> {
        self.driver.on_audio_available(descriptor)
    }

    fn on_audio_updated(&mut self, payload: AudioPayload<'_>) -> Result<usize> {
        self.driver.bridge_mut().device_mut().complete(self.per_frame);
        let accepted = self.driver.on_audio_updated(payload)?;
        self.committed.push(self.driver.bridge().device().committed());
        Ok(accepted)
    }
}

#[test]
fn stalled_device_flushes_backlog() {
    let mut driver = driver(BridgeConfig::default());
    let mut core = SyntheticCore::new(unpaced(25));
    core.run(&mut driver, &AtomicBool::new(false)).unwrap();

    let stats = driver.bridge().stats();
    assert_eq!(stats.frames_received, 25);
    // Flushes on the 11th and 21st frame
    assert_eq!(stats.overflow_flushes, 2);
    assert_eq!(stats.frames_dropped, 20);
    assert_eq!(stats.frames_played, 0);
    assert_eq!(driver.bridge().pending_frames(), 5);
    assert_eq!(driver.bridge().device().committed(), 4);
}

#[test]
fn steady_consumption_plays_every_frame() {
    let mut sink = Consuming::new(1);
    let mut core = SyntheticCore::new(unpaced(40));
    core.run(&mut sink, &AtomicBool::new(false)).unwrap();

    let stats = sink.driver.bridge().stats();
    assert_eq!(stats.frames_played, 40);
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!(stats.stale_requeues, 0);
    assert_eq!(stats.underruns, 0);
    assert_eq!(sink.driver.bridge().pending_frames(), 0);
    assert_eq!(sink.driver.bridge().state(), BridgeState::Playing);
    assert!(sink.committed.iter().all(|&c| c == 4));
}

#[test]
fn starved_device_restarts_every_frame() {
    let mut sink = Consuming::new(4);
    let mut core = SyntheticCore::new(unpaced(5));
    core.run(&mut sink, &AtomicBool::new(false)).unwrap();

    let stats = sink.driver.bridge().stats();
    assert_eq!(stats.underruns, 5);
    assert_eq!(stats.frames_played, 5);
    assert_eq!(stats.stale_requeues, 15);
    assert_eq!(stats.buffers_recycled, 20);
    assert!(sink.committed.iter().all(|&c| c == 4));
}

#[test]
fn float_core_plays_through_int16_bridge() {
    let mut sink = Consuming::new(1);
    let mut core = SyntheticCore::new(SyntheticConfig {
        format: SampleFormat::Float32,
        ..unpaced(6)
    });
    core.run(&mut sink, &AtomicBool::new(false)).unwrap();

    let bridge = sink.driver.bridge();
    assert_eq!(bridge.descriptor().map(|d| d.format), Some(SampleFormat::Int16));
    assert_eq!(bridge.stats().frames_played, 6);
}

#[test]
fn displays_render_to_observer() {
    let (tx, rx) = bounded(64);
    let mut driver = driver(BridgeConfig::default()).with_display_sink(tx);
    let mut core = SyntheticCore::new(unpaced(13));
    core.run(&mut driver, &AtomicBool::new(false)).unwrap();

    let updates: Vec<_> = rx.try_iter().collect();
    // Both displays at frames 0, 6 and 12
    assert_eq!(updates.len(), 6);
    assert_eq!(driver.layouts().len(), 2);

    let dmd = &updates[0];
    assert_eq!(dmd.index, 0);
    assert_eq!(dmd.lines.len(), 32);
    assert!(dmd.lines[0].starts_with("▓▓▓▓░"));
    assert_eq!(dmd.lines[0].chars().count(), 128);

    let alpha = &updates[1];
    assert_eq!(alpha.index, 1);
    assert_eq!(alpha.lines.len(), 8);
    assert_eq!(alpha.lines[0].chars().count(), 16 * 10);
}

#[test]
fn shutdown_releases_buffers() {
    let mut driver = driver(BridgeConfig::default());
    let mut core = SyntheticCore::new(unpaced(3));
    core.run(&mut driver, &AtomicBool::new(false)).unwrap();

    let mut device = driver.shutdown().unwrap();
    assert_eq!(device.committed(), 0);
    assert_eq!(device.processed_count().unwrap(), 0);
}

#[test]
fn device_failure_stops_core() {
    let mut driver = driver(BridgeConfig::default());
    driver.bridge_mut().device_mut().fail_next("device lost");

    let mut core = SyntheticCore::new(unpaced(3));
    let err = core.run(&mut driver, &AtomicBool::new(false)).unwrap_err();
    assert!(err.is_recoverable());
    assert!(!err.is_contract_violation());
    assert_eq!(core.frames_emitted(), 0);
}
