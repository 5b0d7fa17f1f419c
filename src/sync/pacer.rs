//! Frame pacing against wall-clock time
//!
//! The emulation loop produces one update per frame period. The pacer tells
//! the loop how long to sleep before the next frame, or how far behind it is.
//! Once lag exceeds the threshold the schedule is re-anchored at the current
//! instant instead of bursting through every missed frame.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Lag in frames before the schedule is re-anchored
pub const DEFAULT_MAX_LAG_FRAMES: f64 = 8.0;

/// What the loop should do before producing the next frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pace {
    /// Ahead of schedule: sleep this long
    Wait(Duration),
    /// Behind schedule by this many frames: produce immediately
    Behind(f64),
    /// Too far behind: schedule restarted, this many frames skipped
    Resync(u64),
}

/// Paces a fixed-rate frame loop
pub struct FramePacer {
    /// Target frames per second
    fps: f64,
    /// Schedule anchor
    origin: Instant,
    /// Frames produced since the anchor
    frames: u64,
    /// Resync threshold
    max_lag_frames: f64,
    /// Smoothed lag for monitoring, in frames
    lag_frames: f64,
    /// Number of re-anchors
    resyncs: u64,
}

impl FramePacer {
    /// Create a pacer anchored now
    pub fn new(fps: f64) -> Self {
        Self::starting_at(fps, Instant::now())
    }

    /// Create a pacer anchored at `origin`
    pub fn starting_at(fps: f64, origin: Instant) -> Self {
        Self {
            fps: if fps > 0.0 { fps } else { 1.0 },
            origin,
            frames: 0,
            max_lag_frames: DEFAULT_MAX_LAG_FRAMES,
            lag_frames: 0.0,
            resyncs: 0,
        }
    }

    /// Set the resync threshold
    pub fn with_max_lag(mut self, frames: f64) -> Self {
        self.max_lag_frames = frames.max(1.0);
        self
    }

    /// Length of one frame period
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// When the next frame is due
    pub fn next_deadline(&self) -> Instant {
        self.origin + Duration::from_secs_f64((self.frames + 1) as f64 / self.fps)
    }

    /// Account for one frame at `now` and decide how to pace it
    pub fn advance_at(&mut self, now: Instant) -> Pace {
        let deadline = self.next_deadline();
        self.frames += 1;

        if now <= deadline {
            self.lag_frames = self.lag_frames * 7.0 / 8.0;
            return Pace::Wait(deadline - now);
        }

        let lag = now.duration_since(deadline).as_secs_f64() * self.fps;
        self.lag_frames = (self.lag_frames * 7.0 + lag) / 8.0;

        trace!("Frame {} behind by {:.2} frames", self.frames, lag);

        if lag > self.max_lag_frames {
            let skipped = lag as u64;
            self.origin = now;
            self.frames = 0;
            self.resyncs += 1;
            debug!(
                "Frame pacer resynced after {:.2} frames of lag ({} skipped)",
                lag, skipped
            );
            return Pace::Resync(skipped);
        }

        Pace::Behind(lag)
    }

    /// Account for one frame now, sleeping if ahead of schedule
    pub fn pace(&mut self) -> Pace {
        let pace = self.advance_at(Instant::now());
        if let Pace::Wait(delay) = pace {
            std::thread::sleep(delay);
        }
        pace
    }

    /// Smoothed lag in milliseconds
    pub fn lag_ms(&self) -> f64 {
        self.lag_frames * 1000.0 / self.fps
    }

    /// Number of times the schedule was re-anchored
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Frames produced since the last anchor
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_time_frames_wait() {
        let start = Instant::now();
        let mut pacer = FramePacer::starting_at(100.0, start);

        match pacer.advance_at(start) {
            Pace::Wait(delay) => assert_eq!(delay, Duration::from_millis(10)),
            other => panic!("expected wait, got {:?}", other),
        }
        assert_eq!(pacer.frames(), 1);
    }

    #[test]
    fn test_late_frame_reports_lag() {
        let start = Instant::now();
        let mut pacer = FramePacer::starting_at(100.0, start);

        // Frame 1 is due at 10ms; arriving at 40ms is 3 frames late
        match pacer.advance_at(start + Duration::from_millis(40)) {
            Pace::Behind(lag) => assert!((lag - 3.0).abs() < 0.01, "lag was {}", lag),
            other => panic!("expected behind, got {:?}", other),
        }
        assert_eq!(pacer.resyncs(), 0);
    }

    #[test]
    fn test_catch_up_returns_to_waiting() {
        let start = Instant::now();
        let mut pacer = FramePacer::starting_at(100.0, start);
        let late = start + Duration::from_millis(35);

        assert!(matches!(pacer.advance_at(late), Pace::Behind(_)));
        assert!(matches!(pacer.advance_at(late), Pace::Behind(_)));
        assert!(matches!(pacer.advance_at(late), Pace::Behind(_)));
        // Frame 4 is due at 40ms
        assert!(matches!(pacer.advance_at(late), Pace::Wait(_)));
    }

    #[test]
    fn test_excess_lag_resyncs() {
        let start = Instant::now();
        let mut pacer = FramePacer::starting_at(100.0, start).with_max_lag(4.0);
        let stalled = start + Duration::from_millis(110);

        assert_eq!(pacer.advance_at(stalled), Pace::Resync(10));
        assert_eq!(pacer.resyncs(), 1);
        assert_eq!(pacer.frames(), 0);
        assert_eq!(pacer.next_deadline(), stalled + Duration::from_millis(10));
    }

    #[test]
    fn test_paced_loop_tracks_wall_clock() {
        let mut pacer = FramePacer::new(200.0);
        let start = Instant::now();
        for _ in 0..4 {
            pacer.pace();
        }
        let elapsed = start.elapsed();
        // 4 frames at 5ms each
        assert!(elapsed >= Duration::from_millis(18), "elapsed {:?}", elapsed);
        assert!(pacer.lag_ms() < 5.0, "lag {}", pacer.lag_ms());
    }
}
