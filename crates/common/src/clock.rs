//! Clock and timing utilities for playback.
//!
//! The session clock is the authoritative timeline position. It advances
//! by elapsed wall time between render ticks while playing and is frozen
//! otherwise. Callers pass `Instant`s in explicitly so the clock stays
//! deterministic under test.

use std::time::Instant;

/// Timeline position in milliseconds.
pub type Millis = f64;

/// Wall-clock anchored session clock.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    /// Current timeline position (ms).
    position_ms: Millis,

    /// Wall instant the position was last advanced at; `None` while frozen.
    anchor: Option<Instant>,

    /// Playback rate multiplier (1.0 = real time).
    rate: f64,
}

impl PlaybackClock {
    /// Create a frozen clock at the given position.
    pub fn new(position_ms: Millis) -> Self {
        Self {
            position_ms: position_ms.max(0.0),
            anchor: None,
            rate: 1.0,
        }
    }

    /// Start advancing from `now`. Re-anchors if already running.
    pub fn start(&mut self, now: Instant) {
        self.anchor = Some(now);
    }

    /// Freeze the clock, folding in time elapsed up to `now`.
    pub fn pause(&mut self, now: Instant) {
        self.advance(now);
        self.anchor = None;
    }

    /// Advance by wall time elapsed since the last anchor and return the new
    /// position. A frozen clock returns its position unchanged.
    pub fn advance(&mut self, now: Instant) -> Millis {
        if let Some(anchor) = self.anchor {
            let elapsed = now.saturating_duration_since(anchor).as_secs_f64() * 1_000.0;
            self.position_ms += elapsed * self.rate;
            self.anchor = Some(now);
        }
        self.position_ms
    }

    /// Jump to a position. Keeps running state, re-anchoring at `now`.
    pub fn set_position(&mut self, position_ms: Millis, now: Instant) {
        self.position_ms = position_ms.max(0.0);
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    /// Set the playback rate multiplier.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.max(0.0);
    }

    /// Current position without advancing.
    pub fn position(&self) -> Millis {
        self.position_ms
    }

    /// Whether the clock is advancing.
    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }
}

/// Frame rate controller for periodic work (refresh ticks, progress reports).
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

/// Duration of one frame at `fps`, in milliseconds.
pub fn frame_interval_ms(fps: f64) -> Millis {
    if fps <= 0.0 {
        return 0.0;
    }
    1_000.0 / fps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_frozen_clock_does_not_advance() {
        let mut clock = PlaybackClock::new(500.0);
        let t0 = Instant::now();
        assert_eq!(clock.advance(t0 + Duration::from_millis(100)), 500.0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_running_clock_advances_by_elapsed_wall_time() {
        let mut clock = PlaybackClock::new(0.0);
        let t0 = Instant::now();
        clock.start(t0);
        let pos = clock.advance(t0 + Duration::from_millis(40));
        assert!((pos - 40.0).abs() < 1e-6);
        let pos = clock.advance(t0 + Duration::from_millis(100));
        assert!((pos - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_pause_folds_in_elapsed_time() {
        let mut clock = PlaybackClock::new(0.0);
        let t0 = Instant::now();
        clock.start(t0);
        clock.pause(t0 + Duration::from_millis(250));
        assert!((clock.position() - 250.0).abs() < 1e-6);
        assert_eq!(clock.advance(t0 + Duration::from_secs(5)), clock.position());
    }

    #[test]
    fn test_set_position_reanchors() {
        let mut clock = PlaybackClock::new(0.0);
        let t0 = Instant::now();
        clock.start(t0);
        clock.set_position(10_000.0, t0 + Duration::from_millis(500));
        let pos = clock.advance(t0 + Duration::from_millis(520));
        assert!((pos - 10_020.0).abs() < 1e-6);
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(60);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(1_000_000)); // 1ms later, too soon
        assert!(ctrl.should_tick(17_000_000)); // ~17ms later, should fire (60Hz ~ 16.67ms)
    }

    #[test]
    fn test_frame_interval() {
        assert!((frame_interval_ms(25.0) - 40.0).abs() < 1e-9);
        assert_eq!(frame_interval_ms(0.0), 0.0);
    }
}
