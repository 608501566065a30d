//! Periodic preview driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use splice_common::clock::RateController;
use tokio::time::MissedTickBehavior;

use crate::playback::Player;

/// Counters from one [`RenderLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub frames_composed: u64,
    /// Ticks where a visible video node had nothing to draw.
    pub ticks_with_missing: u64,
    pub errors: u64,
}

/// Ticks a [`Player`] at the display refresh rate until stopped.
pub struct RenderLoop {
    player: Player,
    interval: Duration,
    stop_flag: Arc<AtomicBool>,
    stats: LoopStats,
}

impl RenderLoop {
    pub fn new(player: Player, refresh_hz: u32) -> Self {
        let interval = Duration::from_nanos(RateController::new(refresh_hz).interval_ns());
        Self {
            player,
            interval,
            stop_flag: Arc::new(AtomicBool::new(false)),
            stats: LoopStats::default(),
        }
    }

    /// Run until the stop flag is set.
    pub async fn run(&mut self) -> LoopStats {
        tracing::info!(interval_us = self.interval.as_micros() as u64, "Render loop started");
        self.stop_flag.store(false, Ordering::SeqCst);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.stop_flag.load(Ordering::Relaxed) {
            ticker.tick().await;
            self.stats.ticks += 1;
            match self.player.tick(Instant::now()) {
                Ok(Some(report)) => {
                    self.stats.frames_composed += 1;
                    if !report.missing.is_empty() {
                        self.stats.ticks_with_missing += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.errors += 1;
                    tracing::warn!(error = %e, "Render tick failed");
                }
            }
        }

        tracing::info!(
            ticks = self.stats.ticks,
            frames = self.stats.frames_composed,
            "Render loop stopped"
        );
        self.stats
    }

    /// Set the stop flag.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Get the stop flag for external coordination.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn into_player(self) -> Player {
        self.player
    }
}
