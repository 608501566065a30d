//! Decode manager: one worker plus its frame buffer for one video effect.
//!
//! The manager is the only owner of its buffer and worker. Preview reads go
//! through [`DecodeManager::take_frame`], which never blocks. Export reads go
//! through [`DecodeManager::acquire`], a bounded poll.
//!
//! # Seek policy
//!
//! The covered range runs from the oldest buffered frame to the newest
//! frame received from the current worker. A seek whose media target lies
//! in `[covered_min - tolerance, covered_max + lookahead]` keeps the worker;
//! anything else tears it down and restarts demuxing at the target.
//! Independently, `miss_threshold` consecutive preview misses force a
//! restart at the requested position.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use splice_common::clock::{frame_interval_ms, Millis};
use splice_common::config::EngineConfig;
use splice_timeline_model::{demux_window, Effect, EffectId, EffectKind, MediaWindow, Padding};
use tokio::runtime::Handle;

use crate::buffer::{FrameBuffer, InsertOutcome};
use crate::context::EngineContext;
use crate::error::DecodeError;
use crate::frame::{FrameLedger, Micros, VideoFrame};
use crate::media::MediaSource;
use crate::protocol::{WorkerCommand, WorkerEvent};
use crate::worker::WorkerHandle;
use crate::{ms_to_us, us_to_ms};

/// Per-manager counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub frames_received: u64,
    pub frames_evicted: u64,
    pub frames_pruned: u64,
    pub hits: u64,
    pub misses: u64,
    pub restarts: u64,
    /// Last decoder queue depth reported by the worker.
    pub queue_depth: usize,
}

impl DecodeStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }
}

/// What a seek did to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The target is covered; the running worker was kept.
    Continued,
    /// The worker was torn down and restarted at the target.
    Restarted,
    /// The manager is torn down or failed; nothing happened.
    Ignored,
}

pub struct DecodeManager {
    effect_id: EffectId,
    source: Arc<dyn MediaSource>,
    runtime: Handle,
    ledger: Arc<FrameLedger>,
    config: EngineConfig,
    timebase: f64,
    window: MediaWindow,
    buffer: FrameBuffer,
    worker: Option<WorkerHandle>,

    demux_start_ms: Millis,
    received_from_worker: u64,
    latest_us: Option<Micros>,
    reported_level: Option<(usize, u64)>,
    ended: bool,

    failed: Option<DecodeError>,
    consecutive_misses: u32,
    stats: DecodeStats,
    torn_down: bool,
}

impl DecodeManager {
    /// Resolve the effect's source and start decoding at `media_ms`.
    pub fn start(
        ctx: &EngineContext,
        effect: &Effect,
        padding: Padding,
        timebase: f64,
        media_ms: Millis,
    ) -> Result<Self, DecodeError> {
        let EffectKind::Video { source: hash, .. } = &effect.kind else {
            return Err(DecodeError::NotVideo {
                effect: effect.id.to_string(),
            });
        };
        let source = ctx
            .media
            .get_source(hash)
            .ok_or_else(|| DecodeError::SourceUnavailable { hash: hash.clone() })?;

        let capacity = ctx.config.buffer_capacity(timebase);
        let mut manager = Self {
            effect_id: effect.id.clone(),
            source,
            runtime: ctx.runtime.clone(),
            ledger: ctx.ledger.clone(),
            config: ctx.config.clone(),
            timebase,
            window: demux_window(effect, padding),
            buffer: FrameBuffer::new(capacity),
            worker: None,
            demux_start_ms: 0.0,
            received_from_worker: 0,
            latest_us: None,
            reported_level: None,
            ended: false,
            failed: None,
            consecutive_misses: 0,
            stats: DecodeStats::default(),
            torn_down: false,
        };
        manager.spawn_worker(media_ms);

        tracing::info!(
            effect = %manager.effect_id,
            source = %manager.source.hash(),
            capacity,
            window_start_ms = manager.window.start_ms,
            window_end_ms = manager.window.end_ms,
            "Decode manager started"
        );
        Ok(manager)
    }

    pub fn effect_id(&self) -> &EffectId {
        &self.effect_id
    }

    pub fn source_id(&self) -> &str {
        self.source.hash()
    }

    pub fn window(&self) -> MediaWindow {
        self.window
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Buffered media range in milliseconds.
    pub fn buffered_range_ms(&self) -> Option<(Millis, Millis)> {
        self.buffer
            .range()
            .map(|(lo, hi)| (us_to_ms(lo), us_to_ms(hi)))
    }

    /// Whether the current worker has exhausted its demux window.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn failure(&self) -> Option<&DecodeError> {
        self.failed.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Lookup tolerance (µs): the configured fraction of one frame interval.
    pub fn tolerance_us(&self) -> Micros {
        ms_to_us(self.config.tolerance_factor() * frame_interval_ms(self.timebase))
    }

    fn clamp_to_window(&self, media_ms: Millis) -> Millis {
        media_ms.max(self.window.start_ms).min(self.window.end_ms)
    }

    fn spawn_worker(&mut self, media_ms: Millis) {
        let start_ms = self.clamp_to_window(media_ms);
        let worker = WorkerHandle::spawn(
            &self.runtime,
            self.source.clone(),
            self.ledger.clone(),
            self.config.pacing,
        );
        worker.send(WorkerCommand::Configure(self.source.decoder_config()));
        worker.send(WorkerCommand::Demux {
            window: self.window,
            start_ms,
            timebase: self.timebase,
        });

        self.worker = Some(worker);
        self.demux_start_ms = start_ms;
        self.received_from_worker = 0;
        self.latest_us = None;
        self.reported_level = None;
        self.ended = false;
        self.report_level();
    }

    /// Tear down the worker: stop delivery, release in-flight and buffered
    /// frames, then clean up and abort the task.
    fn teardown_worker(&mut self) {
        let in_flight = match self.worker.as_mut() {
            Some(worker) => worker.stop_delivery(),
            None => 0,
        };
        let buffered = self.buffer.clear();
        if let Some(worker) = self.worker.take() {
            worker.terminate();
        }
        tracing::debug!(
            effect = %self.effect_id,
            in_flight,
            buffered,
            "Decode worker torn down"
        );
    }

    fn restart(&mut self, media_ms: Millis) {
        tracing::info!(effect = %self.effect_id, media_ms, "Restarting decode worker");
        self.teardown_worker();
        self.consecutive_misses = 0;
        self.stats.restarts += 1;
        self.spawn_worker(media_ms);
    }

    /// Tell the worker how much of the buffer is in use.
    fn report_level(&mut self) {
        let level = (self.buffer.len(), self.received_from_worker);
        if self.reported_level == Some(level) {
            return;
        }
        if let Some(worker) = self.worker.as_ref() {
            worker.send(WorkerCommand::BufferLevel {
                buffered: level.0,
                received: level.1,
                capacity: self.buffer.capacity(),
            });
            self.reported_level = Some(level);
        }
    }

    /// Drain pending worker events into the buffer without waiting.
    /// Returns how many frames arrived.
    pub fn pump(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }
        let events: Vec<WorkerEvent> = match self.worker.as_mut() {
            Some(worker) => std::iter::from_fn(|| worker.try_recv()).collect(),
            None => return 0,
        };

        let mut arrived = 0;
        for event in events {
            if self.failed.is_some() {
                event.discard();
                continue;
            }
            match event {
                WorkerEvent::NewFrame {
                    timecode_us, frame, ..
                } => {
                    arrived += 1;
                    self.received_from_worker += 1;
                    self.stats.frames_received += 1;
                    self.latest_us =
                        Some(self.latest_us.map_or(timecode_us, |l| l.max(timecode_us)));
                    if self.buffer.insert(frame) == InsertOutcome::Evicted {
                        self.stats.frames_evicted += 1;
                    }
                }
                WorkerEvent::QueueDepth(depth) => self.stats.queue_depth = depth,
                WorkerEvent::Configured => {
                    tracing::debug!(effect = %self.effect_id, "Decoder ready");
                }
                WorkerEvent::End => {
                    self.ended = true;
                    tracing::debug!(effect = %self.effect_id, "Decode worker reached end of window");
                }
                WorkerEvent::Failed(err) => {
                    tracing::warn!(effect = %self.effect_id, error = %err, "Decode source failed");
                    self.failed = Some(err);
                    self.teardown_worker();
                }
            }
        }

        self.report_level();
        arrived
    }

    /// Non-blocking preview read of the frame for `media_ms`.
    ///
    /// A hit removes the frame from the buffer; the caller draws it and then
    /// releases it. Misses count towards the stall threshold.
    pub fn take_frame(&mut self, media_ms: Millis) -> Option<VideoFrame> {
        if self.torn_down {
            tracing::warn!(
                effect = %self.effect_id,
                "Frame requested from torn-down decode manager"
            );
            return None;
        }
        self.pump();
        if self.failed.is_some() {
            return None;
        }

        let tolerance = self.tolerance_us();
        match self.buffer.take(ms_to_us(media_ms), tolerance) {
            Some(frame) => {
                self.consecutive_misses = 0;
                self.stats.hits += 1;
                self.report_level();
                Some(frame)
            }
            None => {
                self.consecutive_misses += 1;
                self.stats.misses += 1;
                if self.consecutive_misses >= self.config.miss_threshold.max(1) {
                    tracing::warn!(
                        effect = %self.effect_id,
                        misses = self.consecutive_misses,
                        media_ms,
                        "Decode stalled"
                    );
                    self.restart(media_ms);
                }
                None
            }
        }
    }

    /// Release buffered frames that playback has moved past.
    pub fn prune_behind(&mut self, media_ms: Millis) -> usize {
        if self.torn_down {
            return 0;
        }
        let cutoff = ms_to_us(media_ms) - self.tolerance_us();
        let pruned = self.buffer.prune_before(cutoff);
        if pruned > 0 {
            self.stats.frames_pruned += pruned as u64;
            self.report_level();
        }
        pruned
    }

    /// Range of media time the current worker has delivered and that is
    /// still reachable.
    fn covered_range(&self) -> (Micros, Micros) {
        match (self.buffer.range(), self.latest_us) {
            (Some((lo, hi)), latest) => (lo, latest.map_or(hi, |l| l.max(hi))),
            (None, Some(latest)) => (latest, latest),
            (None, None) => {
                let start = ms_to_us(self.demux_start_ms);
                (start, start)
            }
        }
    }

    /// Apply the seek policy for a new media target.
    pub fn seek(&mut self, media_ms: Millis) -> SeekOutcome {
        if self.torn_down {
            tracing::warn!(effect = %self.effect_id, "Seek on torn-down decode manager");
            return SeekOutcome::Ignored;
        }
        self.pump();
        if self.failed.is_some() {
            return SeekOutcome::Ignored;
        }

        let target = ms_to_us(self.clamp_to_window(media_ms));
        let (lo, hi) = self.covered_range();
        let covered = target >= lo - self.tolerance_us()
            && target <= hi + ms_to_us(self.config.lookahead_ms);

        if covered && self.worker.is_some() {
            tracing::debug!(effect = %self.effect_id, media_ms, "Seek inside covered range");
            return SeekOutcome::Continued;
        }
        self.restart(media_ms);
        SeekOutcome::Restarted
    }

    /// Export read: wait up to `timeout` for the frame at `media_ms`.
    ///
    /// Returns early with `None` once the worker has delivered a later frame
    /// or finished its window, since frames arrive in media-time order.
    pub async fn acquire(
        &mut self,
        media_ms: Millis,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<VideoFrame> {
        if self.torn_down {
            tracing::warn!(
                effect = %self.effect_id,
                "Frame acquired from torn-down decode manager"
            );
            return None;
        }
        if self.seek(media_ms) == SeekOutcome::Ignored {
            return None;
        }
        self.prune_behind(media_ms);

        let target = ms_to_us(media_ms);
        let tolerance = self.tolerance_us();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            self.pump();
            if self.failed.is_some() {
                return None;
            }
            if let Some(frame) = self.buffer.take(target, tolerance) {
                self.stats.hits += 1;
                self.report_level();
                return Some(frame);
            }
            let passed = self.latest_us.is_some_and(|latest| latest > target + tolerance);
            if passed || self.ended || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(poll_interval).await;
        }

        self.stats.misses += 1;
        tracing::debug!(effect = %self.effect_id, media_ms, "Export frame unavailable");
        None
    }

    /// Tear down for good. Later calls are no-ops that log a warning.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.teardown_worker();
        self.torn_down = true;
        tracing::info!(
            effect = %self.effect_id,
            hits = self.stats.hits,
            misses = self.stats.misses,
            restarts = self.stats.restarts,
            "Decode manager torn down"
        );
    }
}

impl Drop for DecodeManager {
    fn drop(&mut self) {
        if !self.torn_down {
            self.teardown_worker();
        }
    }
}

impl std::fmt::Debug for DecodeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeManager")
            .field("effect_id", &self.effect_id)
            .field("source", &self.source.hash())
            .field("window", &self.window)
            .field("buffered", &self.buffer.len())
            .field("stats", &self.stats)
            .field("failed", &self.failed)
            .finish()
    }
}
