//! Export: frame-accurate composition through a blocking acquire.
//!
//! Export walks the range one output frame at a time. For each timecode it
//! waits (bounded) for every visible video frame, composes, and hands the
//! draw list to an [`ExportSink`]. A frame that never arrives is recorded
//! and the export moves on; all such gaps are reported once at the end.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use splice_common::clock::{frame_interval_ms, Millis, RateController};
use splice_common::config::EngineConfig;
use splice_timeline_model::{EffectId, EffectKind, SessionSnapshot};

use crate::compositor::Compositor;
use crate::draw::DrawList;
use crate::error::{RenderError, RenderResult};

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Encoding,
    Finalizing,
    Complete,
    Failed,
}

/// Range and pacing of one export.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub start_ms: Millis,
    /// Defaults to the end of the timeline.
    pub end_ms: Option<Millis>,
    /// Output frame rate; defaults to the snapshot timebase.
    pub fps: Option<f64>,
    /// How long to wait for one frame before recording it missing.
    pub frame_timeout: Duration,
    pub poll_interval: Duration,
    /// Progress callbacks per second while rendering.
    pub progress_hz: u32,
}

impl ExportSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            start_ms: 0.0,
            end_ms: None,
            fps: None,
            frame_timeout: Duration::from_millis(config.export.frame_timeout_ms),
            poll_interval: Duration::from_millis(config.export.poll_interval_ms.max(1)),
            progress_hz: 10,
        }
    }

    /// Output timecodes in `[start, end)` for `snapshot`.
    pub fn timecodes(&self, snapshot: &SessionSnapshot) -> Vec<Millis> {
        let fps = self.fps.filter(|f| *f > 0.0).unwrap_or(snapshot.timebase);
        let step = frame_interval_ms(fps);
        let start = self.start_ms.max(0.0);
        let end = self.end_ms.unwrap_or_else(|| snapshot.duration());
        if step <= 0.0 || end <= start {
            return Vec::new();
        }
        let count = ((end - start) / step).ceil() as u64;
        (0..count)
            .map(|i| start + i as f64 * step)
            .filter(|t| *t < end)
            .collect()
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// A slice of source audio placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSegment {
    pub effect_id: EffectId,
    pub source: String,
    pub timeline_start_ms: Millis,
    pub timeline_end_ms: Millis,
    pub media_start_ms: Millis,
    pub volume: f64,
}

impl AudioSegment {
    pub fn duration_ms(&self) -> Millis {
        self.timeline_end_ms - self.timeline_start_ms
    }
}

/// Audio effects on unmuted tracks, clipped to `[start, end]`.
pub fn extract_audio(snapshot: &SessionSnapshot, start: Millis, end: Millis) -> Vec<AudioSegment> {
    let mut segments: Vec<AudioSegment> = snapshot
        .effects
        .iter()
        .filter(|e| !e.is_empty() && !snapshot.track_of(e).muted)
        .filter_map(|e| {
            let EffectKind::Audio { source, volume } = &e.kind else {
                return None;
            };
            let lo = e.start_at_position.max(start);
            let hi = e.timeline_end().min(end);
            if hi <= lo {
                return None;
            }
            Some(AudioSegment {
                effect_id: e.id.clone(),
                source: source.clone(),
                timeline_start_ms: lo,
                timeline_end_ms: hi,
                media_start_ms: e.start + (lo - e.start_at_position),
                volume: *volume,
            })
        })
        .collect();
    segments.sort_by(|a, b| {
        a.timeline_start_ms
            .total_cmp(&b.timeline_start_ms)
            .then_with(|| a.effect_id.cmp(&b.effect_id))
    });
    segments
}

/// Downstream encoder/muxer. Encoding itself lives outside this crate.
pub trait ExportSink: Send {
    fn encode_frame(&mut self, timecode: Millis, frame: &DrawList) -> RenderResult<()>;

    fn submit_audio(&mut self, segments: &[AudioSegment]) -> RenderResult<()>;

    fn finish(&mut self) -> RenderResult<()>;
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<DrawList>,
    pub audio: Vec<AudioSegment>,
    pub finished: bool,
}

impl ExportSink for MemorySink {
    fn encode_frame(&mut self, _timecode: Millis, frame: &DrawList) -> RenderResult<()> {
        if self.finished {
            return Err(RenderError::sink("frame after finish"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn submit_audio(&mut self, segments: &[AudioSegment]) -> RenderResult<()> {
        self.audio.extend_from_slice(segments);
        Ok(())
    }

    fn finish(&mut self) -> RenderResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// Sink that writes one JSON object per line: frames, then audio.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line<T: Serialize>(&mut self, value: &T) -> RenderResult<()> {
        serde_json::to_writer(&mut self.out, value).map_err(|e| RenderError::sink(e.to_string()))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| RenderError::sink(e.to_string()))
    }
}

impl<W: Write + Send> ExportSink for JsonLinesSink<W> {
    fn encode_frame(&mut self, _timecode: Millis, frame: &DrawList) -> RenderResult<()> {
        self.line(frame)
    }

    fn submit_audio(&mut self, segments: &[AudioSegment]) -> RenderResult<()> {
        segments.iter().try_for_each(|s| self.line(s))
    }

    fn finish(&mut self) -> RenderResult<()> {
        self.out.flush().map_err(|e| RenderError::sink(e.to_string()))
    }
}

/// A frame that could not be acquired in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingFrame {
    pub timecode: Millis,
    pub effect_id: EffectId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSource {
    pub effect_id: EffectId,
    pub source: Option<String>,
    pub error: String,
}

/// Everything that went wrong, reported once when the export ends.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub frames_rendered: u64,
    pub total_frames: u64,
    pub missing: Vec<MissingFrame>,
    pub failed_sources: Vec<FailedSource>,
    pub audio_segments: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExportReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.failed_sources.is_empty()
    }
}

/// Drives a compositor through an export range.
pub struct ExportSession {
    compositor: Compositor,
    settings: ExportSettings,
    progress: Option<ProgressCallback>,
}

impl ExportSession {
    /// `compositor` must already be recreated from the snapshot to export.
    pub fn new(compositor: Compositor, settings: ExportSettings) -> Self {
        Self {
            compositor,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn into_compositor(self) -> Compositor {
        self.compositor
    }

    fn report_progress(&self, stage: ExportStage, rendered: u64, total: u64, started: Instant) {
        let Some(cb) = &self.progress else {
            return;
        };
        let progress = if total == 0 {
            1.0
        } else {
            rendered as f64 / total as f64
        };
        let elapsed = started.elapsed().as_secs_f64();
        let eta_secs = if rendered == 0 {
            0.0
        } else {
            elapsed / rendered as f64 * total.saturating_sub(rendered) as f64
        };
        cb(ExportProgress {
            progress,
            frames_rendered: rendered,
            total_frames: total,
            eta_secs,
            stage,
        });
    }

    /// Render the configured range of `snapshot` into `sink`.
    pub async fn run(
        &mut self,
        snapshot: Arc<SessionSnapshot>,
        sink: &mut dyn ExportSink,
    ) -> RenderResult<ExportReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let timecodes = self.settings.timecodes(&snapshot);
        let total = timecodes.len() as u64;
        self.report_progress(ExportStage::Preparing, 0, total, started);

        tracing::info!(
            start_ms = self.settings.start_ms,
            end_ms = ?self.settings.end_ms,
            frames = total,
            "Starting export"
        );

        let result = self.render(&snapshot, &timecodes, sink, started).await;
        self.compositor.release_all();

        let (rendered, missing) = match result {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(error = %e, "Export failed");
                self.report_progress(ExportStage::Failed, 0, total, started);
                return Err(e);
            }
        };

        let failed_sources: Vec<FailedSource> = self
            .compositor
            .failed_sources()
            .iter()
            .map(|(id, failure)| FailedSource {
                effect_id: id.clone(),
                source: failure.source.clone(),
                error: failure.error.to_string(),
            })
            .collect();

        let end = self.settings.end_ms.unwrap_or_else(|| snapshot.duration());
        let audio = extract_audio(&snapshot, self.settings.start_ms, end);
        self.report_progress(ExportStage::Encoding, rendered, total, started);
        sink.submit_audio(&audio)?;

        self.report_progress(ExportStage::Finalizing, rendered, total, started);
        sink.finish()?;

        let report = ExportReport {
            frames_rendered: rendered,
            total_frames: total,
            missing,
            failed_sources,
            audio_segments: audio.len(),
            started_at,
            finished_at: Utc::now(),
        };
        if !report.is_clean() {
            tracing::warn!(
                missing = report.missing.len(),
                failed_sources = report.failed_sources.len(),
                "Export finished with gaps"
            );
        }
        tracing::info!(
            frames = report.frames_rendered,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Export complete"
        );
        self.report_progress(ExportStage::Complete, rendered, total, started);
        Ok(report)
    }

    async fn render(
        &mut self,
        snapshot: &Arc<SessionSnapshot>,
        timecodes: &[Millis],
        sink: &mut dyn ExportSink,
        started: Instant,
    ) -> RenderResult<(u64, Vec<MissingFrame>)> {
        let total = timecodes.len() as u64;
        let mut rate = RateController::new(self.settings.progress_hz);
        let mut rendered = 0;
        let mut missing = Vec::new();

        for &timecode in timecodes {
            self.compositor
                .acquire_frames(
                    snapshot,
                    timecode,
                    self.settings.frame_timeout,
                    self.settings.poll_interval,
                )
                .await?;
            let composed = self.compositor.compose(snapshot, timecode, true)?;
            for effect_id in composed.missing {
                tracing::debug!(timecode, effect = %effect_id, "Export frame missing");
                missing.push(MissingFrame {
                    timecode,
                    effect_id,
                });
            }
            sink.encode_frame(timecode, &composed.draw_list)?;
            rendered += 1;

            if rate.should_tick(started.elapsed().as_nanos() as u64) {
                self.report_progress(ExportStage::Rendering, rendered, total, started);
            }
        }
        Ok((rendered, missing))
    }
}

impl std::fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSession")
            .field("settings", &self.settings)
            .field("compositor", &self.compositor)
            .finish()
    }
}
