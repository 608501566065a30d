//! Export a snapshot range as newline-delimited JSON draw lists.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use splice_common::config::EngineConfig;
use splice_render_engine::{ExportProgress, ExportSession, ExportSettings, ExportStage, JsonLinesSink};

use crate::session;

pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    start_ms: f64,
    end_ms: Option<f64>,
    fps: Option<f64>,
    config: EngineConfig,
) -> anyhow::Result<()> {
    eprintln!("Exporting snapshot at: {}", path.display());

    let snapshot = Arc::new(session::load_snapshot(&path)?);
    let settings = ExportSettings {
        start_ms,
        end_ms,
        fps,
        ..ExportSettings::from_config(&config)
    };
    let total = settings.timecodes(&snapshot).len();
    let end = end_ms.unwrap_or_else(|| snapshot.duration());
    eprintln!("  Range: {start_ms:.1} .. {end:.1} ms ({total} frames)");

    let out: Box<dyn Write + Send> = match &output {
        Some(file) => {
            eprintln!("  Output: {}", file.display());
            let file = File::create(file)
                .with_context(|| format!("Failed to create {}", file.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut sink = JsonLinesSink::new(out);

    let (compositor, _surface) = session::compositor(&snapshot, config)?;
    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = Box::new(|p| {
        if p.stage == ExportStage::Rendering {
            eprint!(
                "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
                p.eta_secs,
            );
        }
    });
    let mut session = ExportSession::new(compositor, settings).with_progress(progress_cb);

    let report = match session.run(snapshot, &mut sink).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("\nExport failed: {e}");
            return Err(e.into());
        }
    };

    eprintln!(
        "\nExport complete: {}/{} frames, {} audio segment(s) in {:.2}s",
        report.frames_rendered,
        report.total_frames,
        report.audio_segments,
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0,
    );
    if !report.is_clean() {
        eprintln!("\nGaps:");
        for missing in &report.missing {
            eprintln!("  - {} missing at {:.1} ms", missing.effect_id, missing.timecode);
        }
        for failed in &report.failed_sources {
            let source = failed.source.as_deref().unwrap_or("-");
            eprintln!("  - {} ({source}) failed: {}", failed.effect_id, failed.error);
        }
    }

    let leaked = session.compositor().ledger().live();
    if leaked > 0 {
        tracing::warn!(leaked, "Frames still alive after export");
    }

    Ok(())
}
