//! Show what a snapshot composes to at one timecode.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use splice_common::config::EngineConfig;
use splice_render_engine::overlay::effect_transform;
use splice_render_engine::DrawSource;
use splice_timeline_model::{active_effects, effect_padding, media_time_at};

use crate::session;

pub async fn run(path: PathBuf, at: Option<f64>, config: EngineConfig) -> anyhow::Result<()> {
    let snapshot = Arc::new(session::load_snapshot(&path)?);
    let timecode = at.unwrap_or(snapshot.timecode).max(0.0);

    println!("Snapshot: {}", path.display());
    println!("  Version: {}", snapshot.version);
    println!("  Timebase: {} fps", snapshot.timebase);
    println!("  Duration: {:.1} ms", snapshot.duration());
    println!(
        "  Tracks: {} ({} locked, {} hidden, {} muted)",
        snapshot.track_count(),
        snapshot.tracks.iter().filter(|t| t.locked).count(),
        snapshot.tracks.iter().filter(|t| !t.visible).count(),
        snapshot.tracks.iter().filter(|t| t.muted).count(),
    );
    println!(
        "  Effects: {}  Transitions: {}  Animations: {}  Filters: {}",
        snapshot.effects.len(),
        snapshot.transitions.len(),
        snapshot.animations.len(),
        snapshot.filters.len(),
    );
    println!();

    let active = active_effects(&snapshot, timecode);
    println!("Active at {timecode:.1} ms: {}", active.len());
    for effect in &active {
        let padding = effect_padding(&snapshot, &effect.id);
        print!(
            "  [{}] {} ({}) media {:.1} ms",
            effect.track,
            effect.id,
            effect.kind_name(),
            media_time_at(effect, timecode)
        );
        if padding.incoming > 0.0 || padding.outgoing > 0.0 {
            print!(" pad -{:.0}/+{:.0}", padding.incoming, padding.outgoing);
        }
        if let Some(t) = effect_transform(&snapshot, effect, timecode) {
            print!(
                " rect ({:.3}, {:.3}, {:.3}, {:.3}) rot {:.1} opacity {:.2}",
                t.rect.x, t.rect.y, t.rect.w, t.rect.h, t.rotation_deg, t.opacity
            );
        }
        println!();
    }
    println!();

    let timeout = Duration::from_millis(config.export.frame_timeout_ms);
    let poll = Duration::from_millis(config.export.poll_interval_ms.max(1));
    let (mut compositor, _surface) = session::compositor(&snapshot, config)?;
    let late = compositor
        .acquire_frames(&snapshot, timecode, timeout, poll)
        .await?;
    let report = compositor.compose(&snapshot, timecode, true)?;

    println!("Draw list ({} commands, back to front):", report.draw_list.len());
    for cmd in &report.draw_list.commands {
        let what = match &cmd.source {
            DrawSource::Frame(frame) => format!(
                "frame {} @ {} us ({}x{})",
                frame.source_id, frame.timestamp_us, frame.width, frame.height
            ),
            DrawSource::Image { source } => format!("image {source}"),
            DrawSource::Text { text, .. } => format!("text {text:?}"),
        };
        println!("  z={} {}: {what}", cmd.z, cmd.effect_id);
        for filter in &cmd.filters {
            println!("      filter {filter:?}");
        }
    }

    if !late.is_empty() {
        println!("\nFrames not acquired in time: {late:?}");
    }
    for (id, failure) in compositor.failed_sources() {
        let source = failure.source.as_deref().unwrap_or("-");
        println!("Failed source {source} for {id}: {}", failure.error);
    }

    compositor.release_all();
    Ok(())
}
