//! Headless preview: run the render loop for a fixed wall-clock time.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use splice_common::config::EngineConfig;
use splice_render_engine::{Compositor, Player, RecordingSurface, RenderLoop, SessionStore};

use crate::session;

pub async fn run(
    path: PathBuf,
    duration_ms: u64,
    seek: Option<f64>,
    rate: f64,
    config: EngineConfig,
) -> anyhow::Result<()> {
    let snapshot = session::load_snapshot(&path)?;
    let refresh_hz = config.refresh_hz;
    let ctx = session::engine(&snapshot, config)?;
    let media = ctx.media.clone();
    let surface = RecordingSurface::new();

    let store = SessionStore::new(snapshot);
    let _logger = store.subscribe(|snapshot| {
        tracing::trace!(version = snapshot.version, timecode = snapshot.timecode, "Snapshot");
    });

    let mut player = Player::new(store, Compositor::new(ctx, surface.clone()));
    let now = Instant::now();
    player.recreate(media, now)?;
    player.set_rate(rate);
    if let Some(target) = seek {
        let report = player.seek(target, now)?;
        println!(
            "Seek to {target:.1} ms: {} continued, {} restarted",
            report.continued, report.restarted
        );
    }
    player.play(now)?;

    println!(
        "Previewing {} for {duration_ms} ms at {refresh_hz} Hz",
        path.display()
    );

    let mut render_loop = RenderLoop::new(player, refresh_hz);
    let stop = render_loop.stop_flag();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        stop.store(true, Ordering::SeqCst);
    });
    let stats = render_loop.run().await;

    let mut player = render_loop.into_player();
    println!("  State: {:?} at {:.1} ms", player.state(), player.position());
    println!(
        "  Ticks: {} ({} composed, {} with missing frames, {} errors)",
        stats.ticks, stats.frames_composed, stats.ticks_with_missing, stats.errors
    );
    println!("  Draw calls: {}", surface.draw_calls());
    for (id, s) in player.compositor().stats() {
        println!(
            "  {id}: {} received, {:.1}% hit rate, {} restarts",
            s.frames_received,
            s.hit_rate(),
            s.restarts
        );
    }
    player.stop(Instant::now())?;
    let counts = player.compositor().ledger().counts();
    println!(
        "  Frames: {} created, {} released, {} live",
        counts.created,
        counts.released,
        counts.live()
    );

    Ok(())
}
