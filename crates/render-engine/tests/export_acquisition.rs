use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use splice_common::config::EngineConfig;
use splice_decode_engine::synthetic::{SyntheticCatalog, SyntheticSource};
use splice_decode_engine::EngineContext;
use splice_render_engine::{
    Compositor, DrawSource, ExportSession, ExportSettings, ExportStage, MemorySink,
    RecordingSurface,
};
use splice_timeline_model::{Effect, EffectId, EffectKind, SessionSnapshot};
use tokio::runtime::Handle;

fn compositor(catalog: Arc<SyntheticCatalog>, snapshot: &Arc<SessionSnapshot>) -> Compositor {
    let ctx = EngineContext::new(Handle::current(), catalog.clone(), EngineConfig::default());
    let mut compositor = Compositor::new(ctx, RecordingSurface::new());
    compositor.recreate(snapshot.clone(), catalog).unwrap();
    compositor
}

fn settings(start_ms: f64, end_ms: f64) -> ExportSettings {
    ExportSettings {
        start_ms,
        end_ms: Some(end_ms),
        fps: Some(25.0),
        frame_timeout: Duration::from_millis(2_000),
        ..ExportSettings::default()
    }
}

#[tokio::test]
async fn missing_frame_is_recorded_once_and_export_continues() {
    let catalog = Arc::new(
        SyntheticCatalog::new().with(SyntheticSource::new("h", 20_000.0, 25.0).drop_frame_at(10_000.0)),
    );
    let mut snapshot = SessionSnapshot::new(1, 25.0);
    snapshot
        .effects
        .push(Effect::video("a", "h", 0, 0.0, 0.0, 20_000.0, 20_000.0));
    let snapshot = Arc::new(snapshot);

    let mut session = ExportSession::new(compositor(catalog, &snapshot), settings(9_960.0, 10_080.0));
    let mut sink = MemorySink::default();
    let started = Instant::now();
    let report = session.run(snapshot, &mut sink).await.unwrap();

    // The later frame proves the gap, so nobody waits out the timeout.
    assert!(started.elapsed() < Duration::from_millis(2_000));
    assert_eq!(report.frames_rendered, 3);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].timecode, 10_000.0);
    assert_eq!(report.missing[0].effect_id, EffectId::new("a"));
    assert!(report.failed_sources.is_empty());

    assert!(sink.finished);
    let drawn: Vec<Option<i64>> = sink
        .frames
        .iter()
        .map(|list| match list.commands.first().map(|c| &c.source) {
            Some(DrawSource::Frame(frame)) => Some(frame.timestamp_us),
            _ => None,
        })
        .collect();
    assert_eq!(drawn, vec![Some(9_960_000), None, Some(10_040_000)]);

    let ledger = session.compositor().ledger().clone();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ledger.counts().leaked, 0);
    assert_eq!(ledger.live(), 0);
}

#[tokio::test]
async fn stalled_decode_times_out_once_and_export_continues() {
    let catalog = Arc::new(
        SyntheticCatalog::new()
            .with(SyntheticSource::new("s", 1_000.0, 25.0).stall_from(80.0))
            .with(SyntheticSource::new("h", 1_000.0, 25.0)),
    );
    let mut snapshot = SessionSnapshot::new(1, 25.0);
    snapshot
        .effects
        .push(Effect::video("a", "s", 0, 0.0, 0.0, 100.0, 1_000.0));
    snapshot
        .effects
        .push(Effect::video("b", "h", 0, 120.0, 0.0, 120.0, 1_000.0));
    let snapshot = Arc::new(snapshot);

    let timeout = Duration::from_millis(300);
    let settings = ExportSettings {
        frame_timeout: timeout,
        ..settings(0.0, 240.0)
    };
    let mut session = ExportSession::new(compositor(catalog, &snapshot), settings);
    let mut sink = MemorySink::default();
    let started = Instant::now();
    let report = session.run(snapshot, &mut sink).await.unwrap();

    // Nothing later ever arrives from "a", so the frame at 80 waits it out.
    assert!(started.elapsed() >= timeout);
    assert_eq!(report.frames_rendered, 6);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].timecode, 80.0);
    assert_eq!(report.missing[0].effect_id, EffectId::new("a"));
    assert!(report.failed_sources.is_empty());

    assert!(sink.finished);
    let drawn: Vec<Option<i64>> = sink
        .frames
        .iter()
        .map(|list| match list.commands.first().map(|c| &c.source) {
            Some(DrawSource::Frame(frame)) => Some(frame.timestamp_us),
            _ => None,
        })
        .collect();
    assert_eq!(
        drawn,
        vec![Some(0), Some(40_000), None, Some(0), Some(40_000), Some(80_000)]
    );

    let ledger = session.compositor().ledger().clone();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ledger.counts().leaked, 0);
    assert_eq!(ledger.live(), 0);
}

#[tokio::test]
async fn failed_sources_and_audio_are_reported() {
    let catalog = Arc::new(SyntheticCatalog::new().with(SyntheticSource::new("h", 2_000.0, 25.0)));
    let mut snapshot = SessionSnapshot::new(2, 25.0);
    snapshot
        .effects
        .push(Effect::video("a", "h", 0, 0.0, 0.0, 400.0, 2_000.0));
    snapshot
        .effects
        .push(Effect::video("ghost", "absent", 1, 0.0, 0.0, 400.0, 2_000.0));
    let mut music = Effect::video("music", "unused", 1, 0.0, 0.0, 400.0, 2_000.0);
    music.kind = EffectKind::Audio {
        source: "music.wav".to_string(),
        volume: 1.0,
    };
    snapshot.effects.push(music);
    let snapshot = Arc::new(snapshot);

    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = stages.clone();
    let mut session = ExportSession::new(compositor(catalog, &snapshot), settings(0.0, 400.0))
        .with_progress(Box::new(move |p| seen.lock().unwrap().push(p.stage)));
    let mut sink = MemorySink::default();
    let report = session.run(snapshot, &mut sink).await.unwrap();

    assert_eq!(report.frames_rendered, 10);
    assert!(report.missing.is_empty(), "missing: {:?}", report.missing);
    assert_eq!(report.failed_sources.len(), 1);
    assert_eq!(report.failed_sources[0].effect_id, EffectId::new("ghost"));
    assert_eq!(report.audio_segments, 1);
    assert_eq!(sink.audio[0].source, "music.wav");
    assert!(report.finished_at >= report.started_at);

    let stages = stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&ExportStage::Preparing));
    assert_eq!(stages.last(), Some(&ExportStage::Complete));
    assert!(stages.contains(&ExportStage::Rendering));
}
