//! Shared setup: snapshot loading and synthetic media.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use splice_common::config::EngineConfig;
use splice_decode_engine::synthetic::{SyntheticCatalog, SyntheticSource};
use splice_decode_engine::{EngineContext, MediaCatalog};
use splice_render_engine::{Compositor, RecordingSurface};
use splice_timeline_model::{EffectKind, SessionSnapshot};

/// Load and validate a snapshot file.
pub fn load_snapshot(path: &Path) -> anyhow::Result<SessionSnapshot> {
    let snapshot = SessionSnapshot::load(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;

    let errors = snapshot.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("  - {error}");
        }
        anyhow::bail!("{} invariant violation(s) in {}", errors.len(), path.display());
    }
    Ok(snapshot)
}

/// One synthetic source per distinct video hash, long enough for every
/// effect that references it.
pub fn synthetic_catalog(snapshot: &SessionSnapshot) -> SyntheticCatalog {
    let mut durations: BTreeMap<&str, f64> = BTreeMap::new();
    for effect in &snapshot.effects {
        if let EffectKind::Video { source, .. } = &effect.kind {
            let entry = durations.entry(source.as_str()).or_insert(0.0);
            *entry = entry.max(effect.duration);
        }
    }

    let mut catalog = SyntheticCatalog::new();
    for (hash, duration_ms) in durations {
        tracing::debug!(hash, duration_ms, "Synthesizing source");
        catalog.insert(SyntheticSource::new(hash, duration_ms, snapshot.timebase));
    }
    catalog
}

/// Engine context over synthetic media for `snapshot`.
pub fn engine(snapshot: &SessionSnapshot, config: EngineConfig) -> anyhow::Result<EngineContext> {
    let media: Arc<dyn MediaCatalog> = Arc::new(synthetic_catalog(snapshot));
    EngineContext::current(media, config).context("No tokio runtime available")
}

/// A compositor recreated from `snapshot`, drawing into a recording surface.
pub fn compositor(
    snapshot: &Arc<SessionSnapshot>,
    config: EngineConfig,
) -> anyhow::Result<(Compositor, RecordingSurface)> {
    let ctx = engine(snapshot, config)?;
    let media = ctx.media.clone();
    let surface = RecordingSurface::new();
    let mut compositor = Compositor::new(ctx, surface.clone());
    compositor.recreate(snapshot.clone(), media)?;
    Ok((compositor, surface))
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_decode_engine::MediaSource;
    use splice_timeline_model::Effect;

    #[test]
    fn test_catalog_covers_every_video_source() {
        let mut snapshot = SessionSnapshot::new(2, 25.0);
        snapshot
            .effects
            .push(Effect::video("a", "shared", 0, 0.0, 0.0, 2_000.0, 4_000.0));
        snapshot
            .effects
            .push(Effect::video("b", "shared", 1, 0.0, 0.0, 2_000.0, 9_000.0));
        snapshot
            .effects
            .push(Effect::video("c", "other", 1, 2_000.0, 0.0, 1_000.0, 1_000.0));

        let catalog = synthetic_catalog(&snapshot);
        assert_eq!(catalog.len(), 2);
        let shared = catalog.get_source("shared").unwrap();
        assert!(shared.duration_ms() >= 9_000.0);
        assert!(catalog.get_source("missing").is_none());
    }

    #[test]
    fn test_demo_snapshot_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/crossfade.json");
        let snapshot = load_snapshot(&path).unwrap();
        assert_eq!(snapshot.effects.len(), 4);
        assert_eq!(synthetic_catalog(&snapshot).len(), 2);
    }
}
