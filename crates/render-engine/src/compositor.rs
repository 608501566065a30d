//! Compositor: reconciles the active set into nodes and draws them.
//!
//! Each compose reads one snapshot, diffs its active set against the
//! previous call, creates and destroys nodes (and their decode managers),
//! then builds one [`DrawList`] and submits it in a single draw call.
//! Frames taken from a decode manager are drawn and then released.
//!
//! A video node keeps the frame it last drew as its texture and only asks
//! for a new frame when the media time it needs moves further than the
//! lookup tolerance from that texture. While paused this keeps the node
//! from hammering the decoder with misses for a frame it already shows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use splice_common::clock::Millis;
use splice_decode_engine::{
    ms_to_us, DecodeError, DecodeManager, DecodeStats, EngineContext, FrameLedger, FrameRef,
    MediaCatalog, SeekOutcome, VideoFrame,
};
use splice_timeline_model::{
    active_effects, demux_window, diff_active, effect_padding, media_time_at, paint_order, Effect,
    EffectId, EffectKind, SessionSnapshot,
};

use crate::draw::{DrawCommand, DrawList, DrawSource, RenderSurface};
use crate::error::{RenderError, RenderResult};
use crate::overlay::effect_transform;
use crate::scene::{Node, NodeKind, SceneGraph};

/// Outcome of one compose.
#[derive(Debug, Clone)]
pub struct ComposeReport {
    pub timecode: Millis,
    pub added: Vec<EffectId>,
    pub removed: Vec<EffectId>,
    /// Visible video effects with no frame to draw.
    pub missing: Vec<EffectId>,
    /// Video effects drawn with a texture that lags the needed frame.
    pub stale: Vec<EffectId>,
    pub draw_list: DrawList,
}

/// Outcome of a compositor seek.
#[derive(Debug, Clone)]
pub struct SeekReport {
    pub timecode: Millis,
    pub continued: usize,
    pub restarted: usize,
    pub ignored: usize,
    /// Present when the seek asked for a redraw.
    pub redraw: Option<ComposeReport>,
}

/// A source that could not be resolved or decoded for one effect.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    /// Hash the effect referenced when it failed.
    pub source: Option<String>,
    pub error: DecodeError,
}

pub struct Compositor {
    ctx: EngineContext,
    surface: Box<dyn RenderSurface>,
    scene: SceneGraph,
    managers: HashMap<EffectId, DecodeManager>,
    /// Frames acquired for export, consumed by the next compose.
    pending: HashMap<EffectId, VideoFrame>,
    /// Cleared when the effect leaves the snapshot or points at a new source.
    failed: BTreeMap<EffectId, SourceFailure>,
    active: Vec<EffectId>,
    snapshot: Option<Arc<SessionSnapshot>>,
    ready: bool,
}

impl Compositor {
    pub fn new(ctx: EngineContext, surface: impl RenderSurface + 'static) -> Self {
        Self {
            ctx,
            surface: Box::new(surface),
            scene: SceneGraph::new(),
            managers: HashMap::new(),
            pending: HashMap::new(),
            failed: BTreeMap::new(),
            active: Vec::new(),
            snapshot: None,
            ready: false,
        }
    }

    /// Whether [`Compositor::recreate`] has completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn ledger(&self) -> &Arc<FrameLedger> {
        &self.ctx.ledger
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn snapshot(&self) -> Option<&Arc<SessionSnapshot>> {
        self.snapshot.as_ref()
    }

    /// Active visual effects as of the last reconcile.
    pub fn active(&self) -> &[EffectId] {
        &self.active
    }

    pub fn manager(&self, id: &EffectId) -> Option<&DecodeManager> {
        self.managers.get(id)
    }

    /// Per-effect decode counters, sorted by effect id.
    pub fn stats(&self) -> Vec<(EffectId, DecodeStats)> {
        let mut stats: Vec<_> = self
            .managers
            .iter()
            .map(|(id, m)| (id.clone(), m.stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    /// Effects whose source could not be resolved or decoded.
    pub fn failed_sources(&self) -> &BTreeMap<EffectId, SourceFailure> {
        &self.failed
    }

    /// Front-most effect under a normalized canvas point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<EffectId> {
        self.scene.hit_test(x, y)
    }

    /// Rebuild every node from a persisted snapshot and open the ready gate.
    pub fn recreate(
        &mut self,
        snapshot: Arc<SessionSnapshot>,
        media: Arc<dyn MediaCatalog>,
    ) -> RenderResult<()> {
        let errors = snapshot.validate();
        if !errors.is_empty() {
            return Err(RenderError::InvalidSnapshot(errors));
        }

        self.release_all();
        self.failed.clear();
        self.ctx.media = media;

        let (added, _) = self.reconcile(&snapshot, snapshot.timecode);
        tracing::info!(
            version = snapshot.version,
            timecode = snapshot.timecode,
            nodes = added.len(),
            failed = self.failed.len(),
            "Scene recreated"
        );
        self.snapshot = Some(snapshot);
        self.ready = true;
        Ok(())
    }

    /// Adopt a newer snapshot for the next [`Compositor::seek`].
    pub fn sync(&mut self, snapshot: Arc<SessionSnapshot>) {
        if self.ready {
            self.snapshot = Some(snapshot);
        }
    }

    /// Drain worker events for every manager without drawing.
    pub fn pump(&mut self) -> usize {
        let arrived = self.managers.values_mut().map(|m| m.pump()).sum();
        self.collect_failures();
        arrived
    }

    /// Reconcile the scene for `timecode` and draw it.
    ///
    /// Preview (`exporting == false`) never waits: a video node without a
    /// new frame keeps drawing its current texture, or is skipped if it has
    /// none. Export draws only frames that match `timecode`.
    pub fn compose(
        &mut self,
        snapshot: &Arc<SessionSnapshot>,
        timecode: Millis,
        exporting: bool,
    ) -> RenderResult<ComposeReport> {
        if !self.ready {
            return Err(RenderError::NotReady);
        }
        let (added, removed) = self.reconcile(snapshot, timecode);

        let track_count = snapshot.track_count();
        let mut commands = Vec::new();
        let mut missing = Vec::new();
        let mut stale = Vec::new();
        let mut drawn_frames = Vec::new();

        for effect in active_effects(snapshot, timecode) {
            let Some(transform) = effect_transform(snapshot, effect, timecode) else {
                continue;
            };
            let visible = snapshot.track_of(effect).visible;
            let z = paint_order(track_count, effect.track);
            let filters = snapshot
                .filters_for(&effect.id)
                .map(|f| f.op.normalized())
                .filter(|op| !op.is_noop())
                .collect::<Vec<_>>();

            let source = if !visible {
                None
            } else {
                match &effect.kind {
                    EffectKind::Video { .. } => {
                        let frame = self.video_texture(snapshot, effect, timecode, exporting);
                        match frame {
                            Texture::Fresh(frame) => {
                                let source = DrawSource::Frame(frame.to_ref());
                                drawn_frames.push(frame);
                                Some(source)
                            }
                            Texture::Retained { frame, current } => {
                                if !current {
                                    stale.push(effect.id.clone());
                                }
                                Some(DrawSource::Frame(frame))
                            }
                            Texture::Missing => {
                                missing.push(effect.id.clone());
                                None
                            }
                            Texture::Failed => None,
                        }
                    }
                    EffectKind::Image { source, .. } => Some(DrawSource::Image {
                        source: source.clone(),
                    }),
                    EffectKind::Text { text, style, .. } => Some(DrawSource::Text {
                        text: text.clone(),
                        style: style.clone(),
                    }),
                    EffectKind::Audio { .. } => None,
                }
            };

            if let Some(node) = self.scene.get_mut(&effect.id) {
                node.z = z;
                node.transform = transform;
                node.visible = visible;
            }
            if let Some(source) = source {
                commands.push(DrawCommand {
                    effect_id: effect.id.clone(),
                    z,
                    transform,
                    source,
                    filters,
                });
            }
        }

        let draw_list = DrawList::new(timecode, commands);
        let drawn = self.surface.draw(&draw_list);
        for frame in drawn_frames {
            frame.release();
        }
        drawn?;

        self.snapshot = Some(snapshot.clone());
        tracing::debug!(
            timecode,
            exporting,
            commands = draw_list.len(),
            added = added.len(),
            removed = removed.len(),
            missing = missing.len(),
            "Composed frame"
        );
        Ok(ComposeReport {
            timecode,
            added,
            removed,
            missing,
            stale,
            draw_list,
        })
    }

    /// Move every active decode manager to `timecode` using its seek policy.
    pub fn seek(&mut self, timecode: Millis, redraw: bool) -> RenderResult<SeekReport> {
        if !self.ready {
            return Err(RenderError::NotReady);
        }
        let Some(snapshot) = self.snapshot.clone() else {
            return Err(RenderError::NotReady);
        };
        self.reconcile(&snapshot, timecode);

        let mut report = SeekReport {
            timecode,
            continued: 0,
            restarted: 0,
            ignored: 0,
            redraw: None,
        };
        for id in self.active.clone() {
            let Some(effect) = snapshot.effect(&id) else {
                continue;
            };
            let media_ms = media_time_at(effect, timecode);
            // The node already shows this frame; decoding carries on from it.
            if self.texture_matches(&id, media_ms) {
                report.continued += 1;
                continue;
            }
            let Some(manager) = self.managers.get_mut(&id) else {
                continue;
            };
            match manager.seek(media_ms) {
                SeekOutcome::Continued => report.continued += 1,
                SeekOutcome::Restarted => report.restarted += 1,
                SeekOutcome::Ignored => report.ignored += 1,
            }
        }
        self.collect_failures();
        tracing::debug!(
            timecode,
            continued = report.continued,
            restarted = report.restarted,
            "Compositor seek"
        );

        if redraw {
            report.redraw = Some(self.compose(&snapshot, timecode, false)?);
        }
        Ok(report)
    }

    /// Wait (bounded) for every visible video frame needed at `timecode`.
    /// Returns the effects whose frame did not arrive in time.
    pub async fn acquire_frames(
        &mut self,
        snapshot: &Arc<SessionSnapshot>,
        timecode: Millis,
        timeout: Duration,
        poll_interval: Duration,
    ) -> RenderResult<Vec<EffectId>> {
        if !self.ready {
            return Err(RenderError::NotReady);
        }
        self.reconcile(snapshot, timecode);

        let mut missing = Vec::new();
        for effect in active_effects(snapshot, timecode) {
            if !effect.is_video() || !snapshot.track_of(effect).visible {
                continue;
            }
            let media_ms = media_time_at(effect, timecode);
            if self.texture_matches(&effect.id, media_ms) {
                continue;
            }
            let Some(manager) = self.managers.get_mut(&effect.id) else {
                continue;
            };
            match manager.acquire(media_ms, timeout, poll_interval).await {
                Some(frame) => {
                    if let Some(stale) = self.pending.insert(effect.id.clone(), frame) {
                        stale.release();
                    }
                }
                None => missing.push(effect.id.clone()),
            }
        }
        self.collect_failures();
        missing.retain(|id| !self.failed.contains_key(id));
        Ok(missing)
    }

    /// Tear down every node and decode manager. The ready gate stays open;
    /// the next compose rebuilds what is active.
    pub fn release_all(&mut self) {
        for (_, frame) in self.pending.drain() {
            frame.release();
        }
        for (_, mut manager) in self.managers.drain() {
            manager.teardown();
        }
        self.scene.clear();
        self.active.clear();
    }

    fn texture_matches(&self, id: &EffectId, media_ms: Millis) -> bool {
        let (Some(node), Some(manager)) = (self.scene.get(id), self.managers.get(id)) else {
            return false;
        };
        node.texture
            .as_ref()
            .is_some_and(|t| (t.timestamp_us - ms_to_us(media_ms)).abs() <= manager.tolerance_us())
    }

    fn video_texture(
        &mut self,
        snapshot: &SessionSnapshot,
        effect: &Effect,
        timecode: Millis,
        exporting: bool,
    ) -> Texture {
        if self.failed.contains_key(&effect.id) {
            return Texture::Failed;
        }
        let media_ms = media_time_at(effect, timecode);

        let fresh = match self.pending.remove(&effect.id) {
            Some(frame) => Some(frame),
            None if self.texture_matches(&effect.id, media_ms) => None,
            None => {
                let Some(manager) = self.managers.get_mut(&effect.id) else {
                    return Texture::Missing;
                };
                let frame = manager.take_frame(media_ms);
                if snapshot.is_playing && !exporting {
                    manager.prune_behind(media_ms);
                }
                if let Some(err) = manager.failure().cloned() {
                    let source = manager.source_id().to_string();
                    self.fail(&effect.id, Some(source), err);
                    return Texture::Failed;
                }
                if frame.is_none() {
                    return self.retained(&effect.id, media_ms, exporting);
                }
                frame
            }
        };

        let Some(node) = self.scene.get_mut(&effect.id) else {
            if let Some(frame) = fresh {
                frame.release();
            }
            return Texture::Missing;
        };
        match fresh {
            Some(frame) => {
                node.texture = Some(frame.to_ref());
                Texture::Fresh(frame)
            }
            None => match node.texture.clone() {
                Some(frame) => Texture::Retained {
                    frame,
                    current: true,
                },
                None => Texture::Missing,
            },
        }
    }

    /// Fallback after a miss: preview keeps showing the current texture.
    fn retained(&self, id: &EffectId, media_ms: Millis, exporting: bool) -> Texture {
        let current = self.texture_matches(id, media_ms);
        if exporting && !current {
            return Texture::Missing;
        }
        match self.scene.get(id).and_then(|n| n.texture.clone()) {
            Some(frame) => Texture::Retained { frame, current },
            None => Texture::Missing,
        }
    }

    /// Diff the active set at `timecode` against the last one and create or
    /// destroy nodes and managers to match.
    fn reconcile(
        &mut self,
        snapshot: &SessionSnapshot,
        timecode: Millis,
    ) -> (Vec<EffectId>, Vec<EffectId>) {
        let active: Vec<&Effect> = active_effects(snapshot, timecode)
            .into_iter()
            .filter(|e| e.is_visual())
            .collect();
        let ids: Vec<EffectId> = active.iter().map(|e| e.id.clone()).collect();
        let diff = diff_active(&self.active, &ids);

        self.failed.retain(|id, failure| {
            let same_source = snapshot
                .effect(id)
                .is_some_and(|e| e.source_hash() == failure.source.as_deref());
            if !same_source {
                tracing::debug!(effect = %id, "Source changed; clearing failure");
            }
            same_source
        });

        for id in &diff.removed {
            self.destroy_node(id);
        }

        let track_count = snapshot.track_count();
        for effect in active {
            let kind = match effect.kind {
                EffectKind::Video { .. } => NodeKind::Video,
                EffectKind::Image { .. } => NodeKind::Image,
                EffectKind::Text { .. } => NodeKind::Text,
                EffectKind::Audio { .. } => continue,
            };
            let needs_node = self.scene.get(&effect.id).map_or(true, |n| n.kind != kind);
            if needs_node {
                self.destroy_node(&effect.id);
                let z = paint_order(track_count, effect.track);
                self.scene.insert(Node::new(effect.id.clone(), kind, z));
            }
            if kind == NodeKind::Video {
                self.ensure_manager(snapshot, effect, timecode);
            }
        }

        self.active = ids;
        (diff.added, diff.removed)
    }

    /// Start a manager for a video effect, or restart one whose demux window
    /// no longer matches the snapshot.
    fn ensure_manager(&mut self, snapshot: &SessionSnapshot, effect: &Effect, timecode: Millis) {
        if self.failed.contains_key(&effect.id) {
            return;
        }
        let padding = effect_padding(snapshot, &effect.id);
        let window = demux_window(effect, padding);
        match self.managers.get_mut(&effect.id) {
            Some(m) if m.window() == window && Some(m.source_id()) == effect.source_hash() => {
                return
            }
            Some(m) => {
                tracing::debug!(effect = %effect.id, "Effect edited; replacing decode manager");
                m.teardown();
                self.managers.remove(&effect.id);
                if let Some(node) = self.scene.get_mut(&effect.id) {
                    node.texture = None;
                }
            }
            None => {}
        }

        let media_ms = media_time_at(effect, timecode);
        match DecodeManager::start(&self.ctx, effect, padding, snapshot.timebase, media_ms) {
            Ok(manager) => {
                self.managers.insert(effect.id.clone(), manager);
            }
            Err(err) => {
                let source = effect.source_hash().map(str::to_string);
                self.fail(&effect.id, source, err);
            }
        }
    }

    fn destroy_node(&mut self, id: &EffectId) {
        if let Some(frame) = self.pending.remove(id) {
            frame.release();
        }
        if let Some(mut manager) = self.managers.remove(id) {
            manager.teardown();
        }
        self.scene.remove(id);
    }

    fn fail(&mut self, id: &EffectId, source: Option<String>, error: DecodeError) {
        tracing::warn!(effect = %id, source = ?source, error = %error, "Skipping effect with failed source");
        if let Some(mut manager) = self.managers.remove(id) {
            manager.teardown();
        }
        if let Some(frame) = self.pending.remove(id) {
            frame.release();
        }
        self.failed
            .insert(id.clone(), SourceFailure { source, error });
    }

    fn collect_failures(&mut self) {
        let failed: Vec<(EffectId, String, DecodeError)> = self
            .managers
            .iter()
            .filter_map(|(id, m)| {
                m.failure()
                    .map(|err| (id.clone(), m.source_id().to_string(), err.clone()))
            })
            .collect();
        for (id, source, err) in failed {
            self.fail(&id, Some(source), err);
        }
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("ready", &self.ready)
            .field("active", &self.active)
            .field("managers", &self.managers.len())
            .field("failed", &self.failed.keys().collect::<Vec<_>>())
            .finish()
    }
}

enum Texture {
    /// Newly taken frame; drawn this compose and then released.
    Fresh(VideoFrame),
    /// The node's current texture; `current` when it matches the needed
    /// media time.
    Retained { frame: FrameRef, current: bool },
    Missing,
    Failed,
}
