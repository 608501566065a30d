//! Temporal queries: what is visible, and with what padding, at a timecode.
//!
//! Everything here is a pure function of a snapshot. Visibility and demux
//! windows are both derived from [`effect_padding`], which keeps the
//! compositor and the decoder in lock-step during transitions.

use std::collections::HashSet;

use splice_common::clock::Millis;

use crate::effect::{Effect, EffectId};
use crate::snapshot::SessionSnapshot;
use crate::transition::Padding;

/// Media-time range (effect-relative, ms) a decoder must cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaWindow {
    pub start_ms: Millis,
    pub end_ms: Millis,
}

impl MediaWindow {
    pub fn contains(&self, media_ms: Millis) -> bool {
        media_ms >= self.start_ms && media_ms <= self.end_ms
    }

    pub fn len(&self) -> Millis {
        (self.end_ms - self.start_ms).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }
}

/// Effects entering and leaving the active set between two ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveDiff {
    pub added: Vec<EffectId>,
    pub removed: Vec<EffectId>,
    pub retained: Vec<EffectId>,
}

impl ActiveDiff {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Padding transitions contribute to `id`. Overlapping contributions on one
/// side take the largest.
pub fn effect_padding(snapshot: &SessionSnapshot, id: &EffectId) -> Padding {
    snapshot
        .transitions_for(id)
        .map(|t| t.padding_for(id))
        .fold(Padding::NONE, |acc, p| Padding {
            incoming: acc.incoming.max(p.incoming),
            outgoing: acc.outgoing.max(p.outgoing),
        })
}

/// Inclusive timeline window during which `effect` is visible.
pub fn visibility_window(effect: &Effect, padding: Padding) -> (Millis, Millis) {
    (
        effect.start_at_position - padding.incoming,
        effect.timeline_end() + padding.outgoing,
    )
}

/// Whether `effect` is active at `timecode`. Both bounds are inclusive so a
/// cut point never drops a tick; zero-duration effects are never active.
pub fn is_active(effect: &Effect, padding: Padding, timecode: Millis) -> bool {
    if effect.is_empty() {
        return false;
    }
    let (lo, hi) = visibility_window(effect, padding);
    lo <= timecode && timecode <= hi
}

/// All effects active at `timecode`, ordered by track index (0 = front-most),
/// then by timeline position and id.
pub fn active_effects(snapshot: &SessionSnapshot, timecode: Millis) -> Vec<&Effect> {
    let mut active: Vec<&Effect> = snapshot
        .effects
        .iter()
        .filter(|e| is_active(e, effect_padding(snapshot, &e.id), timecode))
        .collect();
    active.sort_by(|a, b| {
        a.track
            .cmp(&b.track)
            .then(a.start_at_position.total_cmp(&b.start_at_position))
            .then_with(|| a.id.cmp(&b.id))
    });
    active
}

/// Ids of [`active_effects`], in the same order.
pub fn active_ids(snapshot: &SessionSnapshot, timecode: Millis) -> Vec<EffectId> {
    active_effects(snapshot, timecode)
        .into_iter()
        .map(|e| e.id.clone())
        .collect()
}

/// Effect-relative media time shown at timeline `timecode`.
///
/// Inside transition padding this runs past the trim points, clamped to the
/// source media bounds.
pub fn media_time_at(effect: &Effect, timecode: Millis) -> Millis {
    (effect.start + (timecode - effect.start_at_position)).clamp(0.0, effect.duration.max(0.0))
}

/// Media range a decoder must cover for `effect`, padding included.
pub fn demux_window(effect: &Effect, padding: Padding) -> MediaWindow {
    let duration = effect.duration.max(0.0);
    MediaWindow {
        start_ms: (effect.start - padding.incoming).clamp(0.0, duration),
        end_ms: (effect.end + padding.outgoing).clamp(0.0, duration),
    }
}

/// Diff two active sets. `retained` keeps the order of `next`.
pub fn diff_active(prev: &[EffectId], next: &[EffectId]) -> ActiveDiff {
    let prev_set: HashSet<&EffectId> = prev.iter().collect();
    let next_set: HashSet<&EffectId> = next.iter().collect();

    let mut diff = ActiveDiff::default();
    for id in next {
        if prev_set.contains(id) {
            diff.retained.push(id.clone());
        } else {
            diff.added.push(id.clone());
        }
    }
    diff.removed = prev
        .iter()
        .filter(|id| !next_set.contains(id))
        .cloned()
        .collect();
    diff
}
