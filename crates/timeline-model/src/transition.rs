//! Transitions between temporally adjacent effects on one track.
//!
//! A transition extends the visibility of both effects it references:
//! the outgoing effect stays visible `outgoing_ms` past its end, and the
//! incoming effect becomes visible `incoming_ms` before its start. The same
//! padding widens each effect's demux window, so visibility and decode
//! coverage cannot drift apart.

use serde::{Deserialize, Serialize};
use splice_common::clock::Millis;

use crate::effect::{Effect, EffectId};

/// A transition between two adjacent effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,

    /// Visual treatment.
    #[serde(default)]
    pub kind: TransitionKind,

    /// The earlier effect, fading/sliding out.
    pub outgoing: EffectId,

    /// The later effect, fading/sliding in.
    pub incoming: EffectId,

    /// Padding before the incoming effect's start (ms).
    pub incoming_ms: Millis,

    /// Padding after the outgoing effect's end (ms).
    pub outgoing_ms: Millis,
}

/// Transition treatments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Linear opacity cross-fade.
    #[default]
    CrossFade,
    /// Cross-fade with an ease-in-out curve.
    Dissolve,
    /// Incoming slides in from the right, pushing the outgoing left.
    SlideLeft,
    /// Incoming slides in from the left, pushing the outgoing right.
    SlideRight,
}

/// Visibility/demux padding contributed by transitions to one effect.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Padding {
    /// Extension before the effect's timeline start (ms).
    pub incoming: Millis,
    /// Extension after the effect's timeline end (ms).
    pub outgoing: Millis,
}

impl Padding {
    pub const NONE: Padding = Padding {
        incoming: 0.0,
        outgoing: 0.0,
    };
}

impl Transition {
    /// Total length of the transition (ms).
    pub fn duration(&self) -> Millis {
        self.incoming_ms.max(0.0) + self.outgoing_ms.max(0.0)
    }

    /// Whether this transition references `id` on either side.
    pub fn references(&self, id: &EffectId) -> bool {
        &self.outgoing == id || &self.incoming == id
    }

    /// Padding this transition contributes to `id`.
    pub fn padding_for(&self, id: &EffectId) -> Padding {
        let mut padding = Padding::NONE;
        if &self.incoming == id {
            padding.incoming = self.incoming_ms.max(0.0);
        }
        if &self.outgoing == id {
            padding.outgoing = self.outgoing_ms.max(0.0);
        }
        padding
    }

    /// Timeline window `[start, end]` during which both sides are blended.
    pub fn window(&self, outgoing: &Effect, incoming: &Effect) -> (Millis, Millis) {
        let start = incoming.start_at_position - self.incoming_ms.max(0.0);
        let end = outgoing.timeline_end() + self.outgoing_ms.max(0.0);
        (start.min(end), end.max(start))
    }

    /// Normalized progress through the window at `timecode`, or `None`
    /// outside it. A zero-length window reports full progress.
    pub fn progress(&self, outgoing: &Effect, incoming: &Effect, timecode: Millis) -> Option<f64> {
        let (start, end) = self.window(outgoing, incoming);
        if timecode < start || timecode > end {
            return None;
        }
        let len = end - start;
        if len <= 0.0 {
            return Some(1.0);
        }
        Some(((timecode - start) / len).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Effect, Effect, Transition) {
        let a = Effect::video("a", "ha", 0, 0.0, 0.0, 2_000.0, 2_000.0);
        let b = Effect::video("b", "hb", 0, 2_000.0, 0.0, 2_000.0, 2_000.0);
        let t = Transition {
            id: "t1".to_string(),
            kind: TransitionKind::CrossFade,
            outgoing: a.id.clone(),
            incoming: b.id.clone(),
            incoming_ms: 250.0,
            outgoing_ms: 250.0,
        };
        (a, b, t)
    }

    #[test]
    fn test_padding_goes_to_the_right_side() {
        let (a, b, t) = pair();
        assert_eq!(
            t.padding_for(&a.id),
            Padding {
                incoming: 0.0,
                outgoing: 250.0
            }
        );
        assert_eq!(
            t.padding_for(&b.id),
            Padding {
                incoming: 250.0,
                outgoing: 0.0
            }
        );
        assert_eq!(t.padding_for(&EffectId::new("other")), Padding::NONE);
    }

    #[test]
    fn test_window_spans_the_cut() {
        let (a, b, t) = pair();
        assert_eq!(t.window(&a, &b), (1_750.0, 2_250.0));
        assert_eq!(t.duration(), 500.0);
    }

    #[test]
    fn test_progress_is_normalized() {
        let (a, b, t) = pair();
        assert_eq!(t.progress(&a, &b, 1_750.0), Some(0.0));
        assert_eq!(t.progress(&a, &b, 2_000.0), Some(0.5));
        assert_eq!(t.progress(&a, &b, 2_250.0), Some(1.0));
        assert_eq!(t.progress(&a, &b, 2_300.0), None);
    }
}
