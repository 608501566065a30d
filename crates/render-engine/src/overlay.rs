//! Transition and animation overlay.
//!
//! Everything here is a pure function of `(snapshot, effect, timecode)`.
//! The compositor layers the result over the effect's static transform.

use splice_common::clock::Millis;
use splice_timeline_model::{
    animation_delta, Easing, Effect, SessionSnapshot, Transform, TransformDelta, TransitionKind,
};

/// What a transition does to one side at a given progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideModification {
    /// Opacity multiplier.
    pub opacity: f64,
    /// Horizontal offset in canvas widths.
    pub offset_x: f64,
}

impl SideModification {
    pub const NONE: SideModification = SideModification {
        opacity: 1.0,
        offset_x: 0.0,
    };

    pub fn to_delta(self) -> TransformDelta {
        TransformDelta {
            dx: self.offset_x,
            opacity: self.opacity,
            ..TransformDelta::IDENTITY
        }
    }
}

/// Complementary modifications for both sides of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSides {
    pub outgoing: SideModification,
    pub incoming: SideModification,
}

/// Evaluate a transition kind at `progress` (clamped to `[0, 1]`).
pub fn evaluate_transition(kind: TransitionKind, progress: f64) -> TransitionSides {
    let p = progress.clamp(0.0, 1.0);
    match kind {
        TransitionKind::CrossFade => fade(p),
        TransitionKind::Dissolve => fade(Easing::EaseInOut.apply(p)),
        TransitionKind::SlideLeft => slide(p, -1.0),
        TransitionKind::SlideRight => slide(p, 1.0),
    }
}

fn fade(p: f64) -> TransitionSides {
    TransitionSides {
        outgoing: SideModification {
            opacity: 1.0 - p,
            offset_x: 0.0,
        },
        incoming: SideModification {
            opacity: p,
            offset_x: 0.0,
        },
    }
}

/// The outgoing side leaves towards `direction`; the incoming side enters
/// from the opposite edge.
fn slide(p: f64, direction: f64) -> TransitionSides {
    TransitionSides {
        outgoing: SideModification {
            opacity: 1.0,
            offset_x: direction * p,
        },
        incoming: SideModification {
            opacity: 1.0,
            offset_x: -direction * (1.0 - p),
        },
    }
}

/// Combined transition delta for `effect` at `timecode`.
pub fn transition_delta(snapshot: &SessionSnapshot, effect: &Effect, timecode: Millis) -> TransformDelta {
    snapshot
        .transitions_for(&effect.id)
        .filter_map(|transition| {
            let outgoing = snapshot.effect(&transition.outgoing)?;
            let incoming = snapshot.effect(&transition.incoming)?;
            let progress = transition.progress(outgoing, incoming, timecode)?;
            let sides = evaluate_transition(transition.kind, progress);
            let side = if transition.outgoing == effect.id {
                sides.outgoing
            } else {
                sides.incoming
            };
            Some(side.to_delta())
        })
        .fold(TransformDelta::IDENTITY, |acc, delta| acc.then(&delta))
}

/// Final transform of a visual effect at `timecode`: the static transform
/// with animation and transition deltas applied. `None` for audio.
pub fn effect_transform(
    snapshot: &SessionSnapshot,
    effect: &Effect,
    timecode: Millis,
) -> Option<Transform> {
    let base = effect.transform()?;
    let delta = animation_delta(snapshot.animations_for(&effect.id), effect, timecode)
        .then(&transition_delta(snapshot, effect, timecode));
    Some(base.apply(&delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_timeline_model::{
        AnimatedProperty, Animation, EffectId, Keyframe, Transition,
    };

    fn crossfade() -> SessionSnapshot {
        let mut s = SessionSnapshot::new(1, 25.0);
        s.effects
            .push(Effect::video("a", "ha", 0, 0.0, 0.0, 2_000.0, 4_000.0));
        s.effects
            .push(Effect::video("b", "hb", 0, 2_000.0, 500.0, 2_500.0, 4_000.0));
        s.transitions.push(Transition {
            id: "t1".to_string(),
            kind: TransitionKind::CrossFade,
            outgoing: EffectId::new("a"),
            incoming: EffectId::new("b"),
            incoming_ms: 500.0,
            outgoing_ms: 500.0,
        });
        s
    }

    #[test]
    fn test_sides_are_complementary() {
        for kind in [TransitionKind::CrossFade, TransitionKind::Dissolve] {
            for p in [0.0, 0.2, 0.5, 0.9, 1.0] {
                let sides = evaluate_transition(kind, p);
                assert!((sides.outgoing.opacity + sides.incoming.opacity - 1.0).abs() < 1e-9);
            }
        }
        let slide = evaluate_transition(TransitionKind::SlideLeft, 0.25);
        assert!((slide.outgoing.offset_x - -0.25).abs() < 1e-9);
        assert!((slide.incoming.offset_x - 0.75).abs() < 1e-9);
        assert!((slide.outgoing.offset_x - slide.incoming.offset_x + 1.0).abs() < 1e-9);

        let mirrored = evaluate_transition(TransitionKind::SlideRight, 0.25);
        assert_eq!(mirrored.outgoing.offset_x, -slide.outgoing.offset_x);
    }

    #[test]
    fn test_dissolve_is_eased() {
        let linear = evaluate_transition(TransitionKind::CrossFade, 0.25);
        let eased = evaluate_transition(TransitionKind::Dissolve, 0.25);
        assert!(eased.incoming.opacity < linear.incoming.opacity);
        assert_eq!(
            evaluate_transition(TransitionKind::Dissolve, 0.5).incoming.opacity,
            0.5
        );
    }

    #[test]
    fn test_crossfade_midpoint_halves_both_sides() {
        let s = crossfade();
        let a = s.effect(&EffectId::new("a")).unwrap();
        let b = s.effect(&EffectId::new("b")).unwrap();
        let ta = effect_transform(&s, a, 2_000.0).unwrap();
        let tb = effect_transform(&s, b, 2_000.0).unwrap();
        assert!((ta.opacity - 0.5).abs() < 1e-9);
        assert!((tb.opacity - 0.5).abs() < 1e-9);

        // Outside the window nothing changes.
        assert_eq!(effect_transform(&s, a, 1_000.0).unwrap().opacity, 1.0);
        assert_eq!(effect_transform(&s, b, 3_000.0).unwrap().opacity, 1.0);
    }

    #[test]
    fn test_animation_and_transition_compose() {
        let mut s = crossfade();
        s.animations.push(Animation {
            id: "fade-a".to_string(),
            effect: EffectId::new("a"),
            property: AnimatedProperty::Opacity,
            keyframes: vec![
                Keyframe {
                    time_ms: 0.0,
                    value: 0.5,
                    easing: Easing::Linear,
                },
                Keyframe {
                    time_ms: 2_000.0,
                    value: 0.5,
                    easing: Easing::Linear,
                },
            ],
        });
        let a = s.effect(&EffectId::new("a")).unwrap();
        assert!((effect_transform(&s, a, 1_000.0).unwrap().opacity - 0.5).abs() < 1e-9);
        assert!((effect_transform(&s, a, 2_000.0).unwrap().opacity - 0.25).abs() < 1e-9);
    }
}
