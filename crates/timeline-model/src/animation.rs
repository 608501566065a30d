//! Keyframe animations on one effect.
//!
//! An animation is a pure function of `(effect, timecode)`: it is
//! recomputed on every draw and never touches decode state. Keyframe times
//! are relative to the effect's timeline start.

use serde::{Deserialize, Serialize};
use splice_common::clock::Millis;

use crate::effect::{Effect, EffectId};
use crate::transform::TransformDelta;

/// Keyframed properties of one effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub id: String,
    pub effect: EffectId,
    pub property: AnimatedProperty,
    /// Keyframes sorted by `time_ms`.
    pub keyframes: Vec<Keyframe>,
}

/// A property an animation can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimatedProperty {
    /// Horizontal offset (normalized canvas units).
    X,
    /// Vertical offset (normalized canvas units).
    Y,
    /// Uniform scale about the center (1.0 = unchanged).
    Scale,
    /// Rotation offset in degrees.
    Rotation,
    /// Opacity multiplier.
    Opacity,
}

/// A single keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time relative to the effect's timeline start (ms).
    pub time_ms: Millis,
    pub value: f64,
    /// Easing applied on the segment that starts at this keyframe.
    #[serde(default)]
    pub easing: Easing,
}

/// Easing curve for a keyframe segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    /// Hold the segment's start value until the next keyframe.
    Hold,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map linear progress `t ∈ [0, 1]` through the curve.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Hold => 0.0,
            Easing::EaseIn => t * t * t,
            Easing::EaseOut => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

impl AnimatedProperty {
    /// Value that leaves the effect unchanged.
    pub fn neutral(&self) -> f64 {
        match self {
            AnimatedProperty::X | AnimatedProperty::Y | AnimatedProperty::Rotation => 0.0,
            AnimatedProperty::Scale | AnimatedProperty::Opacity => 1.0,
        }
    }

    fn delta(&self, value: f64) -> TransformDelta {
        let mut delta = TransformDelta::IDENTITY;
        match self {
            AnimatedProperty::X => delta.dx = value,
            AnimatedProperty::Y => delta.dy = value,
            AnimatedProperty::Scale => delta.scale = value.max(0.0),
            AnimatedProperty::Rotation => delta.rotation_deg = value,
            AnimatedProperty::Opacity => delta.opacity = value.clamp(0.0, 1.0),
        }
        delta
    }
}

/// Evaluate sorted keyframes at a relative time.
///
/// Before the first keyframe the first value holds; after the last, the
/// last value holds. Returns `None` for an empty list.
pub fn evaluate_keyframes(keyframes: &[Keyframe], time_ms: Millis) -> Option<f64> {
    let first = keyframes.first()?;
    if keyframes.len() == 1 || time_ms <= first.time_ms {
        return Some(first.value);
    }

    let last = keyframes[keyframes.len() - 1];
    if time_ms >= last.time_ms {
        return Some(last.value);
    }

    let idx = keyframes.partition_point(|kf| kf.time_ms <= time_ms);
    let a = keyframes[idx - 1];
    let b = keyframes[idx];
    let span = b.time_ms - a.time_ms;
    if span <= 0.0 {
        return Some(b.value);
    }
    let t = a.easing.apply((time_ms - a.time_ms) / span);
    Some(a.value + (b.value - a.value) * t)
}

impl Animation {
    /// Delta this animation contributes to `effect` at timeline `timecode`.
    pub fn delta_at(&self, effect: &Effect, timecode: Millis) -> TransformDelta {
        let relative = timecode - effect.start_at_position;
        let value = evaluate_keyframes(&self.keyframes, relative)
            .unwrap_or_else(|| self.property.neutral());
        self.property.delta(value)
    }

    /// Whether keyframes are sorted by time.
    pub fn is_sorted(&self) -> bool {
        self.keyframes
            .windows(2)
            .all(|pair| pair[0].time_ms <= pair[1].time_ms)
    }
}

/// Combined animation delta for `effect` at `timecode`.
pub fn animation_delta<'a>(
    animations: impl IntoIterator<Item = &'a Animation>,
    effect: &Effect,
    timecode: Millis,
) -> TransformDelta {
    animations
        .into_iter()
        .filter(|a| a.effect == effect.id)
        .fold(TransformDelta::IDENTITY, |acc, a| {
            acc.then(&a.delta_at(effect, timecode))
        })
}
