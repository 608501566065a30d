//! Effects: timed, typed units of timeline content.
//!
//! An effect places a trimmed window of some source onto a track. `start`
//! and `end` are offsets *within the source media*; `start_at_position`
//! places that window on the timeline. The visible span is derived from
//! them and never stored.

use std::fmt;

use serde::{Deserialize, Serialize};
use splice_common::clock::Millis;

use crate::transform::Transform;

/// Stable effect identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(pub String);

impl EffectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EffectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single timeline effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,

    /// Timeline position of the trimmed window's first frame (ms).
    pub start_at_position: Millis,

    /// Full duration of the source media (ms).
    pub duration: Millis,

    /// Trim-in offset within the source (ms).
    pub start: Millis,

    /// Trim-out offset within the source (ms).
    pub end: Millis,

    /// Track index; also the stacking key (0 = front-most).
    pub track: usize,

    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: EffectKind,
}

/// Closed set of effect kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Compressed video decoded through a decode context.
    Video {
        /// Content hash resolved through the media catalog.
        source: String,
        #[serde(default)]
        transform: Transform,
    },

    /// Audio-only media; never drawn.
    Audio {
        source: String,
        #[serde(default = "default_volume")]
        volume: f64,
    },

    /// Still image.
    Image {
        source: String,
        #[serde(default)]
        transform: Transform,
    },

    /// Rendered text.
    Text {
        text: String,
        #[serde(default)]
        style: TextStyle,
        #[serde(default)]
        transform: Transform,
    },
}

fn default_volume() -> f64 {
    1.0
}

/// Styling for text effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    /// CSS-style hex color (`#rrggbb` or `#rrggbbaa`).
    pub color: String,
    #[serde(default)]
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 48.0,
            color: "#ffffff".to_string(),
            align: TextAlign::Center,
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl Effect {
    /// Length of the trimmed window (ms).
    pub fn trimmed_duration(&self) -> Millis {
        (self.end - self.start).max(0.0)
    }

    /// Timeline position just past the last visible instant, without padding.
    pub fn timeline_end(&self) -> Millis {
        self.start_at_position + self.trimmed_duration()
    }

    /// Zero-length effects are never active.
    pub fn is_empty(&self) -> bool {
        self.trimmed_duration() <= 0.0
    }

    /// Whether the trim satisfies `0 <= start <= end <= duration`.
    pub fn has_valid_trim(&self) -> bool {
        0.0 <= self.start && self.start <= self.end && self.end <= self.duration
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, EffectKind::Video { .. })
    }

    /// Whether the effect draws anything.
    pub fn is_visual(&self) -> bool {
        !matches!(self.kind, EffectKind::Audio { .. })
    }

    /// Content hash of the backing media, if any.
    pub fn source_hash(&self) -> Option<&str> {
        match &self.kind {
            EffectKind::Video { source, .. }
            | EffectKind::Audio { source, .. }
            | EffectKind::Image { source, .. } => Some(source),
            EffectKind::Text { .. } => None,
        }
    }

    /// Static transform of a visual effect.
    pub fn transform(&self) -> Option<&Transform> {
        match &self.kind {
            EffectKind::Video { transform, .. }
            | EffectKind::Image { transform, .. }
            | EffectKind::Text { transform, .. } => Some(transform),
            EffectKind::Audio { .. } => None,
        }
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        match &mut self.kind {
            EffectKind::Video { transform, .. }
            | EffectKind::Image { transform, .. }
            | EffectKind::Text { transform, .. } => Some(transform),
            EffectKind::Audio { .. } => None,
        }
    }

    /// Short kind label for logs.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EffectKind::Video { .. } => "video",
            EffectKind::Audio { .. } => "audio",
            EffectKind::Image { .. } => "image",
            EffectKind::Text { .. } => "text",
        }
    }

    /// Convenience constructor for a full-canvas video effect.
    pub fn video(
        id: impl Into<String>,
        source: impl Into<String>,
        track: usize,
        start_at_position: Millis,
        start: Millis,
        end: Millis,
        duration: Millis,
    ) -> Self {
        Self {
            id: EffectId::new(id),
            start_at_position,
            duration,
            start,
            end,
            track,
            kind: EffectKind::Video {
                source: source.into(),
                transform: Transform::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_span_is_derived_from_trim() {
        let e = Effect::video("a", "hash", 0, 1_000.0, 500.0, 2_500.0, 10_000.0);
        assert_eq!(e.trimmed_duration(), 2_000.0);
        assert_eq!(e.timeline_end(), 3_000.0);
        assert!(e.has_valid_trim());
    }

    #[test]
    fn test_invalid_trim_detected() {
        let mut e = Effect::video("a", "hash", 0, 0.0, 0.0, 2_000.0, 1_000.0);
        assert!(!e.has_valid_trim());
        e.end = 500.0;
        e.start = 600.0;
        assert!(!e.has_valid_trim());
        assert!(e.is_empty());
    }

    #[test]
    fn test_kind_payload_accessors() {
        let text = Effect {
            id: EffectId::new("t"),
            start_at_position: 0.0,
            duration: 1_000.0,
            start: 0.0,
            end: 1_000.0,
            track: 1,
            kind: EffectKind::Text {
                text: "Hello".to_string(),
                style: TextStyle::default(),
                transform: Transform::default(),
            },
        };
        assert!(text.is_visual());
        assert!(text.source_hash().is_none());
        assert_eq!(text.kind_name(), "text");

        let audio = Effect {
            kind: EffectKind::Audio {
                source: "aud".to_string(),
                volume: 0.5,
            },
            ..text
        };
        assert!(!audio.is_visual());
        assert!(audio.transform().is_none());
        assert_eq!(audio.source_hash(), Some("aud"));
    }

    #[test]
    fn test_effect_json_uses_type_tag() {
        let json = r#"{
            "id": "v1",
            "start_at_position": 0,
            "duration": 4000,
            "start": 0,
            "end": 4000,
            "track": 0,
            "type": "video",
            "source": "abc"
        }"#;
        let e: Effect = serde_json::from_str(json).unwrap();
        assert!(e.is_video());
        assert_eq!(e.transform(), Some(&Transform::default()));
    }
}
