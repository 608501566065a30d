//! The session snapshot: a consistent, versioned view of timeline content.
//!
//! Components read one snapshot per tick and never mutate it in place;
//! edits produce a new snapshot with a bumped `version`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use splice_common::clock::{frame_interval_ms, Millis};

use crate::animation::Animation;
use crate::effect::{Effect, EffectId};
use crate::filter::Filter;
use crate::track::Track;
use crate::transition::Transition;

/// Snapshot of everything the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Monotonic edit counter.
    #[serde(default)]
    pub version: u64,

    pub effects: Vec<Effect>,

    pub tracks: Vec<Track>,

    #[serde(default)]
    pub transitions: Vec<Transition>,

    #[serde(default)]
    pub animations: Vec<Animation>,

    #[serde(default)]
    pub filters: Vec<Filter>,

    /// Playhead position (ms).
    #[serde(default)]
    pub timecode: Millis,

    /// Target frames per second.
    pub timebase: f64,

    #[serde(default)]
    pub is_playing: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            effects: Vec::new(),
            tracks: vec![Track::default()],
            transitions: Vec::new(),
            animations: Vec::new(),
            filters: Vec::new(),
            timecode: 0.0,
            timebase: 30.0,
            is_playing: false,
        }
    }
}

impl SessionSnapshot {
    /// Empty snapshot with `track_count` default tracks.
    pub fn new(track_count: usize, timebase: f64) -> Self {
        Self {
            tracks: vec![Track::default(); track_count.max(1)],
            timebase,
            ..Self::default()
        }
    }

    pub fn effect(&self, id: &EffectId) -> Option<&Effect> {
        self.effects.iter().find(|e| &e.id == id)
    }

    pub fn effect_mut(&mut self, id: &EffectId) -> Option<&mut Effect> {
        self.effects.iter_mut().find(|e| &e.id == id)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Track settings for an effect; unknown indices read as defaults.
    pub fn track_of(&self, effect: &Effect) -> Track {
        self.tracks.get(effect.track).cloned().unwrap_or_default()
    }

    pub fn transitions_for<'a>(&'a self, id: &'a EffectId) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.references(id))
    }

    pub fn animations_for<'a>(&'a self, id: &'a EffectId) -> impl Iterator<Item = &'a Animation> {
        self.animations.iter().filter(move |a| &a.effect == id)
    }

    pub fn filters_for<'a>(&'a self, id: &'a EffectId) -> impl Iterator<Item = &'a Filter> {
        self.filters.iter().filter(move |f| &f.effect == id)
    }

    /// Duration of one frame at the snapshot timebase (ms).
    pub fn frame_interval(&self) -> Millis {
        frame_interval_ms(self.timebase)
    }

    /// End of the last effect, including transition padding (ms).
    pub fn duration(&self) -> Millis {
        self.effects
            .iter()
            .filter(|e| !e.is_empty())
            .map(|e| e.timeline_end() + crate::query::effect_padding(self, &e.id).outgoing)
            .fold(0.0, f64::max)
    }

    /// Check every model invariant, returning all violations.
    pub fn validate(&self) -> Vec<ModelError> {
        let mut errors = Vec::new();

        if !(self.timebase > 0.0) {
            errors.push(ModelError::InvalidTimebase {
                timebase: self.timebase,
            });
        }

        let mut seen = HashSet::new();
        for effect in &self.effects {
            if !seen.insert(&effect.id) {
                errors.push(ModelError::DuplicateEffect {
                    id: effect.id.clone(),
                });
            }
            if !effect.has_valid_trim() {
                errors.push(ModelError::InvalidTrim {
                    id: effect.id.clone(),
                    start: effect.start,
                    end: effect.end,
                    duration: effect.duration,
                });
            }
            if effect.track >= self.tracks.len() {
                errors.push(ModelError::UnknownTrack {
                    id: effect.id.clone(),
                    track: effect.track,
                });
            }
        }

        for transition in &self.transitions {
            let outgoing = self.effect(&transition.outgoing);
            let incoming = self.effect(&transition.incoming);
            let (Some(outgoing), Some(incoming)) = (outgoing, incoming) else {
                errors.push(ModelError::DanglingReference {
                    owner: transition.id.clone(),
                });
                continue;
            };
            if outgoing.track != incoming.track
                || incoming.start_at_position < outgoing.start_at_position
            {
                errors.push(ModelError::NotAdjacent {
                    transition: transition.id.clone(),
                });
            }
            if transition.outgoing_ms > outgoing.trimmed_duration()
                || transition.incoming_ms > incoming.trimmed_duration()
            {
                errors.push(ModelError::TransitionTooLong {
                    transition: transition.id.clone(),
                });
            }
        }

        for animation in &self.animations {
            if self.effect(&animation.effect).is_none() {
                errors.push(ModelError::DanglingReference {
                    owner: animation.id.clone(),
                });
            }
            if !animation.is_sorted() {
                errors.push(ModelError::UnsortedKeyframes {
                    animation: animation.id.clone(),
                });
            }
        }

        for filter in &self.filters {
            match self.effect(&filter.effect) {
                Some(effect) if effect.is_visual() => {}
                Some(_) => errors.push(ModelError::FilterOnAudio {
                    filter: filter.id.clone(),
                }),
                None => errors.push(ModelError::DanglingReference {
                    owner: filter.id.clone(),
                }),
            }
        }

        errors
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| SnapshotError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SnapshotError::ParseError { path, source: e })
    }

    /// Save the snapshot as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SnapshotError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SnapshotError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| SnapshotError::IoError { path, source: e })
    }
}

/// Invariant violations found by [`SessionSnapshot::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("timebase must be positive, got {timebase}")]
    InvalidTimebase { timebase: f64 },

    #[error("duplicate effect id {id}")]
    DuplicateEffect { id: EffectId },

    #[error("effect {id} violates 0 <= start ({start}) <= end ({end}) <= duration ({duration})")]
    InvalidTrim {
        id: EffectId,
        start: Millis,
        end: Millis,
        duration: Millis,
    },

    #[error("effect {id} sits on unknown track {track}")]
    UnknownTrack { id: EffectId, track: usize },

    #[error("{owner} references an unknown effect")]
    DanglingReference { owner: String },

    #[error("transition {transition} joins effects that are not adjacent on one track")]
    NotAdjacent { transition: String },

    #[error("transition {transition} pads longer than the effect it extends")]
    TransitionTooLong { transition: String },

    #[error("animation {animation} has unsorted keyframes")]
    UnsortedKeyframes { animation: String },

    #[error("filter {filter} targets an audio effect")]
    FilterOnAudio { filter: String },
}

/// Errors reading or writing snapshot files.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimatedProperty, Keyframe};
    use crate::filter::FilterOp;
    use crate::transition::TransitionKind;

    fn two_clip_snapshot() -> SessionSnapshot {
        let mut snap = SessionSnapshot::new(2, 25.0);
        snap.effects
            .push(Effect::video("a", "ha", 0, 0.0, 0.0, 2_000.0, 2_000.0));
        snap.effects
            .push(Effect::video("b", "hb", 0, 2_000.0, 0.0, 2_000.0, 4_000.0));
        snap.transitions.push(Transition {
            id: "t".to_string(),
            kind: TransitionKind::CrossFade,
            outgoing: EffectId::new("a"),
            incoming: EffectId::new("b"),
            incoming_ms: 250.0,
            outgoing_ms: 250.0,
        });
        snap
    }

    #[test]
    fn test_valid_snapshot_has_no_errors() {
        assert!(two_clip_snapshot().validate().is_empty());
    }

    #[test]
    fn test_duration_includes_outgoing_padding() {
        let snap = two_clip_snapshot();
        assert_eq!(snap.duration(), 4_000.0);
        let mut snap = snap;
        snap.transitions[0].outgoing = EffectId::new("b");
        snap.transitions[0].incoming = EffectId::new("a");
        assert_eq!(snap.duration(), 4_250.0);
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let mut snap = two_clip_snapshot();
        snap.timebase = 0.0;
        snap.effects[1].track = 7;
        snap.effects[0].end = 3_000.0;
        let duplicate = snap.effects[0].clone();
        snap.effects.push(duplicate);
        snap.animations.push(Animation {
            id: "anim".to_string(),
            effect: EffectId::new("missing"),
            property: AnimatedProperty::X,
            keyframes: vec![
                Keyframe {
                    time_ms: 10.0,
                    value: 0.0,
                    easing: Default::default(),
                },
                Keyframe {
                    time_ms: 5.0,
                    value: 1.0,
                    easing: Default::default(),
                },
            ],
        });
        let errors = snap.validate();
        assert!(errors.contains(&ModelError::InvalidTimebase { timebase: 0.0 }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ModelError::UnknownTrack { track: 7, .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ModelError::InvalidTrim { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ModelError::DuplicateEffect { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ModelError::NotAdjacent { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ModelError::UnsortedKeyframes { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ModelError::DanglingReference { owner } if owner == "anim")));
    }

    #[test]
    fn test_filter_on_audio_is_rejected() {
        let mut snap = SessionSnapshot::new(1, 30.0);
        snap.effects.push(Effect {
            id: EffectId::new("aud"),
            start_at_position: 0.0,
            duration: 1_000.0,
            start: 0.0,
            end: 1_000.0,
            track: 0,
            kind: crate::effect::EffectKind::Audio {
                source: "x".to_string(),
                volume: 1.0,
            },
        });
        snap.filters.push(Filter {
            id: "f".to_string(),
            effect: EffectId::new("aud"),
            op: FilterOp::Grayscale,
        });
        assert_eq!(
            snap.validate(),
            vec![ModelError::FilterOnAudio {
                filter: "f".to_string()
            }]
        );
    }

    #[test]
    fn test_snapshot_json_defaults_optional_sections() {
        let json = r#"{
            "effects": [],
            "tracks": [{}],
            "timebase": 25
        }"#;
        let snap = SessionSnapshot::from_json(json).unwrap();
        assert_eq!(snap.version, 0);
        assert!(snap.transitions.is_empty());
        assert!(!snap.is_playing);
        assert_eq!(snap.frame_interval(), 40.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("splice_test_snapshot");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("session.json");

        let snap = two_clip_snapshot();
        snap.save(&path).unwrap();
        let loaded = SessionSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snap);

        std::fs::remove_dir_all(&dir).ok();
    }
}
