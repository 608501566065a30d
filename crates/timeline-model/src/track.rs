//! Tracks: ordered lanes of effects.

use serde::{Deserialize, Serialize};

/// A timeline track. Its index in the snapshot is the stacking key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Locked tracks reject transform edits.
    #[serde(default)]
    pub locked: bool,

    /// Hidden tracks are not drawn.
    #[serde(default = "default_true")]
    pub visible: bool,

    /// Muted tracks contribute no audio.
    #[serde(default)]
    pub muted: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Track {
    fn default() -> Self {
        Self {
            locked: false,
            visible: true,
            muted: false,
        }
    }
}

/// Paint order key for an effect on `track`: `track_count - track`.
/// Higher values are painted later (in front).
pub fn paint_order(track_count: usize, track: usize) -> usize {
    track_count.saturating_sub(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_defaults_for_sparse_json() {
        let t: Track = serde_json::from_str("{}").unwrap();
        assert_eq!(t, Track::default());
        assert!(t.visible);
    }

    #[test]
    fn test_lower_track_paints_in_front() {
        assert!(paint_order(3, 0) > paint_order(3, 2));
        assert_eq!(paint_order(3, 0), 3);
        assert_eq!(paint_order(3, 5), 0);
    }
}
