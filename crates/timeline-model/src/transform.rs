//! Placement rectangles and per-draw transforms.
//!
//! All coordinates are normalized to the output canvas: `(0.0, 0.0)` is
//! top-left, `(1.0, 1.0)` bottom-right. Unlike a crop viewport, a placed
//! rectangle may extend past the canvas edges (a clip dragged half off
//! screen is still valid).

use serde::{Deserialize, Serialize};

/// A rectangle on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (normalized).
    pub x: f64,
    /// Top edge (normalized).
    pub y: f64,
    /// Width (normalized).
    pub w: f64,
    /// Height (normalized).
    pub h: f64,
}

impl Rect {
    /// Full-canvas rectangle.
    pub const FULL: Rect = Rect {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    /// Create a rectangle, keeping width and height strictly positive.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w: w.max(0.001),
            h: h.max(0.001),
        }
    }

    /// Create a rectangle centered at `(cx, cy)` with given dimensions.
    pub fn centered(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    /// The center point of this rectangle.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Check if a normalized point is within this rectangle.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Linearly interpolate between two rectangles.
    pub fn lerp(a: &Rect, b: &Rect, t: f64) -> Rect {
        let t = t.clamp(0.0, 1.0);
        Rect {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
            w: a.w + (b.w - a.w) * t,
            h: a.h + (b.h - a.h) * t,
        }
    }

    /// Scale about the center.
    pub fn scaled(&self, factor: f64) -> Rect {
        let (cx, cy) = self.center();
        Rect::centered(cx, cy, self.w * factor, self.h * factor)
    }

    /// Translate by a normalized offset.
    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Whether any part of the rectangle overlaps the canvas.
    pub fn intersects_canvas(&self) -> bool {
        self.right() > 0.0 && self.x < 1.0 && self.bottom() > 0.0 && self.y < 1.0
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Static placement of a visual effect, stored in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Placement on the canvas.
    pub rect: Rect,

    /// Clockwise rotation around the rect center, in degrees.
    #[serde(default)]
    pub rotation_deg: f64,

    /// Opacity `[0.0, 1.0]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rect: Rect::FULL,
            rotation_deg: 0.0,
            opacity: 1.0,
        }
    }
}

impl Transform {
    /// Apply a time-dependent delta on top of this static transform.
    pub fn apply(&self, delta: &TransformDelta) -> Transform {
        Transform {
            rect: self.rect.scaled(delta.scale).translated(delta.dx, delta.dy),
            rotation_deg: self.rotation_deg + delta.rotation_deg,
            opacity: (self.opacity * delta.opacity).clamp(0.0, 1.0),
        }
    }
}

/// Time-dependent modification layered over a static [`Transform`].
///
/// Deltas compose: offsets and rotation add, scale and opacity multiply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformDelta {
    pub dx: f64,
    pub dy: f64,
    pub scale: f64,
    pub rotation_deg: f64,
    pub opacity: f64,
}

impl TransformDelta {
    /// The delta that changes nothing.
    pub const IDENTITY: TransformDelta = TransformDelta {
        dx: 0.0,
        dy: 0.0,
        scale: 1.0,
        rotation_deg: 0.0,
        opacity: 1.0,
    };

    /// Combine two deltas.
    pub fn then(&self, other: &TransformDelta) -> TransformDelta {
        TransformDelta {
            dx: self.dx + other.dx,
            dy: self.dy + other.dy,
            scale: self.scale * other.scale,
            rotation_deg: self.rotation_deg + other.rotation_deg,
            opacity: self.opacity * other.opacity,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for TransformDelta {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_rect() {
        let r = Rect::FULL;
        assert!(r.contains(0.5, 0.5));
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(1.0, 1.0));
    }

    #[test]
    fn test_rect_may_leave_canvas() {
        let r = Rect::new(0.8, 0.8, 0.5, 0.5);
        assert!(r.right() > 1.0);
        assert!(r.intersects_canvas());
        assert!(!Rect::new(1.2, 0.0, 0.5, 0.5).intersects_canvas());
    }

    #[test]
    fn test_lerp() {
        let a = Rect::FULL;
        let b = Rect::new(0.25, 0.25, 0.5, 0.5);
        let mid = Rect::lerp(&a, &b, 0.5);
        assert!((mid.x - 0.125).abs() < 1e-9);
        assert!((mid.w - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_keeps_center() {
        let r = Rect::new(0.2, 0.2, 0.4, 0.4);
        let s = r.scaled(0.5);
        let (cx, cy) = s.center();
        assert!((cx - 0.4).abs() < 1e-9);
        assert!((cy - 0.4).abs() < 1e-9);
        assert!((s.w - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_identity_delta_is_noop() {
        let t = Transform {
            rect: Rect::new(0.1, 0.2, 0.3, 0.4),
            rotation_deg: 15.0,
            opacity: 0.8,
        };
        assert_eq!(t.apply(&TransformDelta::IDENTITY), t);
    }

    #[test]
    fn test_delta_composition() {
        let a = TransformDelta {
            dx: 0.1,
            opacity: 0.5,
            ..TransformDelta::IDENTITY
        };
        let b = TransformDelta {
            dx: 0.2,
            scale: 2.0,
            opacity: 0.5,
            ..TransformDelta::IDENTITY
        };
        let c = a.then(&b);
        assert!((c.dx - 0.3).abs() < 1e-9);
        assert!((c.scale - 2.0).abs() < 1e-9);
        assert!((c.opacity - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_opacity_is_clamped() {
        let t = Transform::default();
        let d = TransformDelta {
            opacity: 3.0,
            ..TransformDelta::IDENTITY
        };
        assert_eq!(t.apply(&d).opacity, 1.0);
    }
}
