//! Filters: pure post-process operations on one visual effect.

use serde::{Deserialize, Serialize};

use crate::effect::EffectId;

/// A filter attached to a visual effect. Orthogonal to timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    pub effect: EffectId,
    pub op: FilterOp,
}

/// Supported post-process operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterOp {
    Grayscale,
    /// Gaussian blur radius in output pixels.
    Blur { radius: f64 },
    /// Additive brightness in `[-1.0, 1.0]`.
    Brightness { amount: f64 },
    /// Contrast multiplier (1.0 = unchanged).
    Contrast { amount: f64 },
}

impl FilterOp {
    /// Clamp parameters into their valid ranges.
    pub fn normalized(self) -> FilterOp {
        match self {
            FilterOp::Grayscale => FilterOp::Grayscale,
            FilterOp::Blur { radius } => FilterOp::Blur {
                radius: radius.max(0.0),
            },
            FilterOp::Brightness { amount } => FilterOp::Brightness {
                amount: amount.clamp(-1.0, 1.0),
            },
            FilterOp::Contrast { amount } => FilterOp::Contrast {
                amount: amount.max(0.0),
            },
        }
    }

    /// Whether applying the op leaves pixels unchanged.
    pub fn is_noop(&self) -> bool {
        match *self {
            FilterOp::Grayscale => false,
            FilterOp::Blur { radius } => radius <= 0.0,
            FilterOp::Brightness { amount } => amount == 0.0,
            FilterOp::Contrast { amount } => amount == 1.0,
        }
    }
}
