//! Render-side errors.

use splice_common::error::SpliceError;
use splice_decode_engine::DecodeError;
use splice_timeline_model::{EffectId, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// `compose` or `seek` before the scene was rebuilt.
    #[error("Compositor is not ready; call recreate first")]
    NotReady,

    #[error("Snapshot failed validation: {}", summarize(.0))]
    InvalidSnapshot(Vec<ModelError>),

    #[error("Unknown effect: {id}")]
    UnknownEffect { id: EffectId },

    #[error("Effect {id} is on locked track {track}")]
    LockedTrack { id: EffectId, track: usize },

    #[error("Action rejected: {message}")]
    Rejected { message: String },

    #[error("Surface error: {message}")]
    Surface { message: String },

    #[error("Export sink error: {message}")]
    Sink { message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub type RenderResult<T> = Result<T, RenderError>;

fn summarize(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RenderError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected {
            message: msg.into(),
        }
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }
}

impl From<RenderError> for SpliceError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Decode(err) => err.into(),
            RenderError::InvalidSnapshot(_)
            | RenderError::UnknownEffect { .. }
            | RenderError::LockedTrack { .. }
            | RenderError::Rejected { .. } => SpliceError::model(err.to_string()),
            RenderError::Sink { .. } => SpliceError::export(err.to_string()),
            RenderError::NotReady | RenderError::Surface { .. } => {
                SpliceError::render(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_category() {
        let err: SpliceError = RenderError::sink("encoder closed").into();
        assert!(matches!(err, SpliceError::Export { .. }));

        let err: SpliceError = RenderError::NotReady.into();
        assert!(matches!(err, SpliceError::Render { .. }));

        let err: SpliceError = RenderError::UnknownEffect {
            id: EffectId::new("x"),
        }
        .into();
        assert!(err.to_string().contains("Unknown effect: x"));
    }
}
