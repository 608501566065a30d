//! Decode error types.

use splice_common::error::SpliceError;

/// Errors raised by decode workers, managers and media collaborators.
///
/// Every variant is scoped to one source, so the pipeline keeps running
/// when one is raised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("media source {hash} is not available")]
    SourceUnavailable { hash: String },

    #[error("effect {effect} has no decodable video source")]
    NotVideo { effect: String },

    #[error("decoder rejected configuration for {source_id}: {message}")]
    Configure { source_id: String, message: String },

    #[error("demux failed for {source_id}: {message}")]
    Demux { source_id: String, message: String },

    #[error("decode failed for {source_id}: {message}")]
    Decode { source_id: String, message: String },

    #[error("decode worker for {source_id} is gone")]
    WorkerClosed { source_id: String },
}

impl DecodeError {
    pub fn configure(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configure {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn demux(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Demux {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn decode(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}

impl From<DecodeError> for SpliceError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::SourceUnavailable { hash } => SpliceError::source_unavailable(hash),
            other => SpliceError::decode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_maps_to_source_unavailable() {
        let err: SpliceError = DecodeError::SourceUnavailable {
            hash: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, SpliceError::SourceUnavailable { ref hash } if hash == "abc"));
        assert!(err.is_per_effect());
    }

    #[test]
    fn test_configure_error_is_per_effect() {
        let err: SpliceError = DecodeError::configure("clip", "unsupported codec").into();
        assert!(err.is_per_effect());
        assert!(err.to_string().contains("unsupported codec"));
    }
}
