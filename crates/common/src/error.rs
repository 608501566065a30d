//! Error types shared across Splice crates.

use std::path::PathBuf;

/// Top-level error type for Splice operations.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Media source unavailable: {hash}")]
    SourceUnavailable { hash: String },

    #[error("Operation on torn-down {what}")]
    Stale { what: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SpliceError.
pub type SpliceResult<T> = Result<T, SpliceError>;

impl SpliceError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn source_unavailable(hash: impl Into<String>) -> Self {
        Self::SourceUnavailable { hash: hash.into() }
    }

    pub fn stale(what: impl Into<String>) -> Self {
        Self::Stale { what: what.into() }
    }

    /// Whether the error only affects a single effect and the pipeline
    /// should keep running.
    pub fn is_per_effect(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::Decode { .. } | Self::Stale { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = SpliceError::source_unavailable("abc123");
        assert_eq!(err.to_string(), "Media source unavailable: abc123");

        let err = SpliceError::decode("configure rejected");
        assert_eq!(err.to_string(), "Decode error: configure rejected");
    }

    #[test]
    fn test_per_effect_classification() {
        assert!(SpliceError::source_unavailable("x").is_per_effect());
        assert!(SpliceError::stale("decode manager").is_per_effect());
        assert!(!SpliceError::config("bad").is_per_effect());
        assert!(!SpliceError::export("sink closed").is_per_effect());
    }
}
