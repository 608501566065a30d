//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds of decoded video each frame buffer may hold.
    pub buffer_seconds: f64,

    /// Frame lookup tolerance as a fraction of one frame interval.
    /// Clamped to `[0.5, 1.5]` when used.
    pub lookup_tolerance: f64,

    /// How far beyond the buffered range (ms of media time) a seek may land
    /// and still keep the running decode context.
    pub lookahead_ms: f64,

    /// Consecutive frame-buffer misses that force a decode restart.
    pub miss_threshold: u32,

    /// Demux pacing parameters.
    pub pacing: PacingConfig,

    /// Display refresh rate driving the preview render loop.
    pub refresh_hz: u32,

    /// Export acquisition parameters.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Demux backpressure parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Lower clamp for a non-zero pacing delay (ms).
    pub min_delay_ms: u64,

    /// Upper clamp for the pacing delay (ms).
    pub max_delay_ms: u64,

    /// Decoder queue depth at which the delay reaches `max_delay_ms`.
    pub target_queue_depth: usize,
}

/// Default export acquisition parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// How long to wait for one frame before recording it missing (ms).
    pub frame_timeout_ms: u64,

    /// Poll interval while waiting for a frame (ms).
    pub poll_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "splice=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Include thread ids in human-readable output.
    #[serde(default)]
    pub thread_ids: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: 5.0,
            lookup_tolerance: 0.5,
            lookahead_ms: 1_000.0,
            miss_threshold: 30,
            pacing: PacingConfig::default(),
            refresh_hz: 60,
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1,
            max_delay_ms: 50,
            target_queue_depth: 8,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 5_000,
            poll_interval_ms: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            thread_ids: false,
            file: None,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Frame buffer capacity for a timebase: `ceil(fps * buffer_seconds)`,
    /// never less than one entry.
    pub fn buffer_capacity(&self, timebase_fps: f64) -> usize {
        ((timebase_fps * self.buffer_seconds).ceil() as usize).max(1)
    }

    /// Lookup tolerance factor clamped to its valid range.
    pub fn tolerance_factor(&self) -> f64 {
        self.lookup_tolerance.clamp(0.5, 1.5)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("splice").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_capacity_rounds_up() {
        let config = EngineConfig::default();
        assert_eq!(config.buffer_capacity(25.0), 125);
        assert_eq!(config.buffer_capacity(29.97), 150);
        assert_eq!(config.buffer_capacity(0.0), 1);
    }

    #[test]
    fn test_tolerance_is_clamped() {
        let mut config = EngineConfig::default();
        config.lookup_tolerance = 3.0;
        assert_eq!(config.tolerance_factor(), 1.5);
        config.lookup_tolerance = 0.1;
        assert_eq!(config.tolerance_factor(), 0.5);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.miss_threshold, config.miss_threshold);
        assert_eq!(parsed.pacing.max_delay_ms, 50);
        assert_eq!(parsed.export.frame_timeout_ms, 5_000);
    }

    #[test]
    fn test_logging_thread_ids_defaults_when_absent() {
        let parsed: LoggingConfig =
            serde_json::from_str(r#"{"level":"debug","json":true,"file":null}"#).unwrap();
        assert!(!parsed.thread_ids);
        assert_eq!(parsed.level, "debug");
    }
}
