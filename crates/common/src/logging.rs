//! Logging and tracing initialization.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// Logs go to stderr so stdout stays free for command output, or are
/// appended to `config.file` when one is set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let dispatch = build_dispatch(config)?;
    if let Err(e) = tracing::dispatcher::set_global_default(dispatch) {
        tracing::warn!(error = %e, "Logging already initialized; keeping the existing subscriber");
    }
    Ok(())
}

fn build_dispatch(config: &LoggingConfig) -> anyhow::Result<Dispatch> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let dispatch = if config.json {
        Dispatch::new(
            fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .json()
                .finish(),
        )
    } else {
        Dispatch::new(
            fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(config.file.is_none())
                .with_target(true)
                .with_thread_ids(config.thread_ids)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };
    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("splice_test_logging_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn file_config(path: &PathBuf, json: bool) -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            json,
            thread_ids: false,
            file: Some(path.clone()),
        }
    }

    #[test]
    fn test_file_output_appends_plain_lines() {
        let path = scratch("plain.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let dispatch = build_dispatch(&file_config(&path, false)).unwrap();
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!(frames = 3, "Export complete");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier run\n"));
        assert!(contents.contains("Export complete"));
        assert!(contents.contains("frames=3"));
        assert!(!contents.contains('\u{1b}'));
    }

    #[test]
    fn test_file_output_json() {
        let path = scratch("json.log");
        let dispatch = build_dispatch(&file_config(&path, true)).unwrap();
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("Seek settled");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"]["message"], "Seek settled");
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let path = scratch("missing-dir").join("splice.log");
        let err = build_dispatch(&file_config(&path, false)).unwrap_err();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}
