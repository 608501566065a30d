//! Splice CLI: inspect, preview, and export timeline snapshots.
//!
//! Usage:
//!   splice inspect <SNAPSHOT> --at <MS>   Show what is visible at a timecode
//!   splice preview <SNAPSHOT>             Run the preview loop headless
//!   splice export <SNAPSHOT>              Render draw lists as JSON lines
//!   splice config [--save]                Print (or persist) the engine config
//!
//! Media is synthesized from the snapshot's video sources, so any snapshot
//! can be exercised end to end without real decoders.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use splice_common::config::EngineConfig;

mod commands;
mod session;

#[derive(Parser)]
#[command(
    name = "splice",
    about = "Multi-track timeline preview and export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a snapshot and show the composition at a timecode
    Inspect {
        /// Path to the snapshot JSON file
        path: PathBuf,

        /// Timeline position (ms); defaults to the snapshot playhead
        #[arg(long)]
        at: Option<f64>,
    },

    /// Play the snapshot through the preview loop without a display
    Preview {
        /// Path to the snapshot JSON file
        path: PathBuf,

        /// Wall-clock time to play for (ms)
        #[arg(long, default_value = "2000")]
        duration_ms: u64,

        /// Seek here before playing (ms)
        #[arg(long)]
        seek: Option<f64>,

        /// Playback rate multiplier
        #[arg(long, default_value = "1.0")]
        rate: f64,
    },

    /// Export the snapshot as newline-delimited JSON draw lists
    Export {
        /// Path to the snapshot JSON file
        path: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Range start (ms)
        #[arg(long, default_value = "0")]
        start_ms: f64,

        /// Range end (ms); defaults to the end of the timeline
        #[arg(long)]
        end_ms: Option<f64>,

        /// Output frame rate; defaults to the snapshot timebase
        #[arg(long)]
        fps: Option<f64>,

        /// Per-frame acquisition timeout (ms)
        #[arg(long)]
        frame_timeout_ms: Option<u64>,
    },

    /// Print the effective engine configuration
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    if let Some(path) = cli.log_file {
        config.logging.file = Some(path);
    }
    splice_common::logging::init_logging(&config.logging)?;

    match cli.command {
        Commands::Inspect { path, at } => commands::inspect::run(path, at, config).await,
        Commands::Preview {
            path,
            duration_ms,
            seek,
            rate,
        } => commands::preview::run(path, duration_ms, seek, rate, config).await,
        Commands::Export {
            path,
            output,
            start_ms,
            end_ms,
            fps,
            frame_timeout_ms,
        } => {
            if let Some(ms) = frame_timeout_ms {
                config.export.frame_timeout_ms = ms;
            }
            commands::export::run(path, output, start_ms, end_ms, fps, config).await
        }
        Commands::Config { save } => commands::config::run(&config, save),
    }
}
