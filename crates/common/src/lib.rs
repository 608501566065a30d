//! Splice Common Utilities
//!
//! Shared infrastructure for all Splice crates:
//! - Error types and result aliases
//! - Playback clock and refresh-rate utilities
//! - Tracing/logging initialization
//! - Engine configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
