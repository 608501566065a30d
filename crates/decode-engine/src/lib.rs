//! Splice Decode Engine
//!
//! Decodes compressed video out-of-band and caches the results close to the
//! playhead:
//! - **Worker:** one isolated tokio task per active video source, driven
//!   purely by messages (see [`protocol`])
//! - **Frame buffer:** bounded, insertion-ordered cache keyed by media time
//! - **Pacing:** demux backpressure derived from decoder queue depth
//! - **Manager:** owns one worker and its buffer, and applies the seek policy
//!
//! Codecs are opaque: sources, demuxers and decoders come from an external
//! [`media::MediaCatalog`]. The [`synthetic`] module provides a deterministic
//! implementation for tests and tooling.

pub mod buffer;
pub mod context;
pub mod error;
pub mod frame;
pub mod manager;
pub mod media;
pub mod pacing;
pub mod protocol;
pub mod synthetic;
pub mod worker;

pub use buffer::FrameBuffer;
pub use context::EngineContext;
pub use error::DecodeError;
pub use frame::{FrameLedger, FrameRef, LedgerCounts, Micros, VideoFrame};
pub use manager::{DecodeManager, DecodeStats, SeekOutcome};
pub use media::{DecoderConfig, Demuxer, EncodedChunk, MediaCatalog, MediaSource, VideoDecoder};
pub use pacing::pacing_delay;
pub use protocol::{WorkerCommand, WorkerEvent};

/// Convert milliseconds to microseconds, rounding to the nearest tick.
pub fn ms_to_us(ms: f64) -> Micros {
    (ms * 1_000.0).round() as Micros
}

/// Convert microseconds to milliseconds.
pub fn us_to_ms(us: Micros) -> f64 {
    us as f64 / 1_000.0
}
