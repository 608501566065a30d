//! Messages between a decode manager and its worker.
//!
//! Contract:
//! - chunks received before `Configure` completes are queued, not decoded
//! - no `NewFrame` is emitted before `Demux`
//! - `Cleanup` is idempotent and harmless on a finished worker
//! - frames for one source are emitted in increasing media-time order

use splice_common::clock::Millis;
use splice_timeline_model::MediaWindow;

use crate::error::DecodeError;
use crate::frame::{Micros, VideoFrame};
use crate::media::{DecoderConfig, EncodedChunk};

/// Controller → worker.
#[derive(Debug)]
pub enum WorkerCommand {
    Configure(DecoderConfig),

    /// Start (or restart) demuxing `window` at `start_ms`.
    Demux {
        window: MediaWindow,
        start_ms: Millis,
        timebase: f64,
    },

    /// Externally supplied chunk.
    Chunk(EncodedChunk),

    /// No more external chunks; flush the decoder.
    Eof,

    /// Controller backlog report: frames currently buffered, frames
    /// received from this worker so far, and buffer capacity.
    BufferLevel {
        buffered: usize,
        received: u64,
        capacity: usize,
    },

    Cleanup,
}

/// Worker → controller.
#[derive(Debug)]
pub enum WorkerEvent {
    Configured,

    NewFrame {
        timecode_us: Micros,
        frame: VideoFrame,
        source_id: String,
    },

    QueueDepth(usize),

    /// The demux window is exhausted and the decoder drained.
    End,

    Failed(DecodeError),
}

impl WorkerEvent {
    /// Release any frame carried by the event.
    pub fn discard(self) {
        if let WorkerEvent::NewFrame { frame, .. } = self {
            frame.release();
        }
    }
}
