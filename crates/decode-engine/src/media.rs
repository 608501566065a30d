//! Opaque codec collaborators.
//!
//! Decoding is an external service. The engine only needs to resolve a
//! content hash to a source, read encoded chunks from it, and push those
//! chunks through a decoder that hands back [`VideoFrame`]s.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use splice_common::clock::Millis;

use crate::error::DecodeError;
use crate::frame::{FrameLedger, Micros, VideoFrame};

/// Parameters a decoder needs before it accepts chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Codec string (e.g. "avc1.64001f").
    pub codec: String,
    pub coded_width: u32,
    pub coded_height: u32,
    /// Out-of-band codec description, if the container carries one.
    #[serde(default)]
    pub description: Option<Vec<u8>>,
}

/// One encoded access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub timestamp_us: Micros,
    pub duration_us: Micros,
    /// Whether decoding can start at this chunk.
    pub key: bool,
    pub data: Vec<u8>,
}

/// A decoder instance. Decoders are asynchronous internally: chunks go in
/// through [`decode`](VideoDecoder::decode) and frames come out later
/// through [`poll_frame`](VideoDecoder::poll_frame).
pub trait VideoDecoder: Send {
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), DecodeError>;

    /// Enqueue a chunk for decoding.
    fn decode(&mut self, chunk: EncodedChunk) -> Result<(), DecodeError>;

    /// Next decoded frame, if one is ready.
    fn poll_frame(&mut self) -> Option<VideoFrame>;

    /// Chunks accepted but not yet decoded.
    fn queue_depth(&self) -> usize;

    /// Make every queued chunk available through `poll_frame`.
    fn flush(&mut self);

    /// Drop queued work and return to the configured state.
    fn reset(&mut self);
}

/// Sequential reader of encoded chunks.
pub trait Demuxer: Send {
    /// Position at the last key chunk at or before `media_us`.
    fn seek(&mut self, media_us: Micros) -> Result<(), DecodeError>;

    /// Next chunk in decode order, or `None` at end of stream.
    fn next_chunk(&mut self) -> Result<Option<EncodedChunk>, DecodeError>;
}

/// A resolved media source.
pub trait MediaSource: Send + Sync {
    /// Content hash identifying the source.
    fn hash(&self) -> &str;

    /// Total media duration (ms).
    fn duration_ms(&self) -> Millis;

    fn decoder_config(&self) -> DecoderConfig;

    fn open_demuxer(&self) -> Result<Box<dyn Demuxer>, DecodeError>;

    /// Create a decoder whose frames are counted on `ledger`.
    fn create_decoder(&self, ledger: Arc<FrameLedger>) -> Box<dyn VideoDecoder>;
}

/// Resolves content hashes to sources.
pub trait MediaCatalog: Send + Sync {
    fn get_source(&self, hash: &str) -> Option<Arc<dyn MediaSource>>;
}
