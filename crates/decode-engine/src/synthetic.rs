//! Synthetic media for tests and tooling.
//!
//! A synthetic source produces one chunk per frame interval with a key
//! chunk every `keyframe_interval` frames. Its decoder holds back
//! `latency` chunks before producing output, can be told to drop specific
//! frames or stall at a point in media time, and can be told to reject
//! configuration.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use splice_common::clock::Millis;

use crate::error::DecodeError;
use crate::frame::{FrameLedger, Micros, VideoFrame};
use crate::media::{DecoderConfig, Demuxer, EncodedChunk, MediaCatalog, MediaSource, VideoDecoder};

pub const SYNTHETIC_CODEC: &str = "synthetic/raw";

/// A generated video source.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    hash: String,
    duration_ms: Millis,
    fps: f64,
    width: u32,
    height: u32,
    keyframe_interval: u32,
    latency: usize,
    dropped_us: BTreeSet<Micros>,
    stall_us: Option<Micros>,
    reject_configure: bool,
}

impl SyntheticSource {
    pub fn new(hash: impl Into<String>, duration_ms: Millis, fps: f64) -> Self {
        Self {
            hash: hash.into(),
            duration_ms: duration_ms.max(0.0),
            fps: if fps > 0.0 { fps } else { 30.0 },
            width: 320,
            height: 180,
            keyframe_interval: 25,
            latency: 0,
            dropped_us: BTreeSet::new(),
            stall_us: None,
            reject_configure: false,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames.max(1);
        self
    }

    /// Chunks the decoder holds back before producing a frame.
    pub fn with_latency(mut self, chunks: usize) -> Self {
        self.latency = chunks;
        self
    }

    /// Never produce the frame whose timestamp is nearest `media_ms`.
    pub fn drop_frame_at(mut self, media_ms: Millis) -> Self {
        let index = (media_ms * 1_000.0 / self.frame_us() as f64).round() as Micros;
        self.dropped_us.insert(index * self.frame_us());
        self
    }

    /// Hold every chunk from `media_ms` on inside the decoder, even across a
    /// flush. The worker never reports the end of its window.
    pub fn stall_from(mut self, media_ms: Millis) -> Self {
        self.stall_us = Some((media_ms * 1_000.0).round() as Micros);
        self
    }

    pub fn rejecting_configuration(mut self) -> Self {
        self.reject_configure = true;
        self
    }

    /// Frame interval (µs).
    pub fn frame_us(&self) -> Micros {
        (1_000_000.0 / self.fps).round() as Micros
    }

    /// Number of frames in the source.
    pub fn frame_count(&self) -> i64 {
        ((self.duration_ms * 1_000.0) as Micros) / self.frame_us()
    }
}

impl MediaSource for SyntheticSource {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn duration_ms(&self) -> Millis {
        self.duration_ms
    }

    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            codec: SYNTHETIC_CODEC.to_string(),
            coded_width: self.width,
            coded_height: self.height,
            description: None,
        }
    }

    fn open_demuxer(&self) -> Result<Box<dyn Demuxer>, DecodeError> {
        Ok(Box::new(SyntheticDemuxer {
            frame_us: self.frame_us(),
            frame_count: self.frame_count(),
            keyframe_interval: i64::from(self.keyframe_interval),
            next_index: 0,
        }))
    }

    fn create_decoder(&self, ledger: Arc<FrameLedger>) -> Box<dyn VideoDecoder> {
        Box::new(SyntheticDecoder {
            source: self.clone(),
            ledger,
            configured: None,
            queue: VecDeque::new(),
            flushing: false,
        })
    }
}

struct SyntheticDemuxer {
    frame_us: Micros,
    frame_count: i64,
    keyframe_interval: i64,
    next_index: i64,
}

impl Demuxer for SyntheticDemuxer {
    fn seek(&mut self, media_us: Micros) -> Result<(), DecodeError> {
        let index = (media_us.max(0) / self.frame_us).min(self.frame_count);
        self.next_index = index - index % self.keyframe_interval;
        Ok(())
    }

    fn next_chunk(&mut self) -> Result<Option<EncodedChunk>, DecodeError> {
        if self.next_index >= self.frame_count {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(EncodedChunk {
            timestamp_us: index * self.frame_us,
            duration_us: self.frame_us,
            key: index % self.keyframe_interval == 0,
            data: index.to_le_bytes().to_vec(),
        }))
    }
}

struct SyntheticDecoder {
    source: SyntheticSource,
    ledger: Arc<FrameLedger>,
    configured: Option<DecoderConfig>,
    queue: VecDeque<EncodedChunk>,
    flushing: bool,
}

impl SyntheticDecoder {
    fn render(&self, chunk: &EncodedChunk) -> VideoFrame {
        // One RGBA pixel whose channels encode the frame index.
        let index = chunk.timestamp_us / self.source.frame_us().max(1);
        let pixel = vec![
            (index & 0xff) as u8,
            ((index >> 8) & 0xff) as u8,
            ((index >> 16) & 0xff) as u8,
            0xff,
        ];
        VideoFrame::new(
            self.source.hash.clone(),
            chunk.timestamp_us,
            chunk.duration_us,
            self.source.width,
            self.source.height,
            pixel,
            self.ledger.clone(),
        )
    }
}

impl VideoDecoder for SyntheticDecoder {
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), DecodeError> {
        if self.source.reject_configure {
            return Err(DecodeError::configure(
                &self.source.hash,
                "decoder rejected configuration",
            ));
        }
        if config.codec != SYNTHETIC_CODEC {
            return Err(DecodeError::configure(
                &self.source.hash,
                format!("unsupported codec {}", config.codec),
            ));
        }
        self.configured = Some(config.clone());
        Ok(())
    }

    fn decode(&mut self, chunk: EncodedChunk) -> Result<(), DecodeError> {
        if self.configured.is_none() {
            return Err(DecodeError::decode(
                &self.source.hash,
                "chunk submitted before configure",
            ));
        }
        self.queue.push_back(chunk);
        Ok(())
    }

    fn poll_frame(&mut self) -> Option<VideoFrame> {
        loop {
            if !(self.flushing || self.queue.len() > self.source.latency) {
                return None;
            }
            let stalled = self
                .queue
                .front()
                .zip(self.source.stall_us)
                .is_some_and(|(chunk, stall)| chunk.timestamp_us >= stall);
            if stalled {
                return None;
            }
            let chunk = self.queue.pop_front()?;
            if self.source.dropped_us.contains(&chunk.timestamp_us) {
                continue;
            }
            return Some(self.render(&chunk));
        }
    }

    fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    fn flush(&mut self) {
        self.flushing = true;
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.flushing = false;
    }
}

/// In-memory catalog of sources keyed by hash.
#[derive(Default)]
pub struct SyntheticCatalog {
    sources: HashMap<String, Arc<dyn MediaSource>>,
}

impl SyntheticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl MediaSource + 'static) {
        self.sources
            .insert(source.hash().to_string(), Arc::new(source));
    }

    pub fn with(mut self, source: impl MediaSource + 'static) -> Self {
        self.insert(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl MediaCatalog for SyntheticCatalog {
    fn get_source(&self, hash: &str) -> Option<Arc<dyn MediaSource>> {
        self.sources.get(hash).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut dyn VideoDecoder) -> Vec<Micros> {
        let mut out = Vec::new();
        while let Some(frame) = decoder.poll_frame() {
            out.push(frame.timestamp_us());
            frame.release();
        }
        out
    }

    #[test]
    fn test_demuxer_seeks_to_previous_keyframe() {
        let source = SyntheticSource::new("s", 4_000.0, 25.0).with_keyframe_interval(10);
        let mut demuxer = source.open_demuxer().unwrap();
        demuxer.seek(1_000_000).unwrap();
        let chunk = demuxer.next_chunk().unwrap().unwrap();
        assert!(chunk.key);
        assert_eq!(chunk.timestamp_us, 800_000);
    }

    #[test]
    fn test_demuxer_ends_at_frame_count() {
        let source = SyntheticSource::new("s", 200.0, 25.0);
        let mut demuxer = source.open_demuxer().unwrap();
        let mut count = 0;
        while demuxer.next_chunk().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_decoder_latency_and_flush() {
        let source = SyntheticSource::new("s", 1_000.0, 25.0).with_latency(2);
        let ledger = FrameLedger::new();
        let mut decoder = source.create_decoder(ledger.clone());
        decoder.configure(&source.decoder_config()).unwrap();
        let mut demuxer = source.open_demuxer().unwrap();
        for _ in 0..3 {
            decoder.decode(demuxer.next_chunk().unwrap().unwrap()).unwrap();
        }
        assert_eq!(drain(decoder.as_mut()), vec![0]);
        assert_eq!(decoder.queue_depth(), 2);
        decoder.flush();
        assert_eq!(drain(decoder.as_mut()), vec![40_000, 80_000]);
        assert_eq!(ledger.counts().released, 3);
    }

    #[test]
    fn test_dropped_frames_never_decode() {
        let source = SyntheticSource::new("s", 1_000.0, 25.0).drop_frame_at(80.0);
        let ledger = FrameLedger::new();
        let mut decoder = source.create_decoder(ledger);
        decoder.configure(&source.decoder_config()).unwrap();
        let mut demuxer = source.open_demuxer().unwrap();
        for _ in 0..4 {
            decoder.decode(demuxer.next_chunk().unwrap().unwrap()).unwrap();
        }
        assert_eq!(drain(decoder.as_mut()), vec![0, 40_000, 120_000]);
    }

    #[test]
    fn test_stalled_decoder_holds_chunks_through_flush() {
        let source = SyntheticSource::new("s", 1_000.0, 25.0).stall_from(80.0);
        let mut decoder = source.create_decoder(FrameLedger::new());
        decoder.configure(&source.decoder_config()).unwrap();
        let mut demuxer = source.open_demuxer().unwrap();
        for _ in 0..4 {
            decoder.decode(demuxer.next_chunk().unwrap().unwrap()).unwrap();
        }
        decoder.flush();
        assert_eq!(drain(decoder.as_mut()), vec![0, 40_000]);
        assert_eq!(decoder.queue_depth(), 2);

        decoder.reset();
        assert_eq!(decoder.queue_depth(), 0);
    }

    #[test]
    fn test_configure_rejections() {
        let source = SyntheticSource::new("bad", 1_000.0, 25.0).rejecting_configuration();
        let mut decoder = source.create_decoder(FrameLedger::new());
        assert!(matches!(
            decoder.configure(&source.decoder_config()),
            Err(DecodeError::Configure { .. })
        ));

        let source = SyntheticSource::new("s", 1_000.0, 25.0);
        let mut decoder = source.create_decoder(FrameLedger::new());
        let mut config = source.decoder_config();
        config.codec = "vp9".to_string();
        assert!(decoder.configure(&config).is_err());
        assert!(decoder
            .decode(EncodedChunk {
                timestamp_us: 0,
                duration_us: 40_000,
                key: true,
                data: Vec::new(),
            })
            .is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = SyntheticCatalog::new().with(SyntheticSource::new("a", 1_000.0, 30.0));
        assert!(catalog.get_source("a").is_some());
        assert!(catalog.get_source("missing").is_none());
        assert_eq!(catalog.len(), 1);
    }
}
