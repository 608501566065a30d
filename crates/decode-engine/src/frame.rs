//! Decoded frame handles.
//!
//! A [`VideoFrame`] owns an underlying decoder resource. It is released
//! exactly once by calling [`VideoFrame::release`], which consumes the
//! handle, so releasing twice or drawing after release does not compile.
//! Dropping a frame without releasing it is counted as a leak.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Media timestamp in microseconds.
pub type Micros = i64;

/// Shared counters for frame handle lifetimes.
#[derive(Debug, Default)]
pub struct FrameLedger {
    created: AtomicU64,
    released: AtomicU64,
    leaked: AtomicU64,
}

/// Point-in-time copy of a [`FrameLedger`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub created: u64,
    pub released: u64,
    pub leaked: u64,
}

impl LedgerCounts {
    /// Frames created and neither released nor leaked.
    pub fn live(&self) -> u64 {
        self.created
            .saturating_sub(self.released)
            .saturating_sub(self.leaked)
    }
}

impl FrameLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn counts(&self) -> LedgerCounts {
        LedgerCounts {
            created: self.created.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
            leaked: self.leaked.load(Ordering::SeqCst),
        }
    }

    pub fn live(&self) -> u64 {
        self.counts().live()
    }
}

/// Lightweight description of a frame that outlives the handle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FrameRef {
    pub source_id: String,
    pub timestamp_us: Micros,
    pub width: u32,
    pub height: u32,
}

/// A decoded video frame.
#[derive(Debug)]
pub struct VideoFrame {
    source_id: String,
    timestamp_us: Micros,
    duration_us: Micros,
    width: u32,
    height: u32,
    data: Vec<u8>,
    ledger: Arc<FrameLedger>,
    released: bool,
}

impl VideoFrame {
    pub fn new(
        source_id: impl Into<String>,
        timestamp_us: Micros,
        duration_us: Micros,
        width: u32,
        height: u32,
        data: Vec<u8>,
        ledger: Arc<FrameLedger>,
    ) -> Self {
        ledger.created.fetch_add(1, Ordering::SeqCst);
        Self {
            source_id: source_id.into(),
            timestamp_us,
            duration_us,
            width,
            height,
            data,
            ledger,
            released: false,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Media timestamp of the frame (µs).
    pub fn timestamp_us(&self) -> Micros {
        self.timestamp_us
    }

    pub fn duration_us(&self) -> Micros {
        self.duration_us
    }

    /// Media timestamp just past the frame.
    pub fn end_us(&self) -> Micros {
        self.timestamp_us + self.duration_us
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_ref(&self) -> FrameRef {
        FrameRef {
            source_id: self.source_id.clone(),
            timestamp_us: self.timestamp_us,
            width: self.width,
            height: self.height,
        }
    }

    /// Release the underlying resource.
    pub fn release(mut self) {
        self.released = true;
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for VideoFrame {
    fn drop(&mut self) {
        if !self.released {
            self.ledger.leaked.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(
                source = %self.source_id,
                timestamp_us = self.timestamp_us,
                "Video frame dropped without release"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ledger: &Arc<FrameLedger>, ts: Micros) -> VideoFrame {
        VideoFrame::new("src", ts, 40_000, 4, 4, vec![0; 4], ledger.clone())
    }

    #[test]
    fn test_release_is_counted() {
        let ledger = FrameLedger::new();
        let f = frame(&ledger, 0);
        assert_eq!(ledger.live(), 1);
        f.release();
        assert_eq!(
            ledger.counts(),
            LedgerCounts {
                created: 1,
                released: 1,
                leaked: 0
            }
        );
    }

    #[test]
    fn test_drop_without_release_is_a_leak() {
        let ledger = FrameLedger::new();
        drop(frame(&ledger, 40_000));
        let counts = ledger.counts();
        assert_eq!(counts.leaked, 1);
        assert_eq!(counts.released, 0);
        assert_eq!(counts.live(), 0);
    }

    #[test]
    fn test_frame_ref_survives_release() {
        let ledger = FrameLedger::new();
        let f = frame(&ledger, 80_000);
        let r = f.to_ref();
        assert_eq!(f.end_us(), 120_000);
        f.release();
        assert_eq!(r.timestamp_us, 80_000);
        assert_eq!(r.source_id, "src");
    }
}
