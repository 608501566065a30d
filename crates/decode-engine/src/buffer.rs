//! Bounded frame cache for one source.
//!
//! Entries are keyed by media time and kept in insertion order. Inserting
//! into a full buffer evicts the oldest-inserted entry and releases it.
//! Lookups never block and a miss is just `None`.

use std::collections::VecDeque;

use crate::frame::{Micros, VideoFrame};

/// Result of a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The oldest-inserted entry was evicted and released.
    Evicted,
    /// An entry with the same timestamp was replaced and released.
    Replaced,
}

/// Insertion-ordered frame cache.
#[derive(Debug)]
pub struct FrameBuffer {
    entries: VecDeque<VideoFrame>,
    capacity: usize,
}

impl FrameBuffer {
    /// Create a buffer; capacity is at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn insert(&mut self, frame: VideoFrame) -> InsertOutcome {
        let ts = frame.timestamp_us();
        if let Some(pos) = self.entries.iter().position(|f| f.timestamp_us() == ts) {
            if let Some(old) = self.entries.remove(pos) {
                old.release();
            }
            self.entries.push_back(frame);
            return InsertOutcome::Replaced;
        }

        let mut outcome = InsertOutcome::Inserted;
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                oldest.release();
                outcome = InsertOutcome::Evicted;
            }
        }
        self.entries.push_back(frame);
        outcome
    }

    fn closest(&self, timestamp_us: Micros, tolerance_us: Micros) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, f)| (i, (f.timestamp_us() - timestamp_us).abs()))
            .filter(|(_, dist)| *dist <= tolerance_us)
            .min_by_key(|(_, dist)| *dist)
            .map(|(i, _)| i)
    }

    /// Closest entry within `tolerance_us` of `timestamp_us`.
    pub fn lookup(&self, timestamp_us: Micros, tolerance_us: Micros) -> Option<&VideoFrame> {
        self.closest(timestamp_us, tolerance_us)
            .and_then(|i| self.entries.get(i))
    }

    /// Remove and return the closest in-tolerance entry. The caller becomes
    /// the single consumer responsible for releasing it.
    pub fn take(&mut self, timestamp_us: Micros, tolerance_us: Micros) -> Option<VideoFrame> {
        self.closest(timestamp_us, tolerance_us)
            .and_then(|i| self.entries.remove(i))
    }

    /// Release every entry older than `timestamp_us`. Returns how many.
    pub fn prune_before(&mut self, timestamp_us: Micros) -> usize {
        let before = self.entries.len();
        let mut kept = VecDeque::with_capacity(self.capacity);
        for frame in self.entries.drain(..) {
            if frame.timestamp_us() < timestamp_us {
                frame.release();
            } else {
                kept.push_back(frame);
            }
        }
        self.entries = kept;
        before - self.entries.len()
    }

    /// Smallest and largest buffered timestamps.
    pub fn range(&self) -> Option<(Micros, Micros)> {
        let min = self.entries.iter().map(VideoFrame::timestamp_us).min()?;
        let max = self.entries.iter().map(VideoFrame::timestamp_us).max()?;
        Some((min, max))
    }

    /// Buffered timestamps in insertion order.
    pub fn timestamps(&self) -> Vec<Micros> {
        self.entries.iter().map(VideoFrame::timestamp_us).collect()
    }

    /// Release every entry. Returns how many were released.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for frame in self.entries.drain(..) {
            frame.release();
        }
        count
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}
