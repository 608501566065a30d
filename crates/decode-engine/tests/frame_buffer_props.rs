use proptest::prelude::*;

use splice_decode_engine::{FrameBuffer, FrameLedger, VideoFrame};

const FRAME_US: i64 = 40_000;

proptest! {
    #[test]
    fn buffer_keeps_the_newest_and_releases_the_rest(
        capacity in 1usize..64,
        inserts in 0i64..300,
    ) {
        let ledger = FrameLedger::new();
        let mut buffer = FrameBuffer::new(capacity);
        for i in 0..inserts {
            buffer.insert(VideoFrame::new("p", i * FRAME_US, FRAME_US, 1, 1, Vec::new(), ledger.clone()));
            prop_assert!(buffer.len() <= capacity);
        }

        let kept = (inserts as usize).min(capacity) as i64;
        let expected: Vec<i64> = (inserts - kept..inserts).map(|i| i * FRAME_US).collect();
        prop_assert_eq!(buffer.timestamps(), expected);
        prop_assert_eq!(ledger.counts().released, (inserts - kept) as u64);
        prop_assert_eq!(ledger.counts().leaked, 0);
    }

    #[test]
    fn lookup_hits_only_within_tolerance(
        offset in -60_000i64..60_000,
        factor in 0.5f64..1.5,
    ) {
        let ledger = FrameLedger::new();
        let mut buffer = FrameBuffer::new(8);
        buffer.insert(VideoFrame::new("p", 400_000, FRAME_US, 1, 1, Vec::new(), ledger.clone()));
        let tolerance = (factor * FRAME_US as f64) as i64;
        let hit = buffer.lookup(400_000 + offset, tolerance).is_some();
        prop_assert_eq!(hit, offset.abs() <= tolerance);
    }
}
