//! Demux backpressure.

use std::time::Duration;

use splice_common::config::PacingConfig;

/// Delay before handing the decoder another chunk.
///
/// Zero for an empty queue. Otherwise grows quadratically with queue depth
/// up to `target_queue_depth` and is clamped to `[min_delay, max_delay]`.
/// Non-decreasing in `queue_depth`.
pub fn pacing_delay(config: &PacingConfig, queue_depth: usize) -> Duration {
    if queue_depth == 0 {
        return Duration::ZERO;
    }

    let max = config.max_delay_ms as f64;
    let min = (config.min_delay_ms as f64).min(max);
    let target = config.target_queue_depth.max(1) as f64;

    let ratio = (queue_depth as f64 / target).min(1.0);
    let ms = (ratio * ratio * max).clamp(min, max);
    Duration::from_micros((ms * 1_000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_queue_has_no_delay() {
        assert_eq!(pacing_delay(&PacingConfig::default(), 0), Duration::ZERO);
    }

    #[test]
    fn test_delay_saturates_at_target_depth() {
        let config = PacingConfig::default();
        assert_eq!(pacing_delay(&config, 8), Duration::from_millis(50));
        assert_eq!(pacing_delay(&config, 100), Duration::from_millis(50));
        assert_eq!(pacing_delay(&config, 1), Duration::from_millis(1));
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        let config = PacingConfig {
            min_delay_ms: 10,
            max_delay_ms: 2,
            target_queue_depth: 0,
        };
        assert_eq!(pacing_delay(&config, 3), Duration::from_millis(2));
    }

    proptest! {
        #[test]
        fn delay_is_monotonic_and_bounded(
            a in 0usize..64,
            b in 0usize..64,
            min in 0u64..20,
            max in 20u64..200,
            target in 1usize..32,
        ) {
            let config = PacingConfig { min_delay_ms: min, max_delay_ms: max, target_queue_depth: target };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let d_lo = pacing_delay(&config, lo);
            let d_hi = pacing_delay(&config, hi);
            prop_assert!(d_lo <= d_hi);
            if hi > 0 {
                prop_assert!(d_hi >= Duration::from_millis(min));
            }
            prop_assert!(d_hi <= Duration::from_millis(max));
        }
    }
}
