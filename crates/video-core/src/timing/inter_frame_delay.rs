//! Inter-frame delay measurement
//!
//! The delay sample for frame j relative to frame i is
//! `(arrival_j - arrival_i) - (ts_j - ts_i) / 90`: how much later the frame
//! arrived than its RTP timestamp spacing predicts. Timestamps are unwrapped
//! so the sample stays correct across the u32 wrap.

use crate::seq::SeqUnwrapper;
use crate::types::RTP_TICKS_PER_MS;

/// Produces per-frame delay samples for the jitter estimator.
#[derive(Debug, Default, Clone)]
pub struct InterFrameDelay {
    ts_unwrapper: SeqUnwrapper<u32>,
    prev: Option<(i64, i64)>,
}

impl InterFrameDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delay sample in ms, or `None` for the first frame.
    pub fn calculate_delay(&mut self, rtp_timestamp: u32, arrival_time_ms: i64) -> Option<f64> {
        let extended_ts = self.ts_unwrapper.unwrap(rtp_timestamp);
        let sample = self.prev.map(|(prev_ts, prev_arrival)| {
            let expected_ms = (extended_ts - prev_ts) as f64 / RTP_TICKS_PER_MS as f64;
            (arrival_time_ms - prev_arrival) as f64 - expected_ms
        });
        self.prev = Some((extended_ts, arrival_time_ms));
        sample
    }

    pub fn reset(&mut self) {
        self.ts_unwrapper.reset();
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_has_no_sample() {
        let mut delay = InterFrameDelay::new();
        assert_eq!(delay.calculate_delay(9000, 0), None);
    }

    #[test]
    fn test_on_time_frames_have_zero_delay() {
        let mut delay = InterFrameDelay::new();
        delay.calculate_delay(0, 0);
        // 33 ms of RTP ticks arriving 33 ms later.
        let sample = delay.calculate_delay(33 * 90, 33).unwrap();
        assert!(sample.abs() < 1e-9);
    }

    #[test]
    fn test_late_frame_has_positive_delay() {
        let mut delay = InterFrameDelay::new();
        delay.calculate_delay(0, 0);
        let sample = delay.calculate_delay(33 * 90, 50).unwrap();
        assert!((sample - 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_wraparound() {
        let mut delay = InterFrameDelay::new();
        delay.calculate_delay(u32::MAX - 89, 0);
        // 90 ticks later, across the wrap, arriving 1 ms later.
        let sample = delay.calculate_delay(0, 1).unwrap();
        assert!(sample.abs() < 1e-9);
    }
}
