//! Inter-frame jitter estimator
//!
//! Smooths per-frame delay variation into a jitter-buffer target using the
//! RFC 3550 recurrence (`J += (|d| - J) / 16`). Retransmitted frames never
//! feed the filter; instead they are counted, and once enough of them have
//! been seen the estimate is padded with the round-trip time so NACK recovery
//! has a chance to complete before the playout deadline.

/// Retransmitted frames observed before RTT padding kicks in.
const NACK_THRESHOLD: u32 = 3;

/// Fixed allowance for OS scheduling noise, in ms.
const OS_NOISE_MS: f64 = 10.0;

/// EWMA jitter estimator with RTT padding for NACK-protected streams.
#[derive(Debug, Clone)]
pub struct JitterEstimator {
    jitter_ms: f64,
    max_jitter_ms: f64,
    samples: u64,
    rtt_ms: i64,
    nack_count: u32,
}

impl Default for JitterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterEstimator {
    pub fn new() -> Self {
        Self {
            jitter_ms: 0.0,
            max_jitter_ms: 0.0,
            samples: 0,
            rtt_ms: 0,
            nack_count: 0,
        }
    }

    /// Feed one inter-frame delay sample from a non-retransmitted frame.
    pub fn update(&mut self, frame_delay_ms: f64) {
        self.jitter_ms += (frame_delay_ms.abs() - self.jitter_ms) / 16.0;
        self.max_jitter_ms = self.max_jitter_ms.max(self.jitter_ms);
        self.samples += 1;
    }

    /// Record that a retransmitted frame reached the buffer.
    pub fn frame_nacked(&mut self) {
        if self.nack_count < NACK_THRESHOLD {
            self.nack_count += 1;
        }
    }

    pub fn update_rtt(&mut self, rtt_ms: i64) {
        self.rtt_ms = rtt_ms.max(0);
    }

    /// Current jitter-buffer target in ms.
    ///
    /// `rtt_multiplier` is 1.0 under NACK-only protection and 0.0 under
    /// NACK+FEC, where retransmissions do not gate the playout deadline.
    pub fn estimate_ms(&self, rtt_multiplier: f64) -> i64 {
        let mut estimate = self.jitter_ms + OS_NOISE_MS;
        if self.nack_count >= NACK_THRESHOLD {
            estimate += self.rtt_ms as f64 * rtt_multiplier;
        }
        estimate.round() as i64
    }

    pub fn reset(&mut self) {
        let rtt_ms = self.rtt_ms;
        *self = Self::new();
        self.rtt_ms = rtt_ms;
    }
}
