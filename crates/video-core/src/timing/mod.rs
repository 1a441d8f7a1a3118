//! Decode and render timing policy
//!
//! Centralizes every delay decision on the receive path: the jitter-buffer
//! delay pushed in by the frame buffer, the decode-time estimate fed back by
//! the decode dispatcher, and the playout delay bounds requested by the
//! sender. The frame scheduler itself stays purely mechanical; it only asks
//! `render_time_ms` and `max_waiting_time_ms`.

mod inter_frame_delay;
mod jitter_estimator;

pub use inter_frame_delay::InterFrameDelay;
pub use jitter_estimator::JitterEstimator;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::seq::SeqUnwrapper;
use crate::types::{PlayoutDelay, TimingFrameInfo, RTP_TICKS_PER_MS};

/// Smoothing factor for the decode-time EWMA.
const DECODE_TIME_ALPHA: f64 = 0.125;

/// Snapshot of the current delay estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub max_decode_ms: i64,
    pub current_delay_ms: i64,
    pub target_delay_ms: i64,
    pub jitter_buffer_ms: i64,
    pub min_playout_delay_ms: i64,
    pub render_delay_ms: i64,
}

/// Configuration for [`ReceiveTiming`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Lower bound on the playout delay, overridable per-stream.
    pub min_playout_delay_ms: i64,
    /// Upper bound on the playout delay.
    pub max_playout_delay_ms: i64,
    /// Time budgeted for the renderer itself.
    pub render_delay_ms: i64,
    /// Largest per-update step when walking the current delay to its target.
    pub max_delay_step_ms: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_playout_delay_ms: 0,
            max_playout_delay_ms: 10_000,
            render_delay_ms: 10,
            max_delay_step_ms: 100,
        }
    }
}

/// Timing policy consumed by the frame buffer and the decode dispatcher.
///
/// Production code uses [`ReceiveTiming`]; scheduling tests substitute an
/// implementation with fixed delays. All methods are safe to call from any
/// thread. Lock order: the frame buffer lock may be held while calling in
/// here, never the reverse.
pub trait Timing: Send + Sync {
    /// Wall-clock render time for a frame, monotone in RTP order.
    fn render_time_ms(&self, rtp_timestamp: u32, now_ms: i64) -> i64;

    /// How long the consumer may keep waiting before this frame must be
    /// handed to the decoder.
    fn max_waiting_time_ms(&self, render_time_ms: i64, now_ms: i64) -> i64;

    /// Push the current jitter-buffer delay estimate.
    fn set_jitter_delay_ms(&self, delay_ms: i64);

    /// Apply a sender-requested playout delay; negative fields are ignored.
    fn set_playout_delay(&self, delay: PlayoutDelay);

    /// Walk the actual delay toward the target; called per decoded frame.
    fn update_current_delay(&self, render_time_ms: i64, now_ms: i64);

    /// Feed back one measured decode duration.
    fn stop_decode_timer(&self, decode_time_ms: i64, now_ms: i64);

    fn timings(&self) -> Timings;

    fn set_timing_frame_info(&self, info: TimingFrameInfo);

    /// Takes the pending timing report, if any.
    fn timing_frame_info(&self) -> Option<TimingFrameInfo>;

    /// Drop the render-time anchor and learned delays after a timing anomaly.
    fn reset(&self);
}

#[derive(Debug)]
struct TimingState {
    ts_unwrapper: SeqUnwrapper<u32>,
    /// First observed (extended timestamp, wall clock) pair.
    anchor: Option<(i64, i64)>,
    min_playout_delay_ms: i64,
    max_playout_delay_ms: i64,
    jitter_delay_ms: i64,
    current_delay_ms: i64,
    decode_time_ewma_ms: f64,
    decode_samples: u64,
    timing_frame_info: Option<TimingFrameInfo>,
}

/// Production [`Timing`] implementation.
pub struct ReceiveTiming {
    config: TimingConfig,
    state: Mutex<TimingState>,
}

impl ReceiveTiming {
    pub fn new() -> Self {
        Self::with_config(TimingConfig::default())
    }

    pub fn with_config(config: TimingConfig) -> Self {
        let state = TimingState {
            ts_unwrapper: SeqUnwrapper::new(),
            anchor: None,
            min_playout_delay_ms: config.min_playout_delay_ms,
            max_playout_delay_ms: config.max_playout_delay_ms,
            jitter_delay_ms: 0,
            current_delay_ms: 0,
            decode_time_ewma_ms: 0.0,
            decode_samples: 0,
            timing_frame_info: None,
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    fn required_decode_time_ms(state: &TimingState) -> i64 {
        state.decode_time_ewma_ms.round() as i64
    }

    fn target_delay_ms(&self, state: &TimingState) -> i64 {
        let composed =
            state.jitter_delay_ms + Self::required_decode_time_ms(state) + self.config.render_delay_ms;
        composed.max(state.min_playout_delay_ms)
    }
}

impl Default for ReceiveTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl Timing for ReceiveTiming {
    fn render_time_ms(&self, rtp_timestamp: u32, now_ms: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        // A zero/zero playout delay means "decode as soon as possible".
        if state.min_playout_delay_ms == 0 && state.max_playout_delay_ms == 0 {
            return 0;
        }
        let extended_ts = state.ts_unwrapper.unwrap(rtp_timestamp);
        let (anchor_ts, anchor_ms) = *state.anchor.get_or_insert((extended_ts, now_ms));
        let base_ms = anchor_ms + (extended_ts - anchor_ts) / RTP_TICKS_PER_MS;
        let delay = state
            .current_delay_ms
            .max(state.min_playout_delay_ms)
            .min(state.max_playout_delay_ms.max(state.min_playout_delay_ms));
        base_ms + delay
    }

    fn max_waiting_time_ms(&self, render_time_ms: i64, now_ms: i64) -> i64 {
        let state = self.state.lock().unwrap();
        render_time_ms - now_ms - Self::required_decode_time_ms(&state)
    }

    fn set_jitter_delay_ms(&self, delay_ms: i64) {
        let mut state = self.state.lock().unwrap();
        if delay_ms != state.jitter_delay_ms {
            debug!(jitter_delay_ms = delay_ms, "jitter delay updated");
            state.jitter_delay_ms = delay_ms;
        }
    }

    fn set_playout_delay(&self, delay: PlayoutDelay) {
        let mut state = self.state.lock().unwrap();
        if delay.min_ms >= 0 {
            state.min_playout_delay_ms = delay.min_ms as i64;
        }
        if delay.max_ms >= 0 {
            state.max_playout_delay_ms = delay.max_ms as i64;
        }
    }

    fn update_current_delay(&self, _render_time_ms: i64, _now_ms: i64) {
        let mut state = self.state.lock().unwrap();
        let target = self.target_delay_ms(&state);
        if state.current_delay_ms == 0 {
            state.current_delay_ms = target;
        } else {
            let step = (target - state.current_delay_ms)
                .clamp(-self.config.max_delay_step_ms, self.config.max_delay_step_ms);
            state.current_delay_ms += step;
        }
    }

    fn stop_decode_timer(&self, decode_time_ms: i64, _now_ms: i64) {
        let mut state = self.state.lock().unwrap();
        let sample = decode_time_ms.max(0) as f64;
        if state.decode_samples == 0 {
            state.decode_time_ewma_ms = sample;
        } else {
            state.decode_time_ewma_ms += (sample - state.decode_time_ewma_ms) * DECODE_TIME_ALPHA;
        }
        state.decode_samples += 1;
    }

    fn timings(&self) -> Timings {
        let state = self.state.lock().unwrap();
        Timings {
            max_decode_ms: Self::required_decode_time_ms(&state),
            current_delay_ms: state.current_delay_ms,
            target_delay_ms: self.target_delay_ms(&state),
            jitter_buffer_ms: state.jitter_delay_ms,
            min_playout_delay_ms: state.min_playout_delay_ms,
            render_delay_ms: self.config.render_delay_ms,
        }
    }

    fn set_timing_frame_info(&self, info: TimingFrameInfo) {
        self.state.lock().unwrap().timing_frame_info = Some(info);
    }

    fn timing_frame_info(&self) -> Option<TimingFrameInfo> {
        self.state.lock().unwrap().timing_frame_info.take()
    }

    fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        debug!("resetting receive timing");
        state.ts_unwrapper.reset();
        state.anchor = None;
        state.current_delay_ms = 0;
        state.decode_time_ewma_ms = 0.0;
        state.decode_samples = 0;
    }
}
