//! Receive-side observer traits
//!
//! The core reports into these callbacks instead of owning any metrics or
//! rendering machinery. All methods have empty default bodies so observers
//! implement only what they consume; implementations must be cheap and
//! non-blocking since some notifications fire under the frame buffer lock.

use crate::timing::Timings;
use crate::types::{ContentType, DecodedFrame, FrameCounts, TimingFrameInfo};

/// Statistics sink for the receive pipeline.
pub trait ReceiveStatsCallback: Send + Sync {
    /// A fully assembled frame became continuous for the first time.
    fn on_complete_frame(&self, is_keyframe: bool, size_bytes: usize, content_type: ContentType) {
        let _ = (is_keyframe, size_bytes, content_type);
    }

    /// Delay estimates changed; fired on every superframe delivery.
    fn on_frame_buffer_timings_updated(&self, timings: Timings) {
        let _ = timings;
    }

    /// A frame carrying full pipeline timing finished decoding.
    fn on_timing_frame_info_updated(&self, info: TimingFrameInfo) {
        let _ = info;
    }

    fn on_discarded_packets_updated(&self, discarded: u64) {
        let _ = discarded;
    }

    fn on_frame_counts_updated(&self, counts: FrameCounts) {
        let _ = counts;
    }
}

/// Consumer of decoded output.
pub trait ReceiveCallback: Send + Sync {
    /// Deliver a decoded frame annotated with its arrival metadata.
    fn frame_to_render(
        &self,
        frame: DecodedFrame,
        qp: Option<u8>,
        decode_time_ms: i64,
        content_type: ContentType,
    );

    fn on_decoder_implementation_name(&self, name: &str) {
        let _ = name;
    }
}

/// No-op stats sink for callers that do not collect statistics.
#[derive(Debug, Default)]
pub struct NullReceiveStats;

impl ReceiveStatsCallback for NullReceiveStats {}
