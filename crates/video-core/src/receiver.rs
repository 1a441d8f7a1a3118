//! Receive-path composition
//!
//! Wires the frame buffer, timing policy, and decode dispatch into one
//! object with the producer API (insert, RTT, protection mode) on one side
//! and the consumer API (next frame, decode) on the other. Transport,
//! depacketization, and rendering live outside this crate.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::buffer::{FrameBuffer, FrameBufferConfig, FrameBufferStats, NextFrame, ProtectionMode};
use crate::clock::Clock;
use crate::decoder::{DecodedFrameForwarder, DecoderSettings, FrameDecoder, VideoDecoder};
use crate::error::Result;
use crate::stats::{ReceiveCallback, ReceiveStatsCallback};
use crate::timing::{ReceiveTiming, Timing, TimingConfig, Timings};
use crate::types::EncodedFrame;

/// Configuration for [`VideoReceiver`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoReceiverConfig {
    pub frame_buffer: FrameBufferConfig,
    pub timing: TimingConfig,
}

/// Outcome of one pass through the decode loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A superframe was delivered to the decoder.
    Decoded,
    /// Nothing became decodable within the wait budget.
    TimedOut,
    /// The receiver was stopped.
    Stopped,
}

/// The receive-side core of a conferencing endpoint, for one video stream.
pub struct VideoReceiver {
    clock: Arc<dyn Clock>,
    timing: Arc<dyn Timing>,
    frame_buffer: Arc<FrameBuffer>,
    decoder: tokio::sync::Mutex<FrameDecoder>,
}

impl VideoReceiver {
    pub fn new(
        clock: Arc<dyn Clock>,
        decoder: Box<dyn VideoDecoder>,
        receive_callback: Arc<dyn ReceiveCallback>,
        stats_callback: Arc<dyn ReceiveStatsCallback>,
        config: VideoReceiverConfig,
    ) -> Self {
        let timing: Arc<dyn Timing> = Arc::new(ReceiveTiming::with_config(config.timing));
        let forwarder = Arc::new(DecodedFrameForwarder::new(
            clock.clone(),
            timing.clone(),
            receive_callback,
        ));
        let frame_decoder = FrameDecoder::new(decoder, timing.clone(), forwarder);
        let frame_buffer = Arc::new(FrameBuffer::new(
            clock.clone(),
            timing.clone(),
            stats_callback,
            config.frame_buffer,
        ));
        info!("video receiver created");
        Self {
            clock,
            timing,
            frame_buffer,
            decoder: tokio::sync::Mutex::new(frame_decoder),
        }
    }

    pub async fn init_decode(&self, settings: &DecoderSettings, number_of_cores: u32) -> Result<()> {
        self.decoder.lock().await.init_decode(settings, number_of_cores)
    }

    /// Producer API: insert a depacketized frame.
    ///
    /// Returns the last continuous picture id, as
    /// [`FrameBuffer::insert`] does.
    pub async fn insert_frame(&self, frame: EncodedFrame) -> Option<u16> {
        self.frame_buffer.insert(frame).await
    }

    pub async fn update_rtt(&self, rtt_ms: i64) {
        self.frame_buffer.update_rtt(rtt_ms).await;
    }

    pub async fn set_protection_mode(&self, mode: ProtectionMode) {
        self.frame_buffer.set_protection_mode(mode).await;
    }

    /// Consumer API: wait for the next decodable superframe.
    pub async fn next_frame(&self, max_wait: Duration, keyframe_required: bool) -> NextFrame {
        self.frame_buffer.next_frame(max_wait, keyframe_required).await
    }

    /// Consumer API: one decode-loop pass; waits for a superframe and hands
    /// it to the decoder.
    pub async fn decode_next(
        &self,
        max_wait: Duration,
        keyframe_required: bool,
    ) -> Result<DecodeStatus> {
        match self.frame_buffer.next_frame(max_wait, keyframe_required).await {
            NextFrame::Frame(frame) => {
                let mut decoder = self.decoder.lock().await;
                decoder.decode(&frame, self.clock.now_ms())?;
                Ok(DecodeStatus::Decoded)
            }
            NextFrame::TimedOut => Ok(DecodeStatus::TimedOut),
            NextFrame::Stopped => Ok(DecodeStatus::Stopped),
        }
    }

    /// Whether the registered decoder wants frames held until render time.
    pub async fn decoder_prefers_late_decoding(&self) -> bool {
        self.decoder.lock().await.prefers_late_decoding()
    }

    /// Stop the receiver; a blocked consumer observes `Stopped` once.
    pub async fn stop(&self) {
        self.frame_buffer.stop().await;
    }

    pub async fn clear(&self) {
        self.frame_buffer.clear().await;
    }

    pub fn timings(&self) -> Timings {
        self.timing.timings()
    }

    pub async fn frame_buffer_stats(&self) -> FrameBufferStats {
        self.frame_buffer.stats().await
    }
}
