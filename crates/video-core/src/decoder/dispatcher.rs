//! Decode dispatch and callback reconciliation
//!
//! [`FrameDecoder`] hands assembled superframes to the decoder after copying
//! every piece of metadata the output path will need into a frame-info slot.
//! The decoder's callback may fire on another thread and after the source
//! frame is gone; [`DecodedFrameForwarder`] then rebuilds the decoded frame's
//! annotations purely from the slot, looked up by RTP timestamp.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{trace, warn};

use crate::clock::Clock;
use crate::decoder::{DecodeOutcome, DecodedImageCallback, DecoderSettings, VideoDecoder};
use crate::error::{DecodeError, Error, Result};
use crate::stats::ReceiveCallback;
use crate::timing::Timing;
use crate::types::{
    ColorSpace, ContentType, DecodedFrame, EncodedFrame, EncodedImage, PacketInfo, SendTiming,
    TimingFlags, TimingFrameInfo, VideoRotation,
};

/// Number of in-flight frame-info slots kept for decoder callbacks.
pub const DECODER_FRAME_MEMORY_LENGTH: usize = 32;

/// Metadata captured at decode time, keyed by RTP timestamp.
#[derive(Debug, Clone)]
struct FrameInfo {
    rtp_timestamp: u32,
    decode_start_ms: i64,
    render_time_ms: i64,
    rotation: VideoRotation,
    color_space: Option<ColorSpace>,
    packet_infos: Vec<PacketInfo>,
    ntp_time_ms: i64,
    send_timing: Option<SendTiming>,
    content_type: ContentType,
}

/// Bounded timestamp-keyed slot store.
///
/// When the decoder backs up past the capacity the oldest slot is dropped;
/// its callback, if it ever arrives, is discarded as an orphan.
#[derive(Debug)]
struct TimestampMap {
    capacity: usize,
    slots: VecDeque<FrameInfo>,
}

impl TimestampMap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    fn add(&mut self, info: FrameInfo) {
        if self.slots.len() == self.capacity {
            let dropped = self.slots.pop_front();
            if let Some(dropped) = dropped {
                trace!(
                    rtp_timestamp = dropped.rtp_timestamp,
                    "frame info ring full, dropping oldest slot"
                );
            }
        }
        self.slots.push_back(info);
    }

    fn pop(&mut self, rtp_timestamp: u32) -> Option<FrameInfo> {
        let position = self
            .slots
            .iter()
            .position(|slot| slot.rtp_timestamp == rtp_timestamp)?;
        self.slots.remove(position)
    }
}

/// Reconciles decoder output with the metadata captured at decode time.
pub struct DecodedFrameForwarder {
    clock: Arc<dyn Clock>,
    timing: Arc<dyn Timing>,
    receive_callback: Arc<dyn ReceiveCallback>,
    /// Local-to-NTP clock offset captured at construction.
    ntp_offset_ms: i64,
    map: Mutex<TimestampMap>,
}

impl DecodedFrameForwarder {
    pub fn new(
        clock: Arc<dyn Clock>,
        timing: Arc<dyn Timing>,
        receive_callback: Arc<dyn ReceiveCallback>,
    ) -> Self {
        let ntp_offset_ms = clock.ntp_now_ms() - clock.now_ms();
        Self {
            clock,
            timing,
            receive_callback,
            ntp_offset_ms,
            map: Mutex::new(TimestampMap::new(DECODER_FRAME_MEMORY_LENGTH)),
        }
    }

    fn map_frame(&self, info: FrameInfo) {
        self.map.lock().unwrap().add(info);
    }

    fn drop_slot(&self, rtp_timestamp: u32) {
        self.map.lock().unwrap().pop(rtp_timestamp);
    }

    fn forward_implementation_name(&self, name: &str) {
        self.receive_callback.on_decoder_implementation_name(name);
    }

    /// Translates sender-side NTP timestamps into the local clock domain.
    ///
    /// When the sender clock was never estimated (`ntp_time_ms < 0`) every
    /// sender timestamp is shifted below zero so the fields remain mutually
    /// comparable while being recognizably unanchored.
    fn build_timing_frame_info(
        &self,
        info: &FrameInfo,
        timing: &SendTiming,
        ntp_time_ms: i64,
        now_ms: i64,
    ) -> TimingFrameInfo {
        let offset = self.ntp_offset_ms;
        let capture_time_ms = ntp_time_ms - offset;
        let encode_start_ms = timing.encode_start_ms - offset;
        let encode_finish_ms = timing.encode_finish_ms - offset;
        let packetization_finish_ms = timing.packetization_finish_ms - offset;
        let pacer_exit_ms = timing.pacer_exit_ms - offset;
        let network_timestamp_ms = timing.network_timestamp_ms - offset;
        let network2_timestamp_ms = timing.network2_timestamp_ms - offset;

        let mut sender_delta_ms = 0;
        if ntp_time_ms < 0 {
            sender_delta_ms = [
                capture_time_ms,
                encode_start_ms,
                encode_finish_ms,
                packetization_finish_ms,
                pacer_exit_ms,
                network_timestamp_ms,
                network2_timestamp_ms,
            ]
            .into_iter()
            .max()
            .unwrap_or(0)
                + 1;
        }

        TimingFrameInfo {
            rtp_timestamp: info.rtp_timestamp,
            flags: timing.flags,
            capture_time_ms: capture_time_ms - sender_delta_ms,
            encode_start_ms: encode_start_ms - sender_delta_ms,
            encode_finish_ms: encode_finish_ms - sender_delta_ms,
            packetization_finish_ms: packetization_finish_ms - sender_delta_ms,
            pacer_exit_ms: pacer_exit_ms - sender_delta_ms,
            network_timestamp_ms: network_timestamp_ms - sender_delta_ms,
            network2_timestamp_ms: network2_timestamp_ms - sender_delta_ms,
            receive_start_ms: timing.receive_start_ms,
            receive_finish_ms: timing.receive_finish_ms,
            decode_start_ms: info.decode_start_ms,
            decode_finish_ms: now_ms,
            render_time_ms: info.render_time_ms,
        }
    }
}

impl DecodedImageCallback for DecodedFrameForwarder {
    fn on_decoded(&self, mut frame: DecodedFrame, decode_time_ms: Option<i64>, qp: Option<u8>) {
        let info = {
            let mut map = self.map.lock().unwrap();
            map.pop(frame.rtp_timestamp)
        };
        let Some(info) = info else {
            warn!(
                rtp_timestamp = frame.rtp_timestamp,
                "too many frames backed up in the decoder, dropping output"
            );
            return;
        };

        frame.ntp_time_ms = info.ntp_time_ms;
        if info.color_space.is_some() {
            frame.color_space = info.color_space;
        }
        frame.packet_infos = info.packet_infos.clone();
        frame.rotation = info.rotation;

        let now_ms = self.clock.now_ms();
        let decode_time_ms = decode_time_ms.unwrap_or(now_ms - info.decode_start_ms);
        self.timing.stop_decode_timer(decode_time_ms, now_ms);

        if let Some(send_timing) = &info.send_timing {
            if send_timing.flags != TimingFlags::INVALID {
                let timing_info =
                    self.build_timing_frame_info(&info, send_timing, frame.ntp_time_ms, now_ms);
                self.timing.set_timing_frame_info(timing_info);
            }
        }

        frame.render_time_us = info.render_time_ms * 1000;
        self.receive_callback
            .frame_to_render(frame, qp, decode_time_ms, info.content_type);
    }
}

/// Drives the decoder and owns the frame-info bookkeeping.
pub struct FrameDecoder {
    decoder: Box<dyn VideoDecoder>,
    timing: Arc<dyn Timing>,
    forwarder: Arc<DecodedFrameForwarder>,
    last_keyframe_content_type: ContentType,
    initialized: bool,
}

impl FrameDecoder {
    pub fn new(
        mut decoder: Box<dyn VideoDecoder>,
        timing: Arc<dyn Timing>,
        forwarder: Arc<DecodedFrameForwarder>,
    ) -> Self {
        decoder.register_decode_complete(forwarder.clone());
        Self {
            decoder,
            timing,
            forwarder,
            last_keyframe_content_type: ContentType::Unspecified,
            initialized: false,
        }
    }

    pub fn init_decode(&mut self, settings: &DecoderSettings, number_of_cores: u32) -> Result<()> {
        self.decoder
            .init_decode(settings, number_of_cores)
            .map_err(Error::Decode)?;
        self.initialized = true;
        Ok(())
    }

    pub fn prefers_late_decoding(&self) -> bool {
        self.decoder.prefers_late_decoding()
    }

    /// Dispatch one assembled superframe to the decoder.
    ///
    /// All metadata the callback path needs is copied into a slot before the
    /// decoder is invoked; nothing borrowed from `frame` survives this call.
    pub fn decode(&mut self, frame: &EncodedFrame, now_ms: i64) -> Result<()> {
        if !self.initialized {
            return Err(Error::Decode(DecodeError::NotInitialized));
        }

        // Content type is authoritative on keyframes only; delta frames
        // inherit the last keyframe's.
        let content_type = if frame.is_keyframe() {
            self.last_keyframe_content_type = frame.content_type;
            frame.content_type
        } else {
            self.last_keyframe_content_type
        };

        self.timing.update_current_delay(frame.render_time_ms, now_ms);
        self.forwarder.map_frame(FrameInfo {
            rtp_timestamp: frame.rtp_timestamp,
            decode_start_ms: now_ms,
            render_time_ms: frame.render_time_ms,
            rotation: frame.rotation,
            color_space: frame.color_space,
            packet_infos: frame.packet_infos.clone(),
            ntp_time_ms: frame.ntp_time_ms,
            send_timing: frame.send_timing,
            content_type,
        });

        let outcome = self.decoder.decode(
            EncodedImage::from_frame(frame),
            false,
            frame.render_time_ms,
        );
        self.forwarder
            .forward_implementation_name(self.decoder.implementation_name());

        match outcome {
            Ok(DecodeOutcome::Pending) => Ok(()),
            Ok(DecodeOutcome::NoOutput) => {
                // No callback will come for this timestamp.
                self.forwarder.drop_slot(frame.rtp_timestamp);
                Ok(())
            }
            Err(err) => {
                warn!(
                    rtp_timestamp = frame.rtp_timestamp,
                    %err,
                    "failed to decode frame"
                );
                self.forwarder.drop_slot(frame.rtp_timestamp);
                Err(Error::Decode(err))
            }
        }
    }
}
