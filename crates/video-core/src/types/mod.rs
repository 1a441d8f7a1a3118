//! Core types for the video receive path
//!
//! These are the frame-level data structures exchanged between the RTP
//! depacketizer, the frame buffer, the decoder, and the render callback.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// RTP video clock rate in kHz; RTP timestamp deltas divided by this give ms.
pub const RTP_TICKS_PER_MS: i64 = 90;

/// Maximum number of spatial layers in a superframe.
pub const MAX_SPATIAL_LAYERS: u8 = 5;

/// Maximum number of references a frame may carry.
pub const MAX_REFERENCES: usize = 5;

/// Encoded frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    Key,
    Delta,
}

impl Default for FrameType {
    fn default() -> Self {
        FrameType::Delta
    }
}

/// Display rotation to apply before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoRotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Default for VideoRotation {
    fn default() -> Self {
        VideoRotation::Deg0
    }
}

/// Sender-declared content type; authoritative on keyframes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Unspecified,
    Screenshare,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Unspecified
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Unspecified => write!(f, "unspecified"),
            ContentType::Screenshare => write!(f, "screenshare"),
        }
    }
}

/// Color space signaled alongside the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorSpace {
    pub primaries: u8,
    pub transfer: u8,
    pub matrix: u8,
    pub full_range: bool,
}

/// Sender-requested playout delay bounds; negative fields mean "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayoutDelay {
    pub min_ms: i32,
    pub max_ms: i32,
}

impl Default for PlayoutDelay {
    fn default() -> Self {
        Self {
            min_ms: -1,
            max_ms: -1,
        }
    }
}

/// Arrival metadata for one RTP packet contributing to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketInfo {
    pub ssrc: u32,
    pub rtp_sequence_number: u16,
    pub receive_time_ms: i64,
}

/// Flags carried in the video timing RTP header extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingFlags(pub u8);

impl TimingFlags {
    pub const NOT_TRIGGERED: TimingFlags = TimingFlags(0);
    pub const TRIGGERED_BY_TIMER: TimingFlags = TimingFlags(1);
    pub const TRIGGERED_BY_SIZE: TimingFlags = TimingFlags(2);
    pub const INVALID: TimingFlags = TimingFlags(0xff);
}

impl Default for TimingFlags {
    fn default() -> Self {
        TimingFlags::INVALID
    }
}

/// Sender-side pipeline timestamps, in the sender's NTP clock domain, plus
/// the receiver-side depacketization window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTiming {
    pub flags: TimingFlags,
    pub encode_start_ms: i64,
    pub encode_finish_ms: i64,
    pub packetization_finish_ms: i64,
    pub pacer_exit_ms: i64,
    pub network_timestamp_ms: i64,
    pub network2_timestamp_ms: i64,
    pub receive_start_ms: i64,
    pub receive_finish_ms: i64,
}

/// Full-pipeline timing report for one frame, in local clock terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingFrameInfo {
    pub rtp_timestamp: u32,
    pub flags: TimingFlags,
    pub capture_time_ms: i64,
    pub encode_start_ms: i64,
    pub encode_finish_ms: i64,
    pub packetization_finish_ms: i64,
    pub pacer_exit_ms: i64,
    pub network_timestamp_ms: i64,
    pub network2_timestamp_ms: i64,
    pub receive_start_ms: i64,
    pub receive_finish_ms: i64,
    pub decode_start_ms: i64,
    pub decode_finish_ms: i64,
    pub render_time_ms: i64,
}

/// Counts of delivered frames by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCounts {
    pub key_frames: u32,
    pub delta_frames: u32,
}

/// An encoded video frame as produced by the RTP depacketizer.
///
/// A frame is one spatial layer of one temporal instant; all layers sharing a
/// `picture_id` form a superframe and are delivered to the decoder together.
/// `references` name prior picture ids this frame predicts from, always
/// within the same spatial layer; `inter_layer_predicted` adds a dependency
/// on the next lower layer of the same picture.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub picture_id: u16,
    pub spatial_layer: u8,
    pub rtp_timestamp: u32,
    pub received_time_ms: i64,
    /// Target render time; −1 means "derive from the RTP timestamp".
    pub render_time_ms: i64,
    pub references: Vec<u16>,
    pub inter_layer_predicted: bool,
    pub is_last_spatial_layer: bool,
    pub frame_type: FrameType,
    pub payload: Bytes,
    pub delayed_by_retransmission: bool,

    pub rotation: VideoRotation,
    pub content_type: ContentType,
    pub color_space: Option<ColorSpace>,
    pub send_timing: Option<SendTiming>,
    /// Sender capture time in NTP ms; −1 when the sender clock is unknown.
    pub ntp_time_ms: i64,
    pub playout_delay: PlayoutDelay,
    pub packet_infos: Vec<PacketInfo>,

    /// Highest spatial layer present, set on delivered superframes.
    pub spatial_index: u8,
    /// Per-layer payload sizes of a delivered superframe, ascending.
    pub spatial_layer_sizes: Vec<usize>,
}

impl Default for EncodedFrame {
    fn default() -> Self {
        Self {
            picture_id: 0,
            spatial_layer: 0,
            rtp_timestamp: 0,
            received_time_ms: 0,
            render_time_ms: -1,
            references: Vec::new(),
            inter_layer_predicted: false,
            is_last_spatial_layer: true,
            frame_type: FrameType::Delta,
            payload: Bytes::new(),
            delayed_by_retransmission: false,
            rotation: VideoRotation::default(),
            content_type: ContentType::default(),
            color_space: None,
            send_timing: None,
            ntp_time_ms: -1,
            playout_delay: PlayoutDelay::default(),
            packet_infos: Vec::new(),
            spatial_index: 0,
            spatial_layer_sizes: Vec::new(),
        }
    }
}

impl EncodedFrame {
    pub fn is_keyframe(&self) -> bool {
        self.frame_type == FrameType::Key
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Payload size of one spatial layer of a delivered superframe.
    pub fn spatial_layer_size(&self, layer: usize) -> usize {
        self.spatial_layer_sizes.get(layer).copied().unwrap_or(0)
    }
}

/// Borrow-free view of an encoded frame handed to the decoder.
///
/// The dispatcher copies everything it needs into its frame-info slot before
/// decoding, so the decoder may hold onto this image for as long as it likes.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Bytes,
    pub rtp_timestamp: u32,
    pub frame_type: FrameType,
    pub spatial_index: u8,
}

impl EncodedImage {
    pub fn from_frame(frame: &EncodedFrame) -> Self {
        Self {
            data: frame.payload.clone(),
            rtp_timestamp: frame.rtp_timestamp,
            frame_type: frame.frame_type,
            spatial_index: frame.spatial_index,
        }
    }
}

/// A decoded video frame on its way to the renderer.
///
/// The decoder fills the picture fields; the dispatch path re-attaches the
/// arrival metadata from its frame-info slot, keyed by `rtp_timestamp`.
#[derive(Debug, Clone, Default)]
pub struct DecodedFrame {
    pub rtp_timestamp: u32,
    pub width: u32,
    pub height: u32,
    pub ntp_time_ms: i64,
    /// Render timestamp in microseconds.
    pub render_time_us: i64,
    pub rotation: VideoRotation,
    pub color_space: Option<ColorSpace>,
    pub packet_infos: Vec<PacketInfo>,
}
