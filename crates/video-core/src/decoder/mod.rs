//! Decoder interface and decode dispatch
//!
//! The core does not implement any codec; it drives an external
//! [`VideoDecoder`] and reconciles its (possibly asynchronous, possibly
//! cross-thread) output with the arrival metadata captured at decode time.

mod dispatcher;

pub use dispatcher::{DecodedFrameForwarder, FrameDecoder, DECODER_FRAME_MEMORY_LENGTH};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::{DecodedFrame, EncodedImage};

/// Codec families the receive path can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodecKind {
    Vp8,
    Vp9,
    H264,
    Av1,
    Generic,
}

/// Settings handed to the decoder at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderSettings {
    pub codec: VideoCodecKind,
    pub width: u32,
    pub height: u32,
}

/// What a successful decode call promises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Output will arrive later through the registered callback.
    Pending,
    /// The call consumed the frame but produces no output; no callback will
    /// fire for this timestamp.
    NoOutput,
}

/// Receiver of decoded frames, registered with the decoder.
///
/// Decoders may invoke this from their own threads, after the `decode` call
/// that produced the frame has long returned.
pub trait DecodedImageCallback: Send + Sync {
    fn on_decoded(&self, frame: DecodedFrame, decode_time_ms: Option<i64>, qp: Option<u8>);
}

/// An external video decoder implementation.
pub trait VideoDecoder: Send {
    fn init_decode(
        &mut self,
        settings: &DecoderSettings,
        number_of_cores: u32,
    ) -> Result<(), DecodeError>;

    /// Decode one image. `missing_frames` signals known reference loss.
    fn decode(
        &mut self,
        image: EncodedImage,
        missing_frames: bool,
        render_time_ms: i64,
    ) -> Result<DecodeOutcome, DecodeError>;

    fn register_decode_complete(&mut self, callback: Arc<dyn DecodedImageCallback>);

    /// Whether the decoder wants frames as late as possible (hardware
    /// decoders with internal pacing usually do not).
    fn prefers_late_decoding(&self) -> bool {
        true
    }

    fn implementation_name(&self) -> &str;
}
