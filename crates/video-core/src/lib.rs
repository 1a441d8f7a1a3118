//! # video-core
//!
//! Receive-side video core for a real-time conferencing endpoint: a frame
//! jitter buffer that assembles multi-layer superframes from out-of-order
//! inserts, a scheduler that releases them against an adaptive render
//! schedule, and a decode dispatcher that reconciles asynchronous decoder
//! output with arrival-time metadata.
//!
//! The crate deliberately owns no transport, depacketization, codec, or
//! rendering code; those collaborate through the traits in [`decoder`] and
//! [`stats`].
//!
//! ## Architecture
//!
//! - [`timing`] - decode/jitter/playout delay estimation and the render
//!   schedule
//! - [`buffer`] - the jitter buffer: continuity/decodability tracking,
//!   superframe assembly, bounded blocking extraction
//! - [`decoder`] - decoder traits and the decode dispatch with its
//!   frame-info ring
//! - [`receiver`] - composition of the above behind producer/consumer APIs

pub mod buffer;
pub mod clock;
pub mod decoder;
pub mod error;
pub mod receiver;
pub mod seq;
pub mod stats;
pub mod timing;
pub mod types;

pub use error::{DecodeError, Error, FrameError, Result};

/// Commonly used types for working with the receive core.
pub mod prelude {
    pub use crate::buffer::{
        FrameBuffer, FrameBufferConfig, FrameBufferStats, NextFrame, ProtectionMode,
    };
    pub use crate::clock::{Clock, SimulatedClock, SystemClock};
    pub use crate::decoder::{
        DecodeOutcome, DecodedImageCallback, DecoderSettings, FrameDecoder, VideoCodecKind,
        VideoDecoder,
    };
    pub use crate::error::{DecodeError, Error, FrameError, Result};
    pub use crate::receiver::{DecodeStatus, VideoReceiver, VideoReceiverConfig};
    pub use crate::stats::{NullReceiveStats, ReceiveCallback, ReceiveStatsCallback};
    pub use crate::timing::{ReceiveTiming, Timing, TimingConfig, Timings};
    pub use crate::types::{
        ColorSpace, ContentType, DecodedFrame, EncodedFrame, EncodedImage, FrameCounts, FrameType,
        PacketInfo, PlayoutDelay, SendTiming, TimingFrameInfo, VideoRotation,
    };
}
