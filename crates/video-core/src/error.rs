//! Error types for the video receive core
//!
//! Insert-side rejections are absorbed by the frame buffer (the producer only
//! sees the last-continuous return value), but they are modeled here so the
//! buffer can log and count them uniformly. Decode-side errors propagate to
//! the caller of the decode loop.

use thiserror::Error;

/// Result type alias for video-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for video-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame rejected on the insert path
    #[error("frame rejected: {0}")]
    Frame(#[from] FrameError),

    /// Decoder or decode-dispatch failure
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

/// Insert-side rejection reasons.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame {picture_id} references itself or a later frame")]
    InvalidReference { picture_id: u16 },

    #[error("rtp timestamp {rtp_timestamp} is older than the last decoded frame")]
    StaleTimestamp { rtp_timestamp: u32 },

    #[error("buffer holds {capacity} pictures, non-keyframe dropped")]
    CapacityExceeded { capacity: usize },

    #[error("picture id {picture_id} is behind the last decoded frame")]
    TooOldPictureId { picture_id: u16 },
}

/// Decode-side failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder reported a hard failure.
    #[error("decoder failure (code {code})")]
    Failure { code: i32 },

    #[error("decoder has not been initialized")]
    NotInitialized,

    #[error("unsupported decoder settings: {details}")]
    InvalidSettings { details: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
