//! Frame buffering and scheduling
//!
//! The jitter buffer proper: assembles superframes from out-of-order inserts
//! and schedules them for decoding against the timing policy.

mod decoded_history;
mod frame_buffer;

pub use frame_buffer::{
    FrameBuffer, FrameBufferConfig, FrameBufferStats, NextFrame, ProtectionMode,
};
