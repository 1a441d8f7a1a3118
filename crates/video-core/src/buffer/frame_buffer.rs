//! Frame jitter buffer and superframe scheduler
//!
//! The producer inserts encoded frames as the depacketizer completes them,
//! in any order and with gaps. The buffer tracks two properties per frame:
//! *continuity* (every reference is present, transitively) and *decodability*
//! (every reference has already been handed to the decoder). The consumer
//! blocks in [`FrameBuffer::next_frame`] until the highest-priority decodable
//! superframe is due per the timing policy, then receives all of its spatial
//! layers combined into one decode unit.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace, warn};

use crate::buffer::decoded_history::DecodedFramesHistory;
use crate::clock::Clock;
use crate::error::FrameError;
use crate::seq::WrappingId;
use crate::stats::ReceiveStatsCallback;
use crate::timing::{InterFrameDelay, JitterEstimator, Timing};
use crate::types::{EncodedFrame, FrameCounts, MAX_REFERENCES, MAX_SPATIAL_LAYERS};

/// Loss-protection mode of the stream, as negotiated by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionMode {
    /// Retransmission-only recovery; RTT pads the jitter target.
    Nack,
    /// Retransmission plus forward error correction; RTT is not added.
    NackFec,
}

impl Default for ProtectionMode {
    fn default() -> Self {
        ProtectionMode::Nack
    }
}

/// Outcome of a [`FrameBuffer::next_frame`] call.
#[derive(Debug)]
pub enum NextFrame {
    /// A superframe ready for decoding.
    Frame(Box<EncodedFrame>),
    /// No decodable frame became due within the wait budget.
    TimedOut,
    /// The buffer was stopped; the consumer must not call again.
    Stopped,
}

impl NextFrame {
    /// Unwraps the delivered superframe, if any.
    pub fn frame(self) -> Option<Box<EncodedFrame>> {
        match self {
            NextFrame::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Configuration for [`FrameBuffer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameBufferConfig {
    /// Hard cap on distinct buffered picture ids.
    pub max_buffered_pictures: usize,
    /// How far past its render deadline a frame may be before the scheduler
    /// prefers skipping to a newer decodable superframe.
    pub max_frame_delay_ms: i64,
    /// Render times further than this from now are treated as corrupt and
    /// reset the timing state.
    pub max_render_skew_ms: i64,
}

impl Default for FrameBufferConfig {
    fn default() -> Self {
        Self {
            max_buffered_pictures: 600,
            max_frame_delay_ms: 5,
            max_render_skew_ms: 10_000,
        }
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FrameBufferStats {
    pub frames_inserted: u64,
    pub superframes_delivered: u64,
    /// Frames evicted without ever reaching the decoder.
    pub frames_dropped: u64,
    pub duplicate_inserts: u64,
    pub invalid_reference_rejects: u64,
    pub stale_timestamp_rejects: u64,
    pub capacity_rejects: u64,
    pub buffered_pictures: usize,
}

/// Store key: extended picture id plus spatial layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct FrameKey {
    picture_id: i64,
    spatial_layer: u8,
}

struct FrameEntry {
    frame: EncodedFrame,
    extended_ts: i64,
    /// Dependencies gating continuity: references plus the inter-layer one.
    continuity_deps: Vec<FrameKey>,
    /// Dependencies gating decodability: references only. Spatial layers of
    /// one superframe are decoded together, so the inter-layer dependency is
    /// satisfied by construction at delivery.
    decode_deps: Vec<FrameKey>,
    num_missing_continuous: usize,
    num_missing_decodable: usize,
    continuous: bool,
}

struct BufferState {
    frames: BTreeMap<FrameKey, FrameEntry>,
    pid_unwrapper: crate::seq::SeqUnwrapper<u16>,
    ts_unwrapper: crate::seq::SeqUnwrapper<u32>,
    last_continuous: Option<FrameKey>,
    decoded: DecodedFramesHistory,
    stopped: bool,
    protection_mode: ProtectionMode,
    jitter_estimator: JitterEstimator,
    inter_frame_delay: InterFrameDelay,
    frame_counts: FrameCounts,
    stats: FrameBufferStats,
}

struct Candidate {
    keys: Vec<FrameKey>,
    render_time_ms: i64,
    wait_ms: i64,
}

/// The receive-side jitter buffer.
pub struct FrameBuffer {
    clock: Arc<dyn Clock>,
    timing: Arc<dyn Timing>,
    stats_callback: Arc<dyn ReceiveStatsCallback>,
    config: FrameBufferConfig,
    state: Mutex<BufferState>,
    frame_inserted: Notify,
}

impl FrameBuffer {
    pub fn new(
        clock: Arc<dyn Clock>,
        timing: Arc<dyn Timing>,
        stats_callback: Arc<dyn ReceiveStatsCallback>,
        config: FrameBufferConfig,
    ) -> Self {
        debug!(?config, "creating FrameBuffer");
        Self {
            clock,
            timing,
            stats_callback,
            config,
            state: Mutex::new(BufferState {
                frames: BTreeMap::new(),
                pid_unwrapper: crate::seq::SeqUnwrapper::new(),
                ts_unwrapper: crate::seq::SeqUnwrapper::new(),
                last_continuous: None,
                decoded: DecodedFramesHistory::new(),
                stopped: false,
                protection_mode: ProtectionMode::default(),
                jitter_estimator: JitterEstimator::new(),
                inter_frame_delay: InterFrameDelay::new(),
                frame_counts: FrameCounts::default(),
                stats: FrameBufferStats::default(),
            }),
            frame_inserted: Notify::new(),
        }
    }

    /// Insert a frame completed by the depacketizer.
    ///
    /// Returns the picture id of the furthest continuous frame reachable in
    /// the buffer, or `None` when no frame is continuous yet (which is also
    /// what every rejected insert reports; insert-side errors are absorbed).
    pub async fn insert(&self, frame: EncodedFrame) -> Option<u16> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        match self.try_insert(state, frame) {
            Ok(inserted) => {
                if inserted {
                    state.stats.frames_inserted += 1;
                    self.frame_inserted.notify_one();
                }
            }
            Err(err) => self.absorb_insert_error(state, err),
        }
        state.stats.buffered_pictures = picture_count(&state.frames);
        last_continuous_picture_id(state)
    }

    fn try_insert(&self, state: &mut BufferState, frame: EncodedFrame) -> Result<bool, FrameError> {
        if frame.spatial_layer >= MAX_SPATIAL_LAYERS || frame.references.len() > MAX_REFERENCES {
            warn!(
                picture_id = frame.picture_id,
                spatial_layer = frame.spatial_layer,
                num_references = frame.references.len(),
                "frame outside supported layer/reference limits, dropping"
            );
            return Err(FrameError::InvalidReference {
                picture_id: frame.picture_id,
            });
        }

        // A frame may only reference strictly older pictures.
        for &reference in &frame.references {
            if reference.wrapping_diff(frame.picture_id) >= 0 {
                return Err(FrameError::InvalidReference {
                    picture_id: frame.picture_id,
                });
            }
        }

        let extended_pid = state.pid_unwrapper.unwrap(frame.picture_id);
        let extended_ts = state.ts_unwrapper.unwrap(frame.rtp_timestamp);
        let key = FrameKey {
            picture_id: extended_pid,
            spatial_layer: frame.spatial_layer,
        };

        if !contains_picture(&state.frames, extended_pid)
            && picture_count(&state.frames) >= self.config.max_buffered_pictures
        {
            if frame.is_keyframe() {
                warn!(
                    picture_id = frame.picture_id,
                    "buffer full, clearing on incoming keyframe"
                );
                self.clear_frames_and_history(state);
            } else {
                return Err(FrameError::CapacityExceeded {
                    capacity: self.config.max_buffered_pictures,
                });
            }
        }

        if let Some((last_pid, last_ts)) = state.decoded.last_decoded() {
            if last_ts > extended_ts {
                return Err(FrameError::StaleTimestamp {
                    rtp_timestamp: frame.rtp_timestamp,
                });
            }
            if extended_pid <= last_pid {
                // A keyframe with an older picture id but a newer timestamp
                // marks a sender restart; re-seed the buffer from it.
                if frame.is_keyframe() && extended_ts > last_ts {
                    debug!(
                        picture_id = frame.picture_id,
                        "keyframe with jumped-back picture id, re-seeding buffer"
                    );
                    self.clear_frames_and_history(state);
                } else {
                    return Err(FrameError::TooOldPictureId {
                        picture_id: frame.picture_id,
                    });
                }
            }
        }

        if state.frames.contains_key(&key) {
            trace!(
                picture_id = frame.picture_id,
                spatial_layer = frame.spatial_layer,
                "duplicate frame, ignoring"
            );
            state.stats.duplicate_inserts += 1;
            return Ok(false);
        }

        self.timing.set_playout_delay(frame.playout_delay);

        let entry = self.build_entry(state, key, extended_ts, frame);
        let continuous = entry.continuous;
        state.frames.insert(key, entry);
        if continuous {
            self.propagate_continuity(state, key);
        }
        Ok(true)
    }

    /// Computes the dependency sets and missing counters for a new frame.
    fn build_entry(
        &self,
        state: &BufferState,
        key: FrameKey,
        extended_ts: i64,
        frame: EncodedFrame,
    ) -> FrameEntry {
        let mut continuity_deps = Vec::new();
        let mut decode_deps = Vec::new();
        let mut num_missing_continuous = 0;
        let mut num_missing_decodable = 0;

        for &reference in &frame.references {
            let ref_key = FrameKey {
                picture_id: key.picture_id + reference.wrapping_diff(frame.picture_id),
                spatial_layer: key.spatial_layer,
            };
            if state.decoded.was_decoded(ref_key.picture_id) {
                continue;
            }
            if decode_deps.contains(&ref_key) {
                continue;
            }
            decode_deps.push(ref_key);
            continuity_deps.push(ref_key);
            num_missing_decodable += 1;
            match state.frames.get(&ref_key) {
                Some(entry) if entry.continuous => {}
                _ => num_missing_continuous += 1,
            }
        }

        if frame.inter_layer_predicted && frame.spatial_layer > 0 {
            let lower_key = FrameKey {
                picture_id: key.picture_id,
                spatial_layer: frame.spatial_layer - 1,
            };
            if !state.decoded.was_decoded(key.picture_id) {
                continuity_deps.push(lower_key);
                match state.frames.get(&lower_key) {
                    Some(entry) if entry.continuous => {}
                    _ => num_missing_continuous += 1,
                }
            }
        }

        FrameEntry {
            frame,
            extended_ts,
            continuity_deps,
            decode_deps,
            num_missing_continuous,
            num_missing_decodable,
            continuous: num_missing_continuous == 0,
        }
    }

    /// Cascades a continuity transition through forward dependents.
    ///
    /// Dependents are found by scanning the store rather than via back-edges;
    /// with at most 600 pictures the scan is trivially bounded.
    fn propagate_continuity(&self, state: &mut BufferState, start: FrameKey) {
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(key) = queue.pop_front() {
            if state.last_continuous.map_or(true, |last| key > last) {
                state.last_continuous = Some(key);
            }
            {
                let entry = &state.frames[&key];
                if entry.frame.is_last_spatial_layer {
                    self.stats_callback.on_complete_frame(
                        entry.frame.is_keyframe(),
                        entry.frame.size(),
                        entry.frame.content_type,
                    );
                }
            }
            for (dependent_key, dependent) in state.frames.iter_mut() {
                if dependent.continuous || !dependent.continuity_deps.contains(&key) {
                    continue;
                }
                dependent.num_missing_continuous -= 1;
                if dependent.num_missing_continuous == 0 {
                    dependent.continuous = true;
                    queue.push_back(*dependent_key);
                }
            }
        }
    }

    fn absorb_insert_error(&self, state: &mut BufferState, err: FrameError) {
        match err {
            FrameError::InvalidReference { picture_id } => {
                state.stats.invalid_reference_rejects += 1;
                debug!(picture_id, "rejecting frame with invalid references");
            }
            FrameError::StaleTimestamp { rtp_timestamp } => {
                state.stats.stale_timestamp_rejects += 1;
                debug!(rtp_timestamp, "rejecting frame older than decode point");
            }
            FrameError::CapacityExceeded { capacity } => {
                state.stats.capacity_rejects += 1;
                warn!(capacity, "buffer full, dropping non-keyframe");
                self.stats_callback
                    .on_discarded_packets_updated(state.stats.capacity_rejects);
            }
            FrameError::TooOldPictureId { picture_id } => {
                state.stats.stale_timestamp_rejects += 1;
                debug!(picture_id, "rejecting frame behind decode point");
            }
        }
    }

    /// Wait up to `max_wait` for the next decodable superframe.
    ///
    /// The wait budget is the smaller of `max_wait` and the render schedule's
    /// budget for the chosen frame. If a better frame arrives mid-wait the
    /// selection restarts; spurious wakeups only cost a re-check. A frame
    /// whose deadline has already passed is still delivered; deciding to
    /// skip rendering is the consumer's call.
    pub async fn next_frame(&self, max_wait: Duration, keyframe_required: bool) -> NextFrame {
        let latest_return_ms =
            self.clock.now_ms() + max_wait.as_millis().min(i64::MAX as u128) as i64;
        let mut wait_over = false;
        loop {
            let wait_ms;
            {
                let mut state = self.state.lock().await;
                let state = &mut *state;
                if state.stopped {
                    return NextFrame::Stopped;
                }
                let now_ms = self.clock.now_ms();
                let candidate = self.find_next_frame(state, now_ms, keyframe_required);
                let remaining_ms = match &candidate {
                    Some(candidate) => candidate.wait_ms.min(latest_return_ms - now_ms),
                    None => latest_return_ms - now_ms,
                };
                if wait_over || remaining_ms <= 0 {
                    return match candidate {
                        Some(candidate) => NextFrame::Frame(Box::new(
                            self.deliver_superframe(state, candidate, now_ms),
                        )),
                        None => NextFrame::TimedOut,
                    };
                }
                wait_ms = remaining_ms;
            }
            match tokio::time::timeout(
                Duration::from_millis(wait_ms as u64),
                self.frame_inserted.notified(),
            )
            .await
            {
                // New insert (or stop): re-run the selection.
                Ok(()) => {}
                // Budget spent: deliver whatever is selected now.
                Err(_) => wait_over = true,
            }
        }
    }

    /// Picks the next complete decodable superframe, in picture order.
    ///
    /// A frame already past its deadline by more than the configured slack is
    /// skipped when a newer decodable superframe exists, trading resolution
    /// for frame rate when the decoder falls behind.
    fn find_next_frame(
        &self,
        state: &mut BufferState,
        now_ms: i64,
        keyframe_required: bool,
    ) -> Option<Candidate> {
        let last_decoded_ts = state.decoded.last_decoded().map(|(_, ts)| ts);
        let keys: Vec<FrameKey> = state.frames.keys().copied().collect();
        let mut superframes: Vec<Vec<FrameKey>> = Vec::new();

        let mut index = 0;
        while index < keys.len() {
            let key = keys[index];
            index += 1;
            let entry = &state.frames[&key];
            if !entry.continuous || entry.num_missing_decodable > 0 {
                continue;
            }
            if keyframe_required && !entry.frame.is_keyframe() {
                continue;
            }
            if let Some(last_ts) = last_decoded_ts {
                if last_ts > entry.extended_ts {
                    continue;
                }
            }

            let mut group = vec![key];
            let mut complete = entry.frame.is_last_spatial_layer;
            while !complete && index < keys.len() && keys[index].picture_id == key.picture_id {
                let layer = &state.frames[&keys[index]];
                if !layer.continuous || layer.num_missing_decodable > 0 {
                    break;
                }
                group.push(keys[index]);
                complete = layer.frame.is_last_spatial_layer;
                index += 1;
            }
            if complete {
                superframes.push(group);
            }
        }

        let total = superframes.len();
        for (position, group) in superframes.into_iter().enumerate() {
            let entry = state.frames.get_mut(&group[0]).expect("candidate present");
            if entry.frame.render_time_ms == -1 {
                entry.frame.render_time_ms = self
                    .timing
                    .render_time_ms(entry.frame.rtp_timestamp, now_ms);
            }
            let render_time_ms = entry.frame.render_time_ms;
            let wait_ms = self.timing.max_waiting_time_ms(render_time_ms, now_ms);
            if wait_ms < -self.config.max_frame_delay_ms && position + 1 < total {
                trace!(
                    picture_id = entry.frame.picture_id,
                    wait_ms,
                    "skipping late frame in favor of a newer decodable superframe"
                );
                continue;
            }
            return Some(Candidate {
                keys: group,
                render_time_ms,
                wait_ms,
            });
        }
        None
    }

    /// Removes the chosen layers from the store, updates decode bookkeeping
    /// and the delay estimators, and assembles the combined superframe.
    fn deliver_superframe(
        &self,
        state: &mut BufferState,
        candidate: Candidate,
        now_ms: i64,
    ) -> EncodedFrame {
        let delivered_pid = candidate.keys.last().expect("non-empty superframe").picture_id;
        let mut extended_ts = 0;
        let mut layers: Vec<EncodedFrame> = Vec::with_capacity(candidate.keys.len());
        for key in &candidate.keys {
            let entry = state.frames.remove(key).expect("selected frame present");
            extended_ts = entry.extended_ts;
            layers.push(entry.frame);
        }

        // Render time 0 means "decode ASAP", never a timing anomaly.
        let mut render_time_ms = candidate.render_time_ms;
        if render_time_ms != 0
            && (render_time_ms < 0
                || (render_time_ms - now_ms).abs() > self.config.max_render_skew_ms)
        {
            warn!(
                render_time_ms,
                now_ms, "frame has bad render timing, resetting timing state"
            );
            state.jitter_estimator.reset();
            self.timing.reset();
            render_time_ms = self
                .timing
                .render_time_ms(layers[0].rtp_timestamp, now_ms);
        }

        let delayed_by_retransmission = layers.iter().any(|f| f.delayed_by_retransmission);
        let superframe_size: usize = layers.iter().map(|f| f.size()).sum();
        let receive_time_ms = layers
            .iter()
            .map(|f| f.received_time_ms)
            .max()
            .unwrap_or(now_ms);

        // References to these layers are now satisfied for decodability.
        for key in &candidate.keys {
            for entry in state.frames.values_mut() {
                if entry.num_missing_decodable > 0 && entry.decode_deps.contains(key) {
                    entry.num_missing_decodable -= 1;
                }
            }
        }
        state.decoded.insert_decoded(delivered_pid, extended_ts);

        // Everything at or before the delivered picture is unreachable now.
        let before = state.frames.len();
        state.frames.retain(|key, _| key.picture_id > delivered_pid);
        let dropped = before - state.frames.len();
        if dropped > 0 {
            trace!(dropped, "evicted frames at or before the decode point");
            state.stats.frames_dropped += dropped as u64;
        }

        if !delayed_by_retransmission {
            if let Some(delay_ms) = state
                .inter_frame_delay
                .calculate_delay(layers[0].rtp_timestamp, receive_time_ms)
            {
                state.jitter_estimator.update(delay_ms);
            }
        } else {
            state.jitter_estimator.frame_nacked();
        }
        let rtt_multiplier = match state.protection_mode {
            ProtectionMode::Nack => 1.0,
            ProtectionMode::NackFec => 0.0,
        };
        self.timing
            .set_jitter_delay_ms(state.jitter_estimator.estimate_ms(rtt_multiplier));
        self.stats_callback
            .on_frame_buffer_timings_updated(self.timing.timings());
        if let Some(info) = self.timing.timing_frame_info() {
            self.stats_callback.on_timing_frame_info_updated(info);
        }

        if layers[0].is_keyframe() {
            state.frame_counts.key_frames += 1;
        } else {
            state.frame_counts.delta_frames += 1;
        }
        self.stats_callback
            .on_frame_counts_updated(state.frame_counts);

        state.stats.superframes_delivered += 1;
        state.stats.buffered_pictures = picture_count(&state.frames);
        trace!(
            picture_id = layers[0].picture_id,
            layers = layers.len(),
            size = superframe_size,
            render_time_ms,
            "delivering superframe"
        );
        combine_superframe(layers, render_time_ms, receive_time_ms)
    }

    /// Record a round-trip time estimate from the transport.
    pub async fn update_rtt(&self, rtt_ms: i64) {
        let mut state = self.state.lock().await;
        state.jitter_estimator.update_rtt(rtt_ms);
    }

    pub async fn set_protection_mode(&self, mode: ProtectionMode) {
        let mut state = self.state.lock().await;
        debug!(?mode, "protection mode changed");
        state.protection_mode = mode;
    }

    /// Drop all buffered frames and decode history.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        self.clear_frames_and_history(&mut state);
    }

    /// Stop the buffer; a waiting [`FrameBuffer::next_frame`] returns
    /// [`NextFrame::Stopped`].
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.stopped {
            debug!("stopping frame buffer");
            state.stopped = true;
            self.frame_inserted.notify_one();
        }
    }

    pub async fn stats(&self) -> FrameBufferStats {
        let mut state = self.state.lock().await;
        state.stats.buffered_pictures = picture_count(&state.frames);
        state.stats
    }

    fn clear_frames_and_history(&self, state: &mut BufferState) {
        let dropped = state.frames.len();
        if dropped > 0 {
            state.stats.frames_dropped += dropped as u64;
        }
        state.frames.clear();
        state.last_continuous = None;
        state.decoded.clear();
        debug!(dropped, "cleared frame buffer");
    }
}

fn picture_count(frames: &BTreeMap<FrameKey, FrameEntry>) -> usize {
    let mut count = 0;
    let mut previous: Option<i64> = None;
    for key in frames.keys() {
        if previous != Some(key.picture_id) {
            count += 1;
            previous = Some(key.picture_id);
        }
    }
    count
}

fn contains_picture(frames: &BTreeMap<FrameKey, FrameEntry>, picture_id: i64) -> bool {
    frames
        .range(
            FrameKey {
                picture_id,
                spatial_layer: 0,
            }..=FrameKey {
                picture_id,
                spatial_layer: u8::MAX,
            },
        )
        .next()
        .is_some()
}

fn last_continuous_picture_id(state: &BufferState) -> Option<u16> {
    state
        .last_continuous
        .map(|key| key.picture_id.rem_euclid(1 << 16) as u16)
}

/// Concatenates the spatial layers of one picture into a single decode unit.
///
/// The combined frame carries the identity of the highest layer, the
/// ascending per-layer sizes, and the latest layer arrival time.
fn combine_superframe(
    mut layers: Vec<EncodedFrame>,
    render_time_ms: i64,
    receive_time_ms: i64,
) -> EncodedFrame {
    let sizes: Vec<usize> = layers.iter().map(|f| f.size()).collect();
    let mut combined = if layers.len() == 1 {
        layers.pop().expect("one layer")
    } else {
        let mut payload = BytesMut::with_capacity(sizes.iter().sum());
        for layer in &layers {
            payload.extend_from_slice(&layer.payload);
        }
        let mut top = layers.pop().expect("at least one layer");
        top.payload = payload.freeze();
        top
    };
    combined.spatial_index = combined.spatial_layer;
    combined.spatial_layer_sizes = sizes;
    combined.render_time_ms = render_time_ms;
    combined.received_time_ms = receive_time_ms;
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::timing::{ReceiveTiming, Timings};
    use crate::types::{
        ContentType, EncodedFrame, FrameType, PlayoutDelay, TimingFrameInfo,
    };
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;

    const FRAME_SIZE: usize = 10;
    const FPS10_MS: i64 = 100;
    const FPS20_MS: i64 = 50;

    /// Timing double with a fixed 50 ms playout delay and 25 ms decode time,
    /// delegating the estimator plumbing to a real `ReceiveTiming`.
    struct FixedDelayTiming {
        inner: ReceiveTiming,
        state: StdMutex<Option<(u32, i64)>>,
    }

    impl FixedDelayTiming {
        const DELAY_MS: i64 = 50;
        const DECODE_MS: i64 = 25;

        fn new() -> Self {
            Self {
                inner: ReceiveTiming::new(),
                state: StdMutex::new(None),
            }
        }
    }

    impl Timing for FixedDelayTiming {
        fn render_time_ms(&self, rtp_timestamp: u32, now_ms: i64) -> i64 {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                None => {
                    *state = Some((rtp_timestamp, now_ms + Self::DELAY_MS));
                    now_ms + Self::DELAY_MS
                }
                Some((last_ts, last_ms)) => {
                    *last_ms += rtp_timestamp.wrapping_diff(*last_ts) / 90;
                    *last_ts = rtp_timestamp;
                    *last_ms
                }
            }
        }

        fn max_waiting_time_ms(&self, render_time_ms: i64, now_ms: i64) -> i64 {
            render_time_ms - now_ms - Self::DECODE_MS
        }

        fn set_jitter_delay_ms(&self, delay_ms: i64) {
            self.inner.set_jitter_delay_ms(delay_ms);
        }

        fn set_playout_delay(&self, delay: PlayoutDelay) {
            self.inner.set_playout_delay(delay);
        }

        fn update_current_delay(&self, render_time_ms: i64, now_ms: i64) {
            self.inner.update_current_delay(render_time_ms, now_ms);
        }

        fn stop_decode_timer(&self, decode_time_ms: i64, now_ms: i64) {
            self.inner.stop_decode_timer(decode_time_ms, now_ms);
        }

        fn timings(&self) -> Timings {
            self.inner.timings()
        }

        fn set_timing_frame_info(&self, info: TimingFrameInfo) {
            self.inner.set_timing_frame_info(info);
        }

        fn timing_frame_info(&self) -> Option<TimingFrameInfo> {
            self.inner.timing_frame_info()
        }

        fn reset(&self) {
            self.inner.reset();
        }
    }

    #[derive(Default)]
    struct RecordingStats {
        complete_frames: StdMutex<Vec<(bool, usize, ContentType)>>,
        timings_updates: StdMutex<Vec<Timings>>,
        frame_counts: StdMutex<Vec<FrameCounts>>,
        discarded: StdMutex<Vec<u64>>,
    }

    impl ReceiveStatsCallback for RecordingStats {
        fn on_complete_frame(
            &self,
            is_keyframe: bool,
            size_bytes: usize,
            content_type: ContentType,
        ) {
            self.complete_frames
                .lock()
                .unwrap()
                .push((is_keyframe, size_bytes, content_type));
        }

        fn on_frame_buffer_timings_updated(&self, timings: Timings) {
            self.timings_updates.lock().unwrap().push(timings);
        }

        fn on_frame_counts_updated(&self, counts: FrameCounts) {
            self.frame_counts.lock().unwrap().push(counts);
        }

        fn on_discarded_packets_updated(&self, discarded: u64) {
            self.discarded.lock().unwrap().push(discarded);
        }
    }

    struct Fixture {
        clock: Arc<SimulatedClock>,
        timing: Arc<FixedDelayTiming>,
        stats: Arc<RecordingStats>,
        buffer: FrameBuffer,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(SimulatedClock::new(0));
            let timing = Arc::new(FixedDelayTiming::new());
            let stats = Arc::new(RecordingStats::default());
            let buffer = FrameBuffer::new(
                clock.clone(),
                timing.clone(),
                stats.clone(),
                FrameBufferConfig::default(),
            );
            Self {
                clock,
                timing,
                stats,
                buffer,
            }
        }

        async fn insert(
            &self,
            pid: u16,
            sl: u8,
            ts_ms: i64,
            ilp: bool,
            last: bool,
            size: usize,
            refs: &[u16],
        ) -> Option<u16> {
            self.buffer.insert(frame(pid, sl, ts_ms, ilp, last, size, refs)).await
        }

        async fn insert_nacked(&self, pid: u16, ts_ms: i64) -> Option<u16> {
            let mut f = frame(pid, 0, ts_ms, false, true, FRAME_SIZE, &[]);
            f.delayed_by_retransmission = true;
            self.buffer.insert(f).await
        }

        async fn extract(&self) -> Option<Box<EncodedFrame>> {
            self.buffer.next_frame(Duration::ZERO, false).await.frame()
        }

        async fn extract_keyframe(&self) -> Option<Box<EncodedFrame>> {
            self.buffer.next_frame(Duration::ZERO, true).await.frame()
        }
    }

    fn frame(
        pid: u16,
        sl: u8,
        ts_ms: i64,
        ilp: bool,
        last: bool,
        size: usize,
        refs: &[u16],
    ) -> EncodedFrame {
        EncodedFrame {
            picture_id: pid,
            spatial_layer: sl,
            rtp_timestamp: ts_ms.wrapping_mul(90) as u32,
            references: refs.to_vec(),
            inter_layer_predicted: ilp,
            is_last_spatial_layer: last,
            frame_type: if refs.is_empty() && !ilp {
                FrameType::Key
            } else {
                FrameType::Delta
            },
            payload: Bytes::from(vec![0u8; size]),
            ..Default::default()
        }
    }

    fn check_frame(frame: &EncodedFrame, pid: u16, sl: u8) {
        assert_eq!(frame.picture_id, pid);
        assert_eq!(frame.spatial_layer, sl);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_frame() {
        let f = Arc::new(Fixture::new());
        let waiter = {
            let f = f.clone();
            tokio::spawn(async move { f.buffer.next_frame(Duration::from_millis(50), false).await })
        };
        f.insert(7, 0, 10, false, true, FRAME_SIZE, &[]).await;
        let delivered = waiter.await.unwrap().frame().expect("frame delivered");
        check_frame(&delivered, 7, 0);
    }

    #[tokio::test]
    async fn test_one_superframe() {
        let f = Fixture::new();
        f.insert(11, 0, 10, false, false, FRAME_SIZE, &[]).await;
        f.insert(11, 1, 10, true, true, FRAME_SIZE, &[]).await;
        let delivered = f.extract().await.expect("superframe");
        check_frame(&delivered, 11, 1);
    }

    #[tokio::test]
    async fn test_zero_playout_delay_renders_asap() {
        let clock = Arc::new(SimulatedClock::new(0));
        let timing = Arc::new(ReceiveTiming::new());
        let buffer = FrameBuffer::new(
            clock,
            timing,
            Arc::new(crate::stats::NullReceiveStats),
            FrameBufferConfig::default(),
        );
        let mut first = frame(0, 0, 10, false, true, FRAME_SIZE, &[]);
        first.playout_delay = PlayoutDelay { min_ms: 0, max_ms: 0 };
        buffer.insert(first).await;
        let delivered = buffer
            .next_frame(Duration::ZERO, false)
            .await
            .frame()
            .expect("frame");
        check_frame(&delivered, 0, 0);
        assert_eq!(delivered.render_time_ms, 0);
    }

    #[tokio::test]
    async fn test_extract_from_empty_buffer() {
        let f = Fixture::new();
        assert!(f.extract().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_frame() {
        let f = Fixture::new();
        let pid = 1500u16;
        f.insert(pid, 0, 10, false, true, FRAME_SIZE, &[]).await;
        f.insert(pid + 2, 0, 10, false, true, FRAME_SIZE, &[pid]).await;
        f.insert(pid + 3, 0, 10, false, true, FRAME_SIZE, &[pid + 1, pid + 2])
            .await;
        check_frame(&f.extract().await.expect("first"), pid, 0);
        check_frame(&f.extract().await.expect("second"), pid + 2, 0);
        // pid+3 stays blocked behind the missing pid+1.
        assert!(f.extract().await.is_none());
    }

    #[tokio::test]
    async fn test_one_layer_stream() {
        let f = Fixture::new();
        let pid = 9000u16;
        f.insert(pid, 0, 0, false, true, FRAME_SIZE, &[]).await;
        check_frame(&f.extract().await.expect("keyframe"), pid, 0);
        for i in 1..10u16 {
            f.insert(pid + i, 0, i as i64 * FPS10_MS, false, true, FRAME_SIZE, &[pid + i - 1])
                .await;
            check_frame(&f.extract().await.expect("delta"), pid + i, 0);
            f.clock.advance_ms(FPS10_MS);
        }
    }

    #[tokio::test]
    async fn test_drop_temporal_layer_slow_decoder() {
        let f = Fixture::new();
        let pid = 300u16;
        f.insert(pid, 0, 0, false, true, FRAME_SIZE, &[]).await;
        f.insert(pid + 1, 0, FPS20_MS, false, true, FRAME_SIZE, &[pid]).await;
        for i in (2..10u16).step_by(2) {
            let ts_tl0 = i as i64 / 2 * FPS10_MS;
            f.insert(pid + i, 0, ts_tl0, false, true, FRAME_SIZE, &[pid + i - 2])
                .await;
            f.insert(
                pid + i + 1,
                0,
                ts_tl0 + FPS20_MS,
                false,
                true,
                FRAME_SIZE,
                &[pid + i, pid + i - 1],
            )
            .await;
        }

        let mut delivered = Vec::new();
        for _ in 0..10 {
            if let Some(frame) = f.extract().await {
                delivered.push(frame.picture_id);
            }
            f.clock.advance_ms(70);
        }
        // A 70 ms extraction cadence against 50/100 ms spacing drops the
        // higher temporal layer once the buffer falls behind.
        assert_eq!(
            delivered,
            vec![pid, pid + 1, pid + 2, pid + 4, pid + 6, pid + 8]
        );
    }

    #[tokio::test]
    async fn test_insert_late_frame() {
        let f = Fixture::new();
        let pid = 4000u16;
        f.insert(pid, 0, 10, false, true, FRAME_SIZE, &[]).await;
        check_frame(&f.extract().await.expect("first"), pid, 0);
        f.insert(pid + 2, 0, 10, false, true, FRAME_SIZE, &[]).await;
        check_frame(&f.extract().await.expect("second"), pid + 2, 0);
        f.insert(pid + 1, 0, 10, false, true, FRAME_SIZE, &[pid]).await;
        assert!(f.extract().await.is_none());
    }

    #[tokio::test]
    async fn test_protection_mode_nack_fec() {
        let f = Fixture::new();
        let pid = 600u16;
        f.buffer.update_rtt(200).await;
        f.buffer.set_protection_mode(ProtectionMode::NackFec).await;
        f.insert_nacked(pid, 0).await;
        f.insert_nacked(pid + 1, 100).await;
        f.insert_nacked(pid + 2, 200).await;
        f.insert(pid + 3, 0, 300, false, true, FRAME_SIZE, &[]).await;
        for _ in 0..4 {
            assert!(f.extract().await.is_some());
        }
        // Under NACK+FEC the RTT must not inflate the jitter estimate.
        assert!(f.timing.timings().jitter_buffer_ms < 200);
    }

    #[tokio::test]
    async fn test_protection_mode_nack() {
        let f = Fixture::new();
        let pid = 600u16;
        f.buffer.update_rtt(200).await;
        f.buffer.set_protection_mode(ProtectionMode::Nack).await;
        f.insert_nacked(pid, 0).await;
        f.insert_nacked(pid + 1, 100).await;
        f.insert_nacked(pid + 2, 200).await;
        f.insert(pid + 3, 0, 300, false, true, FRAME_SIZE, &[]).await;
        for _ in 0..4 {
            assert!(f.extract().await.is_some());
        }
        // Three retransmitted frames switch the estimator to RTT padding.
        assert!(f.timing.timings().jitter_buffer_ms > 200);
    }

    #[tokio::test]
    async fn test_no_continuous_frame() {
        let f = Fixture::new();
        assert_eq!(f.insert(100, 0, 10, false, true, FRAME_SIZE, &[99]).await, None);
    }

    #[tokio::test]
    async fn test_last_continuous_frame_single_layer() {
        let f = Fixture::new();
        let pid = 7200u16;
        assert_eq!(
            f.insert(pid, 0, 10, false, true, FRAME_SIZE, &[]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 2, 0, 10, false, true, FRAME_SIZE, &[pid + 1]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 1, 0, 10, false, true, FRAME_SIZE, &[pid]).await,
            Some(pid + 2)
        );
        assert_eq!(
            f.insert(pid + 4, 0, 10, false, true, FRAME_SIZE, &[pid + 3]).await,
            Some(pid + 2)
        );
        assert_eq!(
            f.insert(pid + 5, 0, 10, false, true, FRAME_SIZE, &[]).await,
            Some(pid + 5)
        );
    }

    #[tokio::test]
    async fn test_last_continuous_frame_two_layers() {
        let f = Fixture::new();
        let pid = 2500u16;
        assert_eq!(
            f.insert(pid, 0, 10, false, false, FRAME_SIZE, &[]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid, 1, 10, true, true, FRAME_SIZE, &[]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 1, 1, 10, true, true, FRAME_SIZE, &[pid]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 2, 0, 10, false, false, FRAME_SIZE, &[pid + 1]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 2, 1, 10, true, true, FRAME_SIZE, &[pid + 1]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 3, 0, 10, false, false, FRAME_SIZE, &[pid + 2]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 1, 0, 10, false, false, FRAME_SIZE, &[pid]).await,
            Some(pid + 3)
        );
        assert_eq!(
            f.insert(pid + 3, 1, 10, true, true, FRAME_SIZE, &[pid + 2]).await,
            Some(pid + 3)
        );
    }

    #[tokio::test]
    async fn test_picture_id_jump_back() {
        let f = Fixture::new();
        let pid = 8000u16;
        assert_eq!(
            f.insert(pid, 0, 10, false, true, FRAME_SIZE, &[]).await,
            Some(pid)
        );
        assert_eq!(
            f.insert(pid + 1, 0, 11, false, true, FRAME_SIZE, &[pid]).await,
            Some(pid + 1)
        );
        check_frame(&f.extract().await.expect("first"), pid, 0);

        // A keyframe that jumps back in picture id but forward in timestamp
        // re-seeds the buffer.
        assert_eq!(
            f.insert(pid - 1, 0, 12, false, true, FRAME_SIZE, &[]).await,
            Some(pid - 1)
        );
        check_frame(&f.extract().await.expect("re-seeded"), pid - 1, 0);
        assert!(f.extract().await.is_none());
    }

    #[tokio::test]
    async fn test_stats_callback() {
        let f = Fixture::new();
        let pid = 550u16;
        const LARGE_FRAME: usize = 5000;
        assert_eq!(
            f.insert(pid, 0, 10, false, true, LARGE_FRAME, &[]).await,
            Some(pid)
        );
        assert_eq!(
            f.stats.complete_frames.lock().unwrap().as_slice(),
            &[(true, LARGE_FRAME, ContentType::Unspecified)]
        );
        check_frame(&f.extract().await.expect("frame"), pid, 0);
        assert!(!f.stats.timings_updates.lock().unwrap().is_empty());
        assert_eq!(
            f.stats.frame_counts.lock().unwrap().last().unwrap().key_frames,
            1
        );
    }

    #[tokio::test]
    async fn test_forward_jumps() {
        let f = Fixture::new();
        for (pid, refs) in [
            (5453u16, vec![]),
            (5454, vec![5453]),
            (15670, vec![]),
            (29804, vec![]),
            (29805, vec![29804]),
            (29806, vec![29805]),
            (33819, vec![]),
            (41248, vec![]),
        ] {
            assert_eq!(
                f.insert(pid, 0, 1, false, true, FRAME_SIZE, &refs).await,
                Some(pid)
            );
            check_frame(&f.extract().await.expect("frame"), pid, 0);
        }
    }

    #[tokio::test]
    async fn test_duplicate_frames() {
        let f = Fixture::new();
        assert_eq!(
            f.insert(22256, 0, 1, false, true, FRAME_SIZE, &[]).await,
            Some(22256)
        );
        check_frame(&f.extract().await.expect("frame"), 22256, 0);
        assert_eq!(
            f.insert(22256, 0, 1, false, true, FRAME_SIZE, &[]).await,
            Some(22256)
        );
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_noop() {
        let f = Fixture::new();
        f.insert(5, 0, 10, false, true, FRAME_SIZE, &[]).await;
        assert_eq!(
            f.insert(5, 0, 10, false, true, 3 * FRAME_SIZE, &[]).await,
            Some(5)
        );
        let delivered = f.extract().await.expect("frame");
        // The first insert wins.
        assert_eq!(delivered.size(), FRAME_SIZE);
        assert_eq!(f.buffer.stats().await.duplicate_inserts, 1);
    }

    #[tokio::test]
    async fn test_invalid_references() {
        let f = Fixture::new();
        assert_eq!(f.insert(0, 0, 1000, false, true, FRAME_SIZE, &[2]).await, None);
        assert_eq!(
            f.insert(1, 0, 2000, false, true, FRAME_SIZE, &[]).await,
            Some(1)
        );
        check_frame(&f.extract().await.expect("frame"), 1, 0);
        assert_eq!(
            f.insert(2, 0, 3000, false, true, FRAME_SIZE, &[1]).await,
            Some(2)
        );
        assert_eq!(f.buffer.stats().await.invalid_reference_rejects, 1);
    }

    #[tokio::test]
    async fn test_self_reference_rejected() {
        let f = Fixture::new();
        assert_eq!(f.insert(9, 0, 1000, false, true, FRAME_SIZE, &[9]).await, None);
    }

    #[tokio::test]
    async fn test_keyframe_required() {
        let f = Fixture::new();
        assert_eq!(f.insert(1, 0, 1000, false, true, FRAME_SIZE, &[]).await, Some(1));
        assert_eq!(f.insert(2, 0, 2000, false, true, FRAME_SIZE, &[1]).await, Some(2));
        assert_eq!(f.insert(3, 0, 3000, false, true, FRAME_SIZE, &[]).await, Some(3));
        check_frame(&f.extract().await.expect("first"), 1, 0);
        // Requiring a keyframe drops the intervening delta frame.
        check_frame(&f.extract_keyframe().await.expect("keyframe"), 3, 0);
        assert!(f.extract().await.is_none());
    }

    #[tokio::test]
    async fn test_keyframe_clears_full_buffer() {
        let f = Fixture::new();
        const MAX_BUFFERED: u16 = 600;
        for i in 1..=MAX_BUFFERED {
            assert_eq!(
                f.insert(i, 0, i as i64 * 1000, false, true, FRAME_SIZE, &[i - 1]).await,
                None
            );
        }
        assert!(f.extract().await.is_none());

        assert_eq!(
            f.insert(
                MAX_BUFFERED + 1,
                0,
                (MAX_BUFFERED as i64 + 1) * 1000,
                false,
                true,
                FRAME_SIZE,
                &[],
            )
            .await,
            Some(MAX_BUFFERED + 1)
        );
        check_frame(&f.extract().await.expect("keyframe"), MAX_BUFFERED + 1, 0);
    }

    #[tokio::test]
    async fn test_store_never_exceeds_capacity() {
        let f = Fixture::new();
        for i in 0..700u16 {
            f.insert(i.wrapping_add(1), 0, i as i64 * 1000, false, true, FRAME_SIZE, &[i])
                .await;
            assert!(f.buffer.stats().await.buffered_pictures <= 600);
        }
        assert!(f.buffer.stats().await.capacity_rejects > 0);
        assert!(!f.stats.discarded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dont_update_on_undecodable_frame() {
        let f = Fixture::new();
        f.insert(1, 0, 0, false, true, FRAME_SIZE, &[]).await;
        assert!(f.extract_keyframe().await.is_some());
        f.insert(3, 0, 0, false, true, FRAME_SIZE, &[2, 0]).await;
        f.insert(3, 0, 0, false, true, FRAME_SIZE, &[0]).await;
        f.insert(2, 0, 0, false, true, FRAME_SIZE, &[]).await;
        // Frame 2 is a deliverable keyframe; frame 3 stays blocked on the
        // never-decoded frame 0.
        assert!(f.extract_keyframe().await.is_some());
        assert!(f.extract_keyframe().await.is_none());
    }

    #[tokio::test]
    async fn test_dont_decode_older_timestamp() {
        let f = Fixture::new();
        f.insert(2, 0, 1, false, true, FRAME_SIZE, &[]).await;
        // Older picture id but newer timestamp.
        f.insert(1, 0, 2, false, true, FRAME_SIZE, &[]).await;
        check_frame(&f.extract().await.expect("newest timestamp wins"), 1, 0);
        assert!(f.extract().await.is_none());

        f.insert(3, 0, 4, false, true, FRAME_SIZE, &[]).await;
        // Newer picture id but older timestamp.
        f.insert(4, 0, 3, false, true, FRAME_SIZE, &[]).await;
        check_frame(&f.extract().await.expect("frame"), 3, 0);
        assert!(f.extract().await.is_none());

        // Once the decode point has advanced, such a frame is rejected at
        // insert rather than parked in the store.
        f.insert(5, 0, 1, false, true, FRAME_SIZE, &[]).await;
        assert!(f.buffer.stats().await.stale_timestamp_rejects >= 1);
    }

    #[tokio::test]
    async fn test_combine_frames_to_superframe() {
        let f = Fixture::new();
        let pid = 1200u16;
        f.insert(pid, 0, 10, false, false, FRAME_SIZE, &[]).await;
        f.insert(pid, 1, 10, true, true, 2 * FRAME_SIZE, &[]).await;
        let delivered = f.extract().await.expect("superframe");
        assert!(f.extract().await.is_none());
        check_frame(&delivered, pid, 1);
        // Both layers combined into one contiguous payload.
        assert_eq!(delivered.size(), 3 * FRAME_SIZE);
        assert_eq!(delivered.spatial_index, 1);
        assert_eq!(delivered.spatial_layer_size(0), FRAME_SIZE);
        assert_eq!(delivered.spatial_layer_size(1), 2 * FRAME_SIZE);
    }

    #[tokio::test]
    async fn test_higher_spatial_layer_non_decodable() {
        let f = Fixture::new();
        let pid = 3300u16;
        f.insert(pid, 0, 10, false, false, FRAME_SIZE, &[]).await;
        f.insert(pid, 1, 10, true, true, FRAME_SIZE, &[]).await;
        check_frame(&f.extract().await.expect("first superframe"), pid, 1);

        f.insert(pid + 1, 1, 10 + FPS20_MS, false, true, FRAME_SIZE, &[pid]).await;
        f.insert(pid + 2, 0, 10 + FPS10_MS, false, false, FRAME_SIZE, &[pid]).await;
        f.insert(pid + 2, 1, 10 + FPS10_MS, true, true, FRAME_SIZE, &[pid + 1]).await;

        f.clock.advance_ms(1000);
        // pid+1 is decodable but late; superframe pid+2 is not yet decodable
        // at its top layer and must not be jumped to.
        check_frame(&f.extract().await.expect("late frame"), pid + 1, 1);
        check_frame(&f.extract().await.expect("now decodable"), pid + 2, 1);
    }

    #[tokio::test]
    async fn test_references_returned_before_dependents() {
        let f = Fixture::new();
        let pid = 100u16;
        f.insert(pid + 1, 0, 20, false, true, FRAME_SIZE, &[pid]).await;
        f.insert(pid + 2, 0, 30, false, true, FRAME_SIZE, &[pid + 1]).await;
        assert!(f.extract().await.is_none());
        f.insert(pid, 0, 10, false, true, FRAME_SIZE, &[]).await;
        let mut order = Vec::new();
        while let Some(frame) = f.extract().await {
            order.push(frame.picture_id);
        }
        assert_eq!(order, vec![pid, pid + 1, pid + 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_wakes_waiting_consumer() {
        let f = Arc::new(Fixture::new());
        let waiter = {
            let f = f.clone();
            tokio::spawn(async move { f.buffer.next_frame(Duration::from_secs(10), false).await })
        };
        tokio::task::yield_now().await;
        f.buffer.stop().await;
        assert!(matches!(waiter.await.unwrap(), NextFrame::Stopped));
        // Once stopped, further calls return immediately.
        assert!(matches!(
            f.buffer.next_frame(Duration::from_secs(10), false).await,
            NextFrame::Stopped
        ));
    }
}
