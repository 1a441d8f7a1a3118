//! History of decoded pictures
//!
//! Frames may reference pictures that have already left the store, so the
//! buffer keeps a bounded record of which extended picture ids were handed to
//! the decoder, plus the most recent decode point used for ordering checks.

use std::collections::BTreeSet;

use tracing::trace;

/// How far behind the newest decoded picture the history is kept.
const HISTORY_WINDOW: i64 = 1 << 13;

#[derive(Debug, Default)]
pub(crate) struct DecodedFramesHistory {
    decoded: BTreeSet<i64>,
    /// Extended (picture id, rtp timestamp) of the newest decoded frame.
    last_decoded: Option<(i64, i64)>,
}

impl DecodedFramesHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_decoded(&mut self, picture_id: i64, rtp_timestamp: i64) {
        self.decoded.insert(picture_id);
        match self.last_decoded {
            Some((last_pid, _)) if last_pid > picture_id => {}
            _ => self.last_decoded = Some((picture_id, rtp_timestamp)),
        }
        if let Some((last_pid, _)) = self.last_decoded {
            let floor = last_pid - HISTORY_WINDOW;
            self.decoded = self.decoded.split_off(&floor);
        }
    }

    /// Whether `picture_id` was delivered to the decoder.
    ///
    /// Ids older than the retained window report false; a frame referencing
    /// that far back is undecodable anyway.
    pub fn was_decoded(&self, picture_id: i64) -> bool {
        if !self.decoded.contains(&picture_id) {
            if let Some((last_pid, _)) = self.last_decoded {
                if picture_id < last_pid - HISTORY_WINDOW {
                    trace!(picture_id, "reference beyond decoded history window");
                }
            }
            return false;
        }
        true
    }

    pub fn last_decoded(&self) -> Option<(i64, i64)> {
        self.last_decoded
    }

    pub fn clear(&mut self) {
        self.decoded.clear();
        self.last_decoded = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_decodes() {
        let mut history = DecodedFramesHistory::new();
        assert!(!history.was_decoded(1));
        history.insert_decoded(1, 9000);
        assert!(history.was_decoded(1));
        assert_eq!(history.last_decoded(), Some((1, 9000)));
    }

    #[test]
    fn test_last_decoded_keeps_newest() {
        let mut history = DecodedFramesHistory::new();
        history.insert_decoded(5, 500);
        // An older picture delivered late must not move the decode point back.
        history.insert_decoded(3, 300);
        assert_eq!(history.last_decoded(), Some((5, 500)));
        assert!(history.was_decoded(3));
    }

    #[test]
    fn test_prunes_old_entries() {
        let mut history = DecodedFramesHistory::new();
        history.insert_decoded(0, 0);
        history.insert_decoded(HISTORY_WINDOW + 10, 1);
        assert!(!history.was_decoded(0));
        assert!(history.was_decoded(HISTORY_WINDOW + 10));
    }

    #[test]
    fn test_clear() {
        let mut history = DecodedFramesHistory::new();
        history.insert_decoded(7, 70);
        history.clear();
        assert!(!history.was_decoded(7));
        assert_eq!(history.last_decoded(), None);
    }
}
