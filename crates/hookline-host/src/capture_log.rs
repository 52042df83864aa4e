//! Capture log kept by a CAN bridge
//!
//! The log is the capture source clients mirror. It numbers every stored
//! frame with a strictly increasing `seq` starting at 1, so a reader can
//! ask for everything after the last seq it holds.

use std::collections::VecDeque;

use hookline_core::protocol::CanBridgeStatus;
use hookline_core::{CanFrame, Filter, MailboxItem};
use serde_json::Value;
use tracing::debug;

/// Default mailbox capacity
pub const DEFAULT_MAX_MAILBOX: usize = 4096;

/// Bounded mailbox of captured frames, oldest first
#[derive(Debug)]
pub struct CaptureLog {
    enabled: bool,
    filters: Vec<Filter>,
    mailbox: VecDeque<MailboxItem>,
    max_mailbox: usize,
    /// Seq the next stored frame receives
    next_seq: u64,
    frames_seen: u64,
}

impl CaptureLog {
    pub fn new(max_mailbox: usize) -> Self {
        Self {
            enabled: false,
            filters: Vec::new(),
            mailbox: VecDeque::new(),
            max_mailbox: max_mailbox.max(1),
            next_seq: 1,
            frames_seen: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        debug!(enabled, "Capture log toggled");
        self.enabled = enabled;
    }

    /// Replace the filter set; applies to frames recorded from now on
    pub fn set_filters(&mut self, filters: Vec<Filter>) {
        self.filters = filters;
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Offer a frame to the log
    ///
    /// Returns the assigned seq when the frame was stored. Nothing is stored
    /// while the log is disabled or when any filter rejects the frame.
    pub fn record(&mut self, frame: CanFrame, decoded: Option<Value>) -> Option<u64> {
        self.frames_seen += 1;
        if !self.enabled || !Filter::accepts_all(&self.filters, &frame, decoded.is_some()) {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.mailbox.push_back(MailboxItem {
            seq,
            raw: frame,
            decoded,
        });
        while self.mailbox.len() > self.max_mailbox {
            self.mailbox.pop_front();
        }
        Some(seq)
    }

    /// Stored items with a seq greater than `seq`, oldest first
    pub fn read_after(&self, seq: u64) -> Vec<MailboxItem> {
        // Seqs increase along the mailbox, so skip the prefix
        let start = self.mailbox.partition_point(|item| item.seq <= seq);
        self.mailbox.range(start..).cloned().collect()
    }

    /// Empty the mailbox. Seq numbering continues.
    pub fn clear(&mut self) {
        self.mailbox.clear();
    }

    pub fn len(&self) -> usize {
        self.mailbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailbox.is_empty()
    }

    pub fn status(&self) -> CanBridgeStatus {
        CanBridgeStatus {
            log_enabled: self.enabled,
            filters: self.filters.clone(),
            buffered: self.mailbox.len(),
            last_seq: self.next_seq - 1,
            frames_seen: self.frames_seen,
        }
    }
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MAILBOX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookline_core::FrameId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn frame(device_id: u8, len: usize) -> CanFrame {
        CanFrame::new(FrameId::new(6, 6, 1, 0, device_id), 0, vec![0xAA; len])
    }

    fn enabled(max: usize) -> CaptureLog {
        let mut log = CaptureLog::new(max);
        log.set_enabled(true);
        log
    }

    #[test]
    fn test_disabled_log_stores_nothing() {
        let mut log = CaptureLog::default();
        assert_eq!(log.record(frame(1, 2), None), None);
        assert!(log.is_empty());
        assert_eq!(log.status().frames_seen, 1);
    }

    #[test]
    fn test_seq_starts_at_one_and_increases() {
        let mut log = enabled(16);
        assert_eq!(log.record(frame(1, 2), None), Some(1));
        assert_eq!(log.record(frame(2, 2), None), Some(2));
        assert_eq!(log.status().last_seq, 2);
    }

    #[test]
    fn test_read_after_returns_only_greater_seqs() {
        let mut log = enabled(16);
        for id in 0..5 {
            log.record(frame(id, 1), None);
        }
        let seqs: Vec<u64> = log.read_after(2).iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
        assert!(log.read_after(5).is_empty());
        assert_eq!(log.read_after(0).len(), 5);
    }

    #[test]
    fn test_mailbox_bounded_oldest_evicted() {
        let mut log = enabled(3);
        for id in 0..5 {
            log.record(frame(id, 1), None);
        }
        let seqs: Vec<u64> = log.read_after(0).iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[test]
    fn test_filters_gate_storage_and_numbering() {
        let mut log = enabled(16);
        log.set_filters(vec![Filter::DecodedOnly, Filter::BodySize { min: 2, max: 8 }]);

        assert_eq!(log.record(frame(1, 4), None), None);
        assert_eq!(log.record(frame(1, 1), Some(json!({}))), None);
        assert_eq!(log.record(frame(1, 4), Some(json!({"ok": true}))), Some(1));
        assert_eq!(log.status().frames_seen, 3);
    }

    #[test]
    fn test_clear_keeps_numbering() {
        let mut log = enabled(16);
        log.record(frame(1, 1), None);
        log.record(frame(1, 1), None);
        log.clear();
        assert!(log.read_after(0).is_empty());
        assert_eq!(log.record(frame(1, 1), None), Some(3));
    }
}
