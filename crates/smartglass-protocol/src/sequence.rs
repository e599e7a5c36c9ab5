//! Outbound sequence numbering and inbound ack bookkeeping.
//!
//! Every `Message` the session sends gets the next sequence number off a
//! monotonic counter starting at 1 (the first call to [`next_sequence`]
//! returns 1, not 0). On the receive side we track three independent sets —
//! `received`, `processed`, `rejected` — each an idempotent append: adding
//! a number already present is a no-op, and a number in one set is never
//! removed because it shows up in another. The low watermark is a fourth,
//! wholly separate piece of state: it only ever moves forward, and setting
//! it does not touch any of the three sets.
//!
//! [`next_sequence`]: SequenceTracker::next_sequence

use std::collections::BTreeSet;

/// Hands out outbound sequence numbers and tracks inbound sequence-number
/// bookkeeping for `Ack` messages.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    next_outbound: u32,
    received: BTreeSet<u32>,
    processed: BTreeSet<u32>,
    rejected: BTreeSet<u32>,
    low_watermark: u32,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next sequence number to stamp on an outbound message.
    pub fn next_sequence(&mut self) -> u32 {
        self.next_outbound = self.next_outbound.wrapping_add(1);
        self.next_outbound
    }

    /// Record that `seq` was received on an inbound `Message`.
    pub fn add_received(&mut self, seq: u32) {
        self.received.insert(seq);
    }

    /// Record that `seq` was successfully handled.
    pub fn add_processed(&mut self, seq: u32) {
        self.processed.insert(seq);
    }

    /// Record that `seq` arrived but could not be handled (duplicate,
    /// corrupt, or an incomplete fragment group).
    pub fn add_rejected(&mut self, seq: u32) {
        self.rejected.insert(seq);
    }

    /// Set the low watermark to `value` if it's higher than the current
    /// one. Lower or equal values are ignored.
    pub fn set_low_watermark(&mut self, value: u32) {
        if value > self.low_watermark {
            self.low_watermark = value;
        }
    }

    pub fn low_watermark(&self) -> u32 {
        self.low_watermark
    }

    pub fn received(&self) -> Vec<u32> {
        self.received.iter().copied().collect()
    }

    pub fn processed(&self) -> Vec<u32> {
        self.processed.iter().copied().collect()
    }

    pub fn rejected(&self) -> Vec<u32> {
        self.rejected.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_start_at_one_and_are_monotonic() {
        let mut t = SequenceTracker::new();
        assert_eq!(t.next_sequence(), 1);
        assert_eq!(t.next_sequence(), 2);
        assert_eq!(t.next_sequence(), 3);
    }

    #[test]
    fn sets_are_idempotent_and_independent() {
        let mut t = SequenceTracker::new();
        t.add_processed(5);
        t.add_processed(5);
        t.add_rejected(5);
        assert_eq!(t.processed(), vec![5]);
        assert_eq!(t.rejected(), vec![5]);
    }

    #[test]
    fn low_watermark_only_moves_forward() {
        let mut t = SequenceTracker::new();
        t.set_low_watermark(12);
        t.set_low_watermark(5);
        assert_eq!(t.low_watermark(), 12);
        t.set_low_watermark(89);
        assert_eq!(t.low_watermark(), 89);
    }

    #[test]
    fn final_state_matches_reference_scenario() {
        let mut t = SequenceTracker::new();
        for n in 1..=22 {
            t.add_received(n);
        }
        for n in 1..=11 {
            t.add_processed(n);
        }
        for n in 1..=6 {
            t.add_rejected(n);
        }
        t.set_low_watermark(89);
        t.set_low_watermark(12);

        assert_eq!(t.received(), (1..=22).collect::<Vec<_>>());
        assert_eq!(t.processed(), (1..=11).collect::<Vec<_>>());
        assert_eq!(t.rejected(), (1..=6).collect::<Vec<_>>());
        assert_eq!(t.low_watermark(), 89);
    }
}
