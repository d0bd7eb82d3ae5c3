// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Message correlation and duplicate suppression.
//!
//! Multicast delivery duplicates and reorders datagrams, and devices
//! retransmit; every inbound message id passes through [`MessageCorrelator`]
//! before any other processing. The history is a bounded ring: when full,
//! the oldest id is evicted first, so long-lived listen sessions cannot grow
//! without bound.

use std::collections::{HashSet, VecDeque};

/// Default number of message ids remembered before eviction starts.
pub const DEFAULT_HISTORY: usize = 64;

#[derive(Debug)]
pub struct MessageCorrelator {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl MessageCorrelator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Commit a message id. Returns true exactly once per distinct id within
    /// the history window; malformed (missing or empty) ids are rejected
    /// without touching the history.
    pub fn record(&mut self, message_id: Option<&str>) -> bool {
        let id = match message_id {
            Some(id) if !id.trim().is_empty() => id.trim(),
            _ => return false,
        };
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for MessageCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_commits() {
        let mut c = MessageCorrelator::new();
        assert!(c.record(Some("urn:uuid:a")));
        assert!(!c.record(Some("urn:uuid:a")));
        assert!(c.record(Some("urn:uuid:b")));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_malformed_ids_rejected_statelessly() {
        let mut c = MessageCorrelator::new();
        assert!(!c.record(None));
        assert!(!c.record(Some("")));
        assert!(!c.record(Some("   ")));
        assert!(c.is_empty());
    }

    #[test]
    fn test_ring_evicts_oldest_first() {
        let mut c = MessageCorrelator::with_capacity(2);
        assert!(c.record(Some("m1")));
        assert!(c.record(Some("m2")));
        assert!(c.record(Some("m3"))); // evicts m1
        assert_eq!(c.len(), 2);
        assert!(!c.record(Some("m3")));
        // m1 fell out of the window, so it reads as fresh again
        assert!(c.record(Some("m1")));
    }
}
