// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Typed event queues.
//!
//! Every notification kind gets its own queue with an explicit policy:
//! snapshot events (description, configuration, default ticket, status
//! summary) only ever matter in their newest version, while delta events
//! (conditions, job transitions) must all be observed in arrival order.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::scan::{JobStatus, JobSummary, ScanTicket};
use crate::scan::{ScannerCondition, ScannerConfiguration, ScannerDescription, ScannerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Each push replaces anything still queued; only the newest value is
    /// ever drained.
    LastValueWins,
    /// Every push is retained and drained in arrival order.
    ApplyDelta,
}

#[derive(Debug)]
pub struct EventQueue<T> {
    policy: QueuePolicy,
    items: Mutex<VecDeque<T>>,
}

impl<T> EventQueue<T> {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        if self.policy == QueuePolicy::LastValueWins {
            items.clear();
        }
        items.push_back(item);
    }

    /// The newest queued value; anything older is discarded.
    pub fn drain_latest(&self) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        let newest = items.pop_back();
        items.clear();
        newest
    }

    /// Everything queued, in arrival order.
    pub fn drain_all(&self) -> Vec<T> {
        self.items.lock().unwrap().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

/// A condition-cleared notification: condition id plus clear time.
pub type ConditionCleared = (u32, String);

/// One queue per notification kind the scan service emits.
#[derive(Debug)]
pub struct EventQueues {
    pub description: EventQueue<ScannerDescription>,
    pub configuration: EventQueue<ScannerConfiguration>,
    pub default_ticket: EventQueue<ScanTicket>,
    pub status_summary: EventQueue<ScannerStatus>,
    pub conditions: EventQueue<ScannerCondition>,
    pub conditions_cleared: EventQueue<ConditionCleared>,
    pub job_status: EventQueue<JobStatus>,
    pub job_ended: EventQueue<JobSummary>,
}

impl EventQueues {
    pub fn new() -> Self {
        Self {
            description: EventQueue::new(QueuePolicy::LastValueWins),
            configuration: EventQueue::new(QueuePolicy::LastValueWins),
            default_ticket: EventQueue::new(QueuePolicy::LastValueWins),
            status_summary: EventQueue::new(QueuePolicy::LastValueWins),
            conditions: EventQueue::new(QueuePolicy::ApplyDelta),
            conditions_cleared: EventQueue::new(QueuePolicy::ApplyDelta),
            job_status: EventQueue::new(QueuePolicy::ApplyDelta),
            job_ended: EventQueue::new(QueuePolicy::ApplyDelta),
        }
    }
}

impl Default for EventQueues {
    fn default() -> Self {
        Self::new()
    }
}
