//! Run metrics
//!
//! Counters only, shared by every worker of a run. Relaxed atomics: the
//! values are read once the pool has drained.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one engine run (all periods).
#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Rollup records finalized by workers
    nodes_computed: AtomicU64,
    /// Upserts that created a new key
    records_inserted: AtomicU64,
    /// Upserts that replaced a different record
    records_updated: AtomicU64,
    /// Upserts that found a bit-identical record
    records_unchanged: AtomicU64,
    /// Failed finalizations or writes
    node_failures: AtomicU64,
    /// Keys skipped because a resumed run already persisted them
    nodes_resumed: AtomicU64,
    /// Ledger events counted into personal production
    events_accepted: AtomicU64,
    /// Ledger events excluded as malformed or unowned
    events_skipped: AtomicU64,
    /// Forest shape issues tolerated
    structural_issues: AtomicU64,
    /// Tasks currently holding a worker permit
    in_flight: AtomicU64,
    /// Highest observed `in_flight`
    max_in_flight: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_nodes_computed(&self) {
        self.nodes_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_inserted(&self) {
        self.records_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_updated(&self) {
        self.records_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_unchanged(&self) {
        self.records_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_node_failures(&self) {
        self.node_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_nodes_resumed(&self) {
        self.nodes_resumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_events_accepted(&self, count: u64) {
        self.events_accepted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_events_skipped(&self, count: u64) {
        self.events_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_structural_issues(&self, count: u64) {
        self.structural_issues.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a task taking a worker permit.
    pub fn task_started(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_in_flight.fetch_max(now, Ordering::Relaxed);
    }

    /// Record a task releasing its worker permit.
    pub fn task_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Highest number of simultaneously running tasks so far
    pub fn max_in_flight(&self) -> u64 {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            nodes_computed: self.nodes_computed.load(Ordering::Relaxed),
            records_inserted: self.records_inserted.load(Ordering::Relaxed),
            records_updated: self.records_updated.load(Ordering::Relaxed),
            records_unchanged: self.records_unchanged.load(Ordering::Relaxed),
            node_failures: self.node_failures.load(Ordering::Relaxed),
            nodes_resumed: self.nodes_resumed.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_skipped: self.events_skipped.load(Ordering::Relaxed),
            structural_issues: self.structural_issues.load(Ordering::Relaxed),
            max_in_flight: self.max_in_flight.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`RunMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub nodes_computed: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    pub records_unchanged: u64,
    pub node_failures: u64,
    pub nodes_resumed: u64,
    pub events_accepted: u64,
    pub events_skipped: u64,
    pub structural_issues: u64,
    pub max_in_flight: u64,
}

impl MetricsSnapshot {
    /// Serialize as a single-line JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
