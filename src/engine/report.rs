//! Run report
//!
//! The JSON exit payload of a run. Totals are sums over the periods.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::forest::StructuralIssue;
use crate::ledger::DataIssue;
use crate::observability::MetricsSnapshot;
use crate::scheduler::PeriodSummary;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub periods: Vec<PeriodSummary>,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Distinct ids that failed in any period, sorted
    pub failed_node_ids: Vec<String>,
    /// Resumed keys (already persisted from the same snapshot)
    pub skipped: usize,
    pub pending: usize,
    /// Ledger events excluded as malformed, unowned or overflowing
    pub skipped_events: u64,
    pub structural_issues: u64,
    pub structural_issue_sample: Vec<StructuralIssue>,
    pub data_issue_sample: Vec<DataIssue>,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub(crate) fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            periods: Vec::new(),
            processed: 0,
            succeeded: 0,
            failed: 0,
            failed_node_ids: Vec::new(),
            skipped: 0,
            pending: 0,
            skipped_events: 0,
            structural_issues: 0,
            structural_issue_sample: Vec::new(),
            data_issue_sample: Vec::new(),
            elapsed_ms: 0,
            cancelled: false,
            metrics: MetricsSnapshot::default(),
        }
    }

    pub(crate) fn add_period(&mut self, summary: PeriodSummary) {
        self.processed += summary.processed();
        self.succeeded += summary.succeeded;
        self.failed += summary.failed;
        self.skipped += summary.skipped;
        self.pending += summary.pending;
        self.cancelled |= summary.cancelled;
        self.periods.push(summary);
    }

    pub(crate) fn finish(&mut self, elapsed_ms: u64, metrics: MetricsSnapshot) {
        let failed: BTreeSet<&str> = self
            .periods
            .iter()
            .flat_map(|p| p.failed_nodes.iter().map(|f| f.node_id.as_str()))
            .collect();
        self.failed_node_ids = failed.into_iter().map(str::to_string).collect();
        self.elapsed_ms = elapsed_ms;
        self.metrics = metrics;
    }

    /// Whether more nodes failed than the run tolerates
    pub fn exceeds_threshold(&self, failure_threshold: usize) -> bool {
        self.failed > failure_threshold
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
