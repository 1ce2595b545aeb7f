//! Per-period scheduling summary

use serde::Serialize;

use super::task::{NodeFailure, NodeOutcome};
use crate::ledger::Period;
use crate::store::UpsertOutcome;

/// Outcome counts of one period.
///
/// `succeeded + failed + skipped + pending == candidates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    pub period: String,
    pub candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Never dispatched because the run was cancelled
    pub pending: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub batches: usize,
    /// Sorted by node id
    pub failed_nodes: Vec<NodeFailure>,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

impl PeriodSummary {
    pub(crate) fn new(period: &Period, candidates: usize) -> Self {
        Self {
            period: period.key(),
            candidates,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            pending: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            batches: 0,
            failed_nodes: Vec::new(),
            elapsed_ms: 0,
            cancelled: false,
        }
    }

    pub(crate) fn record(&mut self, outcome: &NodeOutcome) {
        match outcome {
            NodeOutcome::Written(written) => {
                self.succeeded += 1;
                match written {
                    UpsertOutcome::Inserted => self.inserted += 1,
                    UpsertOutcome::Updated => self.updated += 1,
                    UpsertOutcome::Unchanged => self.unchanged += 1,
                }
            }
            NodeOutcome::Skipped => self.skipped += 1,
            NodeOutcome::Failed(failure) => {
                self.failed += 1;
                self.failed_nodes.push(failure.clone());
            }
        }
    }

    pub(crate) fn finish(&mut self, dispatched: usize, elapsed_ms: u64, cancelled: bool) {
        self.pending = self.candidates.saturating_sub(dispatched);
        self.elapsed_ms = elapsed_ms;
        self.cancelled = cancelled;
        self.failed_nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    }

    /// Number of candidates that reached a final state
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_finish() {
        let period = Period::month(2026, 9, 0).unwrap();
        let mut summary = PeriodSummary::new(&period, 5);
        summary.record(&NodeOutcome::Written(UpsertOutcome::Inserted));
        summary.record(&NodeOutcome::Written(UpsertOutcome::Unchanged));
        summary.record(&NodeOutcome::Skipped);
        summary.record(&NodeOutcome::Failed(NodeFailure::new("z", "X", "boom")));
        summary.record(&NodeOutcome::Failed(NodeFailure::new("a", "X", "boom")));
        summary.finish(5, 12, false);

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.processed(), 5);
        assert_eq!(summary.failed_nodes[0].node_id, "a");
    }

    #[test]
    fn test_pending_after_cancel() {
        let period = Period::month(2026, 9, 0).unwrap();
        let mut summary = PeriodSummary::new(&period, 10);
        summary.record(&NodeOutcome::Written(UpsertOutcome::Inserted));
        summary.finish(1, 3, true);
        assert_eq!(summary.pending, 9);
        assert!(summary.cancelled);
    }
}
