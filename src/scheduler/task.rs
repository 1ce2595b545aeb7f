//! Finalization and persistence of one node
//!
//! Runs on the blocking pool. Everything it reads is shared read-only;
//! the only side effect is the store upsert for its own key.

use std::sync::Arc;

use serde::Serialize;

use crate::forest::Forest;
use crate::observability::RunMetrics;
use crate::rollup::{RollupKey, RollupTable};
use crate::store::{RollupStore, UpsertOutcome};

/// Read-only inputs of one period, shared by every task
#[derive(Clone)]
pub struct PeriodWork {
    pub forest: Arc<Forest>,
    pub table: Arc<RollupTable>,
    pub fingerprint: Arc<str>,
}

/// Why a node was not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node_id: String,
    pub code: &'static str,
    pub reason: String,
}

impl NodeFailure {
    pub fn new(node_id: impl Into<String>, code: &'static str, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            code,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Written(UpsertOutcome),
    /// Already persisted from the same snapshot (resume)
    Skipped,
    Failed(NodeFailure),
}

pub(crate) struct NodeTask {
    pub work: PeriodWork,
    pub store: Arc<dyn RollupStore>,
    pub metrics: Arc<RunMetrics>,
    pub resume: bool,
    pub node_id: String,
}

impl NodeTask {
    pub fn run(&self) -> NodeOutcome {
        let _in_flight = InFlight::enter(&self.metrics);

        let Some(idx) = self.work.forest.lookup(&self.node_id) else {
            return NodeOutcome::Failed(NodeFailure::new(
                &self.node_id,
                "ROLLUP_UNKNOWN_NODE",
                "unknown node",
            ));
        };

        if self.resume {
            let key = RollupKey::new(self.node_id.as_str(), self.work.table.period());
            match self.store.get(&key) {
                Ok(Some(stored)) if stored.snapshot_fingerprint == *self.work.fingerprint => {
                    return NodeOutcome::Skipped;
                }
                Ok(_) => {}
                Err(e) => {
                    return NodeOutcome::Failed(NodeFailure::new(
                        &self.node_id,
                        e.code(),
                        e.to_string(),
                    ))
                }
            }
        }

        let record = match self
            .work
            .table
            .record(&self.work.forest, idx, &self.work.fingerprint)
        {
            Ok(record) => record,
            Err(e) => {
                return NodeOutcome::Failed(NodeFailure::new(&self.node_id, e.code(), e.to_string()))
            }
        };
        self.metrics.increment_nodes_computed();

        match self.store.upsert(&record) {
            Ok(outcome) => NodeOutcome::Written(outcome),
            Err(e) => NodeOutcome::Failed(NodeFailure::new(&self.node_id, e.code(), e.to_string())),
        }
    }
}

/// Keeps the in-flight gauge balanced even if the task panics.
struct InFlight<'a>(&'a RunMetrics);

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a RunMetrics) -> Self {
        metrics.task_started();
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.task_finished();
    }
}
