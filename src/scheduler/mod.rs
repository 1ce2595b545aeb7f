//! Batch Scheduler
//!
//! Drives finalization and persistence of candidate nodes through a bounded
//! worker pool.
//!
//! # Guarantees
//!
//! - At most `concurrency` node tasks run at once; a permit is acquired
//!   before each task is spawned and released when it ends
//! - Candidates are de-duplicated, so each key has one write in flight
//! - A failed node is recorded and never aborts the period
//! - Batches are progress units: the pool is fed continuously and a
//!   `BATCH_COMPLETE` line is logged once every node of a batch is done
//! - Cancellation stops dispatch; running tasks finish and undispatched
//!   candidates are reported as pending

mod cancel;
mod summary;
mod task;

pub use cancel::CancelFlag;
pub use summary::PeriodSummary;
pub use task::{NodeFailure, NodeOutcome, PeriodWork};

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::observability::{log_event_with_fields, Event, RunMetrics, Timer};
use crate::store::{RollupStore, UpsertOutcome};
use task::NodeTask;

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum node tasks in flight
    pub concurrency: usize,
    /// Candidates per progress batch
    pub batch_size: usize,
    /// Skip keys already persisted from the same snapshot
    pub resume: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            resume: false,
        }
    }
}

/// Progress of one batch
struct BatchProgress {
    dispatched: usize,
    done: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    sealed: bool,
    logged: bool,
    timer: Timer,
}

impl BatchProgress {
    fn new() -> Self {
        Self {
            dispatched: 0,
            done: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            sealed: false,
            logged: false,
            timer: Timer::new(),
        }
    }

    fn record(&mut self, outcome: &NodeOutcome) {
        self.done += 1;
        match outcome {
            NodeOutcome::Written(_) => self.succeeded += 1,
            NodeOutcome::Skipped => self.skipped += 1,
            NodeOutcome::Failed(_) => self.failed += 1,
        }
    }

    fn is_complete(&self) -> bool {
        self.sealed && !self.logged && self.done == self.dispatched && self.dispatched > 0
    }
}

/// Bounded worker pool shared by every period of a run.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn RollupStore>,
    metrics: Arc<RunMetrics>,
    cancel: CancelFlag,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn RollupStore>,
        metrics: Arc<RunMetrics>,
        cancel: CancelFlag,
    ) -> Self {
        let config = SchedulerConfig {
            concurrency: config.concurrency.max(1),
            batch_size: config.batch_size.max(1),
            resume: config.resume,
        };
        Self {
            permits: Arc::new(Semaphore::new(config.concurrency)),
            config,
            store,
            metrics,
            cancel,
        }
    }

    /// Finalize and persist `candidates` for one period.
    pub async fn run(&self, work: &PeriodWork, candidates: Vec<String>) -> PeriodSummary {
        let timer = Timer::new();
        let period = *work.table.period();
        let period_key = period.key();
        let candidates = dedup(candidates);

        let mut summary = PeriodSummary::new(&period, candidates.len());
        let mut batches: Vec<BatchProgress> = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0usize;

        'dispatch: for (batch_no, chunk) in candidates.chunks(self.config.batch_size).enumerate() {
            batches.push(BatchProgress::new());

            for node_id in chunk {
                if self.cancel.is_cancelled() {
                    break 'dispatch;
                }
                let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                    break 'dispatch;
                };
                if self.cancel.is_cancelled() {
                    break 'dispatch;
                }

                let task = NodeTask {
                    work: work.clone(),
                    store: Arc::clone(&self.store),
                    metrics: Arc::clone(&self.metrics),
                    resume: self.config.resume,
                    node_id: node_id.clone(),
                };
                let handle = tokio::task::spawn_blocking(move || {
                    let outcome = task.run();
                    drop(permit);
                    outcome
                });
                batches[batch_no].dispatched += 1;
                dispatched += 1;

                let node_id = node_id.clone();
                in_flight.push(async move { (batch_no, node_id, handle.await) });

                while let Some(Some((b, id, joined))) = in_flight.next().now_or_never() {
                    self.settle(&period_key, &mut summary, &mut batches[b], id, joined);
                    log_if_complete(&period_key, b, &mut batches[b]);
                }
            }

            batches[batch_no].sealed = true;
            log_if_complete(&period_key, batch_no, &mut batches[batch_no]);
        }

        let cancelled = self.cancel.is_cancelled() && dispatched < candidates.len();
        for batch in &mut batches {
            batch.sealed = true;
        }

        while let Some((b, id, joined)) = in_flight.next().await {
            self.settle(&period_key, &mut summary, &mut batches[b], id, joined);
            log_if_complete(&period_key, b, &mut batches[b]);
        }
        for (batch_no, batch) in batches.iter_mut().enumerate() {
            log_if_complete(&period_key, batch_no, batch);
        }

        summary.batches = batches.iter().filter(|b| b.dispatched > 0).count();
        summary.finish(dispatched, timer.elapsed_millis(), cancelled);

        if cancelled {
            log_event_with_fields(
                Event::RunCancelled,
                &[
                    ("period", &period_key),
                    ("pending", &summary.pending.to_string()),
                ],
            );
        }
        log_event_with_fields(
            Event::PeriodComplete,
            &[
                ("period", &period_key),
                ("candidates", &summary.candidates.to_string()),
                ("succeeded", &summary.succeeded.to_string()),
                ("failed", &summary.failed.to_string()),
                ("skipped", &summary.skipped.to_string()),
                ("pending", &summary.pending.to_string()),
                ("elapsed_ms", &summary.elapsed_ms.to_string()),
            ],
        );
        summary
    }

    fn settle(
        &self,
        period_key: &str,
        summary: &mut PeriodSummary,
        batch: &mut BatchProgress,
        node_id: String,
        joined: Result<NodeOutcome, JoinError>,
    ) {
        let outcome = joined.unwrap_or_else(|e| {
            NodeOutcome::Failed(NodeFailure::new(
                node_id.as_str(),
                "ROLLUP_TASK_PANICKED",
                e.to_string(),
            ))
        });

        match &outcome {
            NodeOutcome::Written(UpsertOutcome::Inserted) => {
                self.metrics.increment_records_inserted()
            }
            NodeOutcome::Written(UpsertOutcome::Updated) => self.metrics.increment_records_updated(),
            NodeOutcome::Written(UpsertOutcome::Unchanged) => {
                self.metrics.increment_records_unchanged()
            }
            NodeOutcome::Skipped => self.metrics.increment_nodes_resumed(),
            NodeOutcome::Failed(failure) => {
                self.metrics.increment_node_failures();
                log_event_with_fields(
                    Event::NodeFailed,
                    &[
                        ("node_id", &failure.node_id),
                        ("period", period_key),
                        ("code", failure.code),
                        ("reason", &failure.reason),
                    ],
                );
            }
        }

        summary.record(&outcome);
        batch.record(&outcome);
    }
}

fn log_if_complete(period_key: &str, batch_no: usize, batch: &mut BatchProgress) {
    if !batch.is_complete() {
        return;
    }
    batch.logged = true;
    log_event_with_fields(
        Event::BatchComplete,
        &[
            ("period", period_key),
            ("batch", &(batch_no + 1).to_string()),
            ("count", &batch.done.to_string()),
            ("succeeded", &batch.succeeded.to_string()),
            ("failed", &batch.failed.to_string()),
            ("skipped", &batch.skipped.to_string()),
            ("elapsed_ms", &batch.timer.elapsed_ms()),
        ],
    );
}

/// Drop repeated ids, keeping first occurrences in order
fn dedup(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
