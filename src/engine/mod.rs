//! Run orchestration
//!
//! ```text
//! snapshot read ─► forest + period indexes ─► rollup pass ─► scheduler ─► report
//!   (fatal)           (immutable, Arc)          (pure)        (per-node)
//! ```
//!
//! A snapshot failure aborts the run before any write. After that point the
//! run always completes with a report; node failures are part of it.

mod errors;
mod report;
mod request;

pub use errors::{EngineError, EngineResult};
pub use report::RunReport;
pub use request::{CandidatePolicy, RunRequest};

use std::sync::Arc;

use uuid::Uuid;

use crate::forest::{Forest, NodeIdx, StructuralIssue};
use crate::ledger::PeriodIndex;
use crate::observability::{
    log_event_with_fields, Event, ObservationScope, RunMetrics, Timer,
};
use crate::rollup::RollupComputer;
use crate::scheduler::{CancelFlag, PeriodSummary, PeriodWork, Scheduler};
use crate::snapshot::{HierarchySource, LedgerSource, PeriodSnapshot, Snapshot};
use crate::store::RollupStore;

/// Issues logged one per line; the rest are only counted
pub const ISSUE_LOG_LIMIT: usize = 20;

/// Issues kept verbatim in the report
pub const ISSUE_REPORT_LIMIT: usize = 100;

/// Rollup engine bound to its collaborators.
pub struct Engine {
    hierarchy: Arc<dyn HierarchySource>,
    ledger: Arc<dyn LedgerSource>,
    store: Arc<dyn RollupStore>,
    cancel: CancelFlag,
}

impl Engine {
    pub fn new(
        hierarchy: Arc<dyn HierarchySource>,
        ledger: Arc<dyn LedgerSource>,
        store: Arc<dyn RollupStore>,
    ) -> Self {
        Self {
            hierarchy,
            ledger,
            store,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops dispatch of the current run
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<dyn RollupStore> {
        &self.store
    }

    /// Execute one run over every requested period.
    pub async fn run(&self, request: &RunRequest) -> EngineResult<RunReport> {
        let timer = Timer::new();
        let run_id = Uuid::new_v4();
        let run_id_str = run_id.to_string();
        let metrics = Arc::new(RunMetrics::new());

        log_event_with_fields(
            Event::RunStart,
            &[
                ("run_id", &run_id_str),
                ("periods", &request.periods.len().to_string()),
                ("concurrency", &request.scheduler.concurrency.to_string()),
                ("batch_size", &request.scheduler.batch_size.to_string()),
                ("resume", &request.scheduler.resume.to_string()),
            ],
        );

        let snapshot = match self.capture(&run_id_str, request).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log_event_with_fields(
                    Event::RunAborted,
                    &[
                        ("run_id", &run_id_str),
                        ("code", e.code()),
                        ("reason", &e.to_string()),
                    ],
                );
                return Err(e);
            }
        };

        let mut report = RunReport::new(run_id);
        let forest = Arc::clone(snapshot.forest());

        note_structural_issues(&mut report, &metrics, forest.issues());
        report.skipped_events += snapshot.malformed();
        metrics.add_events_skipped(snapshot.malformed());
        report
            .data_issue_sample
            .extend(snapshot.malformed_sample().iter().take(ISSUE_REPORT_LIMIT).cloned());

        let scheduler = Scheduler::new(
            request.scheduler,
            Arc::clone(&self.store),
            Arc::clone(&metrics),
            self.cancel.clone(),
        );

        let mut cycles_noted = false;
        for period in snapshot.periods() {
            let summary = self
                .run_period(
                    request,
                    &forest,
                    period,
                    &scheduler,
                    &metrics,
                    &mut report,
                    &mut cycles_noted,
                )
                .await?;
            report.add_period(summary);
        }

        report.finish(timer.elapsed_millis(), metrics.snapshot());

        log_event_with_fields(
            Event::RunComplete,
            &[
                ("run_id", &run_id_str),
                ("processed", &report.processed.to_string()),
                ("succeeded", &report.succeeded.to_string()),
                ("failed", &report.failed.to_string()),
                ("skipped", &report.skipped.to_string()),
                ("pending", &report.pending.to_string()),
                ("skipped_events", &report.skipped_events.to_string()),
                ("cancelled", &report.cancelled.to_string()),
                ("elapsed_ms", &report.elapsed_ms.to_string()),
            ],
        );

        Ok(report)
    }

    async fn capture(&self, run_id: &str, request: &RunRequest) -> EngineResult<Snapshot> {
        let scope = ObservationScope::with_fields("SNAPSHOT_CAPTURE", &[("run_id", run_id)]);

        let hierarchy = Arc::clone(&self.hierarchy);
        let ledger = Arc::clone(&self.ledger);
        let periods = request.periods.clone();
        let options = request.index.clone();
        let captured = tokio::task::spawn_blocking(move || {
            Snapshot::capture(&*hierarchy, &*ledger, &periods, &options)
        })
        .await;

        let snapshot = match captured {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                scope.fail(&e.to_string());
                return Err(e.into());
            }
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(EngineError::Task(e.to_string()));
            }
        };

        let forest = snapshot.forest();
        log_event_with_fields(
            Event::SnapshotRead,
            &[
                ("run_id", run_id),
                ("nodes", &forest.len().to_string()),
                ("periods", &snapshot.periods().len().to_string()),
                ("malformed_events", &snapshot.malformed().to_string()),
                ("out_of_range_events", &snapshot.out_of_range().to_string()),
            ],
        );
        log_event_with_fields(
            Event::ForestBuilt,
            &[
                ("run_id", run_id),
                ("nodes", &forest.len().to_string()),
                ("roots", &forest.roots().len().to_string()),
                ("structural_issues", &forest.issues().len().to_string()),
            ],
        );
        scope.complete();

        Ok(snapshot)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_period(
        &self,
        request: &RunRequest,
        forest: &Arc<Forest>,
        period: &PeriodSnapshot,
        scheduler: &Scheduler,
        metrics: &RunMetrics,
        report: &mut RunReport,
        cycles_noted: &mut bool,
    ) -> EngineResult<PeriodSummary> {
        let index = &period.index;
        let period_key = index.period().key();
        let stats = index.stats();

        log_event_with_fields(
            Event::PeriodIndexed,
            &[
                ("period", &period_key),
                ("accepted", &stats.accepted.to_string()),
                ("skipped", &stats.skipped().to_string()),
                ("deleted", &stats.deleted.to_string()),
                ("out_of_period", &stats.out_of_period.to_string()),
                ("filtered_kind", &stats.filtered_kind.to_string()),
                ("fingerprint", &period.fingerprint),
            ],
        );
        for issue in index.issues().iter().take(ISSUE_LOG_LIMIT) {
            log_event_with_fields(
                Event::DataIssue,
                &[
                    ("period", &period_key),
                    ("kind", issue.kind()),
                    ("detail", &issue.to_string()),
                ],
            );
        }
        metrics.add_events_accepted(stats.accepted);
        metrics.add_events_skipped(stats.skipped());
        report.skipped_events += stats.skipped();
        let room = ISSUE_REPORT_LIMIT.saturating_sub(report.data_issue_sample.len());
        report
            .data_issue_sample
            .extend(index.issues().iter().take(room).cloned());

        let (candidates, targets) = resolve_candidates(request, forest, index);

        if self.cancel.is_cancelled() {
            let mut summary = PeriodSummary::new(index.period(), dedup_len(&candidates));
            summary.finish(0, 0, true);
            return Ok(summary);
        }

        let scope = ObservationScope::with_fields("ROLLUP_PASS", &[("period", &period_key)]);
        let table = {
            let forest = Arc::clone(forest);
            let index = Arc::clone(index);
            tokio::task::spawn_blocking(move || {
                let computer = RollupComputer::new(&forest, &index);
                match targets {
                    Some(roots) => computer.compute(&roots),
                    None => computer.compute_all(),
                }
            })
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?
        };
        scope.complete();

        log_event_with_fields(
            Event::RollupComputed,
            &[
                ("period", &period_key),
                ("visited", &table.visited().to_string()),
                ("cycle_edges", &table.issues().len().to_string()),
            ],
        );
        if !*cycles_noted {
            note_structural_issues(report, metrics, table.issues());
            *cycles_noted = true;
        }

        let work = PeriodWork {
            forest: Arc::clone(forest),
            table: Arc::new(table),
            fingerprint: Arc::from(period.fingerprint.as_str()),
        };
        Ok(scheduler.run(&work, candidates).await)
    }
}

/// Candidate ids for a period, plus the subtree roots to compute when the
/// run is targeted.
fn resolve_candidates(
    request: &RunRequest,
    forest: &Forest,
    index: &PeriodIndex,
) -> (Vec<String>, Option<Vec<NodeIdx>>) {
    if let Some(nodes) = &request.nodes {
        let roots = nodes.iter().filter_map(|id| forest.lookup(id)).collect();
        return (nodes.clone(), Some(roots));
    }
    let ids = match request.candidates {
        CandidatePolicy::All => forest.nodes().iter().map(|n| n.id.clone()).collect(),
        CandidatePolicy::WithEvents => index
            .owners()
            .into_iter()
            .map(|idx| forest.id(idx).to_string())
            .collect(),
    };
    (ids, None)
}

fn dedup_len(ids: &[String]) -> usize {
    ids.iter().collect::<std::collections::HashSet<_>>().len()
}

fn note_structural_issues(report: &mut RunReport, metrics: &RunMetrics, issues: &[StructuralIssue]) {
    for issue in issues.iter().take(ISSUE_LOG_LIMIT) {
        let fields = issue.log_fields();
        let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        log_event_with_fields(Event::StructuralIssue, &borrowed);
    }
    if issues.len() > ISSUE_LOG_LIMIT {
        log_event_with_fields(
            Event::StructuralIssue,
            &[
                ("kind", "summary"),
                ("total", &issues.len().to_string()),
                ("logged", &ISSUE_LOG_LIMIT.to_string()),
            ],
        );
    }

    let count = issues.len() as u64;
    report.structural_issues += count;
    metrics.add_structural_issues(count);
    let room = ISSUE_REPORT_LIMIT.saturating_sub(report.structural_issue_sample.len());
    report
        .structural_issue_sample
        .extend(issues.iter().take(room).cloned());
}
