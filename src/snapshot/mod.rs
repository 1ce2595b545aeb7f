//! Run snapshot
//!
//! The hierarchy and the ledger are read exactly once, at run start, and
//! frozen into a [`Snapshot`]: the forest, one index per period and each
//! period's fingerprint. Every later phase reads only the snapshot.
//!
//! # Guarantees
//!
//! - Any read failure aborts the capture; nothing downstream runs
//! - Periods are validated (non-empty, non-overlapping) before any read
//! - The ledger is queried once for the span of all periods

mod errors;
mod fingerprint;
mod source;

pub use errors::{SnapshotError, SnapshotResult};
pub use fingerprint::{forest_digest, format_fingerprint, period_fingerprint};
pub use source::{
    HierarchySource, JsonLinesHierarchy, JsonLinesLedger, LedgerBatch, LedgerSource,
    MemorySource,
};

use std::sync::Arc;

use crate::forest::Forest;
use crate::ledger::{DataIssue, IndexOptions, Period, PeriodError, PeriodIndex};

/// One period of a snapshot
#[derive(Debug, Clone)]
pub struct PeriodSnapshot {
    pub index: Arc<PeriodIndex>,
    pub fingerprint: String,
}

/// Immutable inputs of a run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    forest: Arc<Forest>,
    periods: Vec<PeriodSnapshot>,
    out_of_range: u64,
    malformed: u64,
    malformed_sample: Vec<DataIssue>,
}

impl Snapshot {
    /// Read both collaborators and index the ledger for `periods`.
    pub fn capture(
        hierarchy: &dyn HierarchySource,
        ledger: &dyn LedgerSource,
        periods: &[Period],
        options: &IndexOptions,
    ) -> SnapshotResult<Self> {
        let periods = Period::sorted_disjoint(periods.to_vec())?;
        let (Some(first), Some(last)) = (periods.first(), periods.last()) else {
            return Err(PeriodError::Invalid("no periods requested".to_string()).into());
        };
        let (span_start, span_end) = (first.start(), last.end());

        let nodes = hierarchy.load_nodes()?;
        let batch = ledger.load_events(span_start, span_end)?;

        let forest = Forest::from_nodes(nodes);
        let indexed = PeriodIndex::build_many(&forest, &batch.events, &periods, options)?;
        let digest = forest_digest(&forest);

        let periods = indexed
            .indexes
            .into_iter()
            .map(|index| PeriodSnapshot {
                fingerprint: period_fingerprint(digest, &index),
                index: Arc::new(index),
            })
            .collect();

        Ok(Self {
            forest: Arc::new(forest),
            periods,
            out_of_range: indexed.out_of_range,
            malformed: batch.malformed,
            malformed_sample: batch.malformed_sample,
        })
    }

    pub fn forest(&self) -> &Arc<Forest> {
        &self.forest
    }

    /// Periods sorted by start
    pub fn periods(&self) -> &[PeriodSnapshot] {
        &self.periods
    }

    /// Events the ledger returned that fell between requested periods
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Ledger records that could not be parsed
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn malformed_sample(&self) -> &[DataIssue] {
        &self.malformed_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::forest::Node;
    use crate::ledger::{Amount, LedgerEvent};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn source() -> MemorySource {
        MemorySource::new(
            vec![Node::root("R"), Node::child("C", "R")],
            vec![
                LedgerEvent::new("C", Amount::from(3i64), ts("2026-09-10T00:00:00Z")),
                LedgerEvent::new("C", Amount::from(4i64), ts("2026-10-10T00:00:00Z")),
                LedgerEvent::new("R", Amount::from(1i64), ts("2026-08-10T00:00:00Z")),
            ],
        )
    }

    struct BrokenHierarchy;

    impl HierarchySource for BrokenHierarchy {
        fn load_nodes(&self) -> SnapshotResult<Vec<Node>> {
            Err(SnapshotError::HierarchyRead("connection reset".into()))
        }
    }

    #[test]
    fn test_capture_multiple_periods() {
        let src = source();
        let periods = vec![
            Period::month(2026, 10, 0).unwrap(),
            Period::month(2026, 9, 0).unwrap(),
        ];
        let snap = Snapshot::capture(&src, &src, &periods, &IndexOptions::default()).unwrap();

        assert_eq!(snap.forest().len(), 2);
        assert_eq!(snap.periods().len(), 2);
        assert_eq!(snap.periods()[0].index.period(), &periods[1]);
        assert_eq!(snap.periods()[0].index.stats().accepted, 1);
        assert_eq!(snap.periods()[1].index.stats().accepted, 1);
        assert_ne!(snap.periods()[0].fingerprint, snap.periods()[1].fingerprint);
        assert_eq!(snap.out_of_range(), 0);
    }

    #[test]
    fn test_capture_is_repeatable() {
        let src = source();
        let periods = vec![Period::month(2026, 9, 0).unwrap()];
        let a = Snapshot::capture(&src, &src, &periods, &IndexOptions::default()).unwrap();
        let b = Snapshot::capture(&src, &src, &periods, &IndexOptions::default()).unwrap();
        assert_eq!(a.periods()[0].fingerprint, b.periods()[0].fingerprint);
    }

    #[test]
    fn test_hierarchy_failure_aborts() {
        let src = source();
        let periods = vec![Period::month(2026, 9, 0).unwrap()];
        let err = Snapshot::capture(&BrokenHierarchy, &src, &periods, &IndexOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "ROLLUP_SNAPSHOT_HIERARCHY");
    }

    #[test]
    fn test_rejects_bad_periods() {
        let src = source();
        let none = Snapshot::capture(&src, &src, &[], &IndexOptions::default()).unwrap_err();
        assert_eq!(none.code(), "ROLLUP_SNAPSHOT_PERIOD");

        let sept = Period::month(2026, 9, 0).unwrap();
        let mid_sept = Period::parse_calendar("2026-09-15", 0).unwrap();
        let overlapping =
            Snapshot::capture(&src, &src, &[sept, mid_sept], &IndexOptions::default())
                .unwrap_err();
        assert_eq!(overlapping.code(), "ROLLUP_SNAPSHOT_PERIOD");
    }
}
