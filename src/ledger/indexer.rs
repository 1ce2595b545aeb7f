//! Period Metric Indexer
//!
//! Groups ledger events by owning node for one or more periods in a single
//! O(E) pass. Per-node lookups are O(1): personal totals and event counts
//! live in dense arrays addressed by [`NodeIdx`].

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::amount::Amount;
use super::event::{DataIssue, LedgerEvent};
use super::period::{Period, PeriodError};
use crate::forest::{Forest, NodeIdx};

/// Default number of fractional digits kept for amounts
pub const DEFAULT_SCALE: u32 = 8;

/// Data issues kept verbatim per index; the rest are only counted
pub const ISSUE_SAMPLE_LIMIT: usize = 100;

/// How events are admitted into an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Fractional digits amounts are rounded to before summing
    pub scale: u32,
    /// When set, only these event kinds count as production
    pub kinds: Option<BTreeSet<String>>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            kinds: None,
        }
    }
}

/// What happened to the events offered to an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Counted into some node's personal production
    pub accepted: u64,
    /// Soft-deleted, ignored
    pub deleted: u64,
    /// Timestamp outside the period
    pub out_of_period: u64,
    /// Kind not in the configured production kinds
    pub filtered_kind: u64,
    /// No owner
    pub missing_owner: u64,
    /// Owner not in the forest
    pub unknown_owner: u64,
    /// Would overflow the owner's total
    pub overflow: u64,
}

impl IndexStats {
    /// Events excluded because they were unusable (the skipped-events metric)
    pub fn skipped(&self) -> u64 {
        self.missing_owner + self.unknown_owner + self.overflow
    }
}

/// Ledger events of one period, keyed by owning node.
#[derive(Debug, Clone)]
pub struct PeriodIndex {
    period: Period,
    scale: u32,
    personal: Vec<Amount>,
    event_counts: Vec<u64>,
    accepted: Vec<LedgerEvent>,
    by_owner: HashMap<NodeIdx, Vec<usize>>,
    stats: IndexStats,
    issues: Vec<DataIssue>,
}

/// Result of indexing several periods at once
#[derive(Debug, Clone)]
pub struct IndexedPeriods {
    /// One index per period, sorted by period start
    pub indexes: Vec<PeriodIndex>,
    /// Events that fell in none of the periods
    pub out_of_range: u64,
}

impl PeriodIndex {
    fn empty(period: Period, node_count: usize, scale: u32) -> Self {
        Self {
            period,
            scale,
            personal: vec![Amount::zero(scale); node_count],
            event_counts: vec![0; node_count],
            accepted: Vec::new(),
            by_owner: HashMap::new(),
            stats: IndexStats::default(),
            issues: Vec::new(),
        }
    }

    /// Index `events` for a single period.
    pub fn build(
        forest: &Forest,
        events: &[LedgerEvent],
        period: Period,
        options: &IndexOptions,
    ) -> Self {
        let mut index = Self::empty(period, forest.len(), options.scale);
        for event in events {
            if period.contains(&event.timestamp) {
                index.ingest(forest, event, options);
            } else {
                index.stats.out_of_period += 1;
            }
        }
        index
    }

    /// Index `events` for several disjoint periods in one pass.
    ///
    /// Each event lands in at most one period, found by binary search over
    /// the sorted period starts.
    pub fn build_many(
        forest: &Forest,
        events: &[LedgerEvent],
        periods: &[Period],
        options: &IndexOptions,
    ) -> Result<IndexedPeriods, PeriodError> {
        let periods = Period::sorted_disjoint(periods.to_vec())?;
        let mut indexes: Vec<PeriodIndex> = periods
            .iter()
            .map(|p| Self::empty(*p, forest.len(), options.scale))
            .collect();
        let mut out_of_range = 0;

        for event in events {
            match locate(&periods, &event.timestamp) {
                Some(slot) => indexes[slot].ingest(forest, event, options),
                None => out_of_range += 1,
            }
        }

        Ok(IndexedPeriods {
            indexes,
            out_of_range,
        })
    }

    fn ingest(&mut self, forest: &Forest, event: &LedgerEvent, options: &IndexOptions) {
        if event.deleted {
            self.stats.deleted += 1;
            return;
        }
        if let Some(kinds) = &options.kinds {
            if !kinds.contains(&event.kind) {
                self.stats.filtered_kind += 1;
                return;
            }
        }

        let Some(owner) = event.owner() else {
            self.stats.missing_owner += 1;
            self.note(DataIssue::MissingOwner {
                event_id: event.id.clone(),
            });
            return;
        };
        let Some(idx) = forest.lookup(owner) else {
            self.stats.unknown_owner += 1;
            self.note(DataIssue::UnknownOwner {
                event_id: event.id.clone(),
                owner_id: owner.to_string(),
            });
            return;
        };

        let Some((amount, total)) = event
            .amount
            .normalize(self.scale)
            .and_then(|amount| Some((amount, self.personal[idx].checked_add(amount)?)))
        else {
            self.stats.overflow += 1;
            self.note(DataIssue::Overflow {
                owner_id: owner.to_string(),
            });
            return;
        };

        self.personal[idx] = total;
        self.event_counts[idx] += 1;
        self.by_owner
            .entry(idx)
            .or_default()
            .push(self.accepted.len());
        let mut accepted = event.clone();
        accepted.amount = amount;
        self.accepted.push(accepted);
        self.stats.accepted += 1;
    }

    fn note(&mut self, issue: DataIssue) {
        if self.issues.len() < ISSUE_SAMPLE_LIMIT {
            self.issues.push(issue);
        }
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Personal production of `idx`; zero when it has no events
    pub fn personal(&self, idx: NodeIdx) -> Amount {
        self.personal.get(idx).copied().unwrap_or(Amount::ZERO)
    }

    pub fn event_count(&self, idx: NodeIdx) -> u64 {
        self.event_counts.get(idx).copied().unwrap_or(0)
    }

    /// Accepted events of `idx` in ledger order
    pub fn events(&self, idx: NodeIdx) -> impl Iterator<Item = &LedgerEvent> + '_ {
        self.by_owner
            .get(&idx)
            .into_iter()
            .flatten()
            .map(move |&i| &self.accepted[i])
    }

    /// Every accepted event, amounts normalized
    pub fn accepted_events(&self) -> &[LedgerEvent] {
        &self.accepted
    }

    /// Nodes with at least one accepted event, ascending
    pub fn owners(&self) -> Vec<NodeIdx> {
        let mut owners: Vec<NodeIdx> = self.by_owner.keys().copied().collect();
        owners.sort_unstable();
        owners
    }

    /// Sum of all personal totals; `None` on overflow
    pub fn total(&self) -> Option<Amount> {
        self.personal
            .iter()
            .try_fold(Amount::zero(self.scale), |acc, v| {
                acc.checked_add(*v)
            })
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// First [`ISSUE_SAMPLE_LIMIT`] data issues
    pub fn issues(&self) -> &[DataIssue] {
        &self.issues
    }
}

fn locate(sorted: &[Period], ts: &DateTime<Utc>) -> Option<usize> {
    let after = sorted.partition_point(|p| p.start() <= *ts);
    let slot = after.checked_sub(1)?;
    sorted[slot].contains(ts).then_some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::Node;
    use chrono::NaiveDate;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn september() -> Period {
        Period::month(2026, 9, 0).unwrap()
    }

    fn forest() -> Forest {
        Forest::build(&[Node::root("a"), Node::child("b", "a")])
    }

    fn ev(owner: &str, amount: &str, at: &str) -> LedgerEvent {
        LedgerEvent::new(owner, amount.parse().unwrap(), ts(at))
    }

    #[test]
    fn test_groups_by_owner() {
        let forest = forest();
        let events = vec![
            ev("a", "10", "2026-09-01T00:00:00Z"),
            ev("b", "2.5", "2026-09-10T00:00:00Z"),
            ev("a", "1.25", "2026-09-30T23:59:59Z"),
        ];
        let index = PeriodIndex::build(&forest, &events, september(), &IndexOptions::default());
        let a = forest.lookup("a").unwrap();
        let b = forest.lookup("b").unwrap();

        assert_eq!(index.personal(a).to_string(), "11.25000000");
        assert_eq!(index.personal(b).to_string(), "2.50000000");
        assert_eq!(index.event_count(a), 2);
        assert_eq!(index.events(a).count(), 2);
        assert_eq!(index.owners(), vec![a, b]);
        assert_eq!(index.stats().accepted, 3);
    }

    #[test]
    fn test_excludes_out_of_period_and_deleted() {
        let forest = forest();
        let events = vec![
            ev("a", "10", "2026-08-31T23:59:59Z"),
            ev("a", "10", "2026-10-01T00:00:00Z"),
            ev("a", "10", "2026-09-05T00:00:00Z").mark_deleted(),
            ev("a", "7", "2026-09-05T00:00:00Z"),
        ];
        let index = PeriodIndex::build(&forest, &events, september(), &IndexOptions::default());
        let a = forest.lookup("a").unwrap();

        assert_eq!(index.personal(a), Amount::from(7));
        assert_eq!(index.stats().out_of_period, 2);
        assert_eq!(index.stats().deleted, 1);
        assert_eq!(index.stats().skipped(), 0);
    }

    #[test]
    fn test_missing_and_unknown_owner_skipped() {
        let forest = forest();
        let mut orphan = ev("a", "5", "2026-09-02T00:00:00Z");
        orphan.owner_id = None;
        let events = vec![orphan, ev("stranger", "5", "2026-09-02T00:00:00Z")];
        let index = PeriodIndex::build(&forest, &events, september(), &IndexOptions::default());

        assert_eq!(index.stats().missing_owner, 1);
        assert_eq!(index.stats().unknown_owner, 1);
        assert_eq!(index.stats().skipped(), 2);
        assert_eq!(index.issues().len(), 2);
        assert_eq!(index.total(), Some(Amount::ZERO));
    }

    #[test]
    fn test_kind_filter() {
        let forest = forest();
        let events = vec![
            ev("a", "5", "2026-09-02T00:00:00Z").with_kind("reward"),
            ev("a", "9", "2026-09-02T00:00:00Z").with_kind("stake"),
        ];
        let options = IndexOptions {
            kinds: Some(["reward".to_string()].into_iter().collect()),
            ..IndexOptions::default()
        };
        let index = PeriodIndex::build(&forest, &events, september(), &options);
        assert_eq!(index.personal(forest.lookup("a").unwrap()), Amount::from(5));
        assert_eq!(index.stats().filtered_kind, 1);
    }

    #[test]
    fn test_amounts_rounded_to_scale() {
        let forest = forest();
        let events = vec![ev("a", "0.125", "2026-09-02T00:00:00Z")];
        let options = IndexOptions {
            scale: 2,
            kinds: None,
        };
        let index = PeriodIndex::build(&forest, &events, september(), &options);
        assert_eq!(index.personal(forest.lookup("a").unwrap()).to_string(), "0.12");
    }

    #[test]
    fn test_overflow_is_skipped() {
        let forest = forest();
        let huge = Amount::new(rust_decimal::Decimal::MAX);
        let events = vec![
            LedgerEvent::new("a", huge, ts("2026-09-02T00:00:00Z")),
            LedgerEvent::new("a", huge, ts("2026-09-03T00:00:00Z")),
        ];
        let options = IndexOptions {
            scale: 0,
            kinds: None,
        };
        let index = PeriodIndex::build(&forest, &events, september(), &options);
        assert_eq!(index.stats().accepted, 1);
        assert_eq!(index.stats().overflow, 1);
    }

    #[test]
    fn test_sum_losing_scale_is_overflow() {
        let forest = forest();
        let events = vec![
            ev("a", "500000000000000000000.12345678", "2026-09-02T00:00:00Z"),
            ev("a", "500000000000000000000.12345678", "2026-09-03T00:00:00Z"),
            ev("b", "50000000000000000000000", "2026-09-03T00:00:00Z"),
        ];
        let index = PeriodIndex::build(&forest, &events, september(), &IndexOptions::default());
        assert_eq!(index.stats().accepted, 1);
        assert_eq!(index.stats().overflow, 2);
        let a = forest.lookup("a").unwrap();
        assert_eq!(index.personal(a).to_string(), "500000000000000000000.12345678");
        assert!(index.personal(forest.lookup("b").unwrap()).is_zero());
    }

    #[test]
    fn test_build_many_single_pass() {
        let forest = forest();
        let days = Period::daily_range(
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 3).unwrap(),
            0,
        )
        .unwrap();
        let events = vec![
            ev("a", "1", "2026-09-01T10:00:00Z"),
            ev("a", "2", "2026-09-02T10:00:00Z"),
            ev("b", "3", "2026-09-03T23:59:59Z"),
            ev("b", "4", "2026-09-04T00:00:00Z"),
        ];
        let built = PeriodIndex::build_many(&forest, &events, &days, &IndexOptions::default())
            .unwrap();
        let a = forest.lookup("a").unwrap();
        let b = forest.lookup("b").unwrap();

        assert_eq!(built.indexes.len(), 3);
        assert_eq!(built.out_of_range, 1);
        assert_eq!(built.indexes[0].personal(a), Amount::from(1));
        assert_eq!(built.indexes[1].personal(a), Amount::from(2));
        assert_eq!(built.indexes[2].personal(b), Amount::from(3));
    }
}
