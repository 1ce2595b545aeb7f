//! Ledger snapshot types and the Period Metric Indexer
//!
//! The ledger collaborator owns events; this module only reads them.
//! Indexing is snapshot-based: an index never observes events added after
//! it was built.

mod amount;
mod event;
mod indexer;
mod period;

pub use amount::{Amount, MAX_SCALE};
pub use event::{DataIssue, LedgerEvent};
pub use indexer::{
    IndexOptions, IndexStats, IndexedPeriods, PeriodIndex, DEFAULT_SCALE, ISSUE_SAMPLE_LIMIT,
};
pub use period::{Period, PeriodError};
