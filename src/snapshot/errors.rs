//! Snapshot read errors
//!
//! Every snapshot error is fatal: a run either starts from a complete,
//! consistent snapshot or does not start at all, and nothing is written.

use thiserror::Error;

use crate::ledger::PeriodError;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Hierarchy read failed: {0}")]
    HierarchyRead(String),

    #[error("Ledger read failed: {0}")]
    LedgerRead(String),

    #[error("Invalid periods: {0}")]
    Period(#[from] PeriodError),
}

impl SnapshotError {
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotError::HierarchyRead(_) => "ROLLUP_SNAPSHOT_HIERARCHY",
            SnapshotError::LedgerRead(_) => "ROLLUP_SNAPSHOT_LEDGER",
            SnapshotError::Period(_) => "ROLLUP_SNAPSHOT_PERIOD",
        }
    }
}
