//! Run-level errors
//!
//! Only failures that stop a run before (or instead of) scheduling end up
//! here. Per-node failures are values in the report.

use thiserror::Error;

use crate::snapshot::SnapshotError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Snapshot(e) => e.code(),
            EngineError::Task(_) => "ROLLUP_ENGINE_TASK",
        }
    }
}
