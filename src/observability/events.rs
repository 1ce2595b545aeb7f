//! Observable run lifecycle events
//!
//! Events are explicit and typed; the string form is the `event` key of a
//! log line.

use std::fmt;

use super::logger::Severity;

/// Observable events of a rollup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Configuration loaded and validated
    ConfigLoaded,
    /// A run for one or more periods begins
    RunStart,
    /// A run finished (possibly with node failures)
    RunComplete,
    /// A run was aborted before any writes (FATAL)
    RunAborted,
    /// A run stopped dispatching because it was cancelled
    RunCancelled,

    // Snapshot
    /// Hierarchy and ledger bulk reads finished
    SnapshotRead,
    /// Forest adjacency built
    ForestBuilt,
    /// Ledger events indexed for a period
    PeriodIndexed,

    // Rollup
    /// Memoized rollup pass finished for a period
    RollupComputed,
    /// Forest shape problem tolerated by the run
    StructuralIssue,
    /// Ledger event excluded from personal production
    DataIssue,

    // Scheduling
    /// One batch of candidates fully processed
    BatchComplete,
    /// Finalization or persistence failed for one node
    NodeFailed,
    /// Period finished scheduling
    PeriodComplete,

    // Storage
    /// Torn final frame cut off when the store was opened
    StoreTailTruncated,
}

impl Event {
    /// Returns the string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::RunStart => "RUN_START",
            Event::RunComplete => "RUN_COMPLETE",
            Event::RunAborted => "RUN_ABORTED",
            Event::RunCancelled => "RUN_CANCELLED",
            Event::SnapshotRead => "SNAPSHOT_READ",
            Event::ForestBuilt => "FOREST_BUILT",
            Event::PeriodIndexed => "PERIOD_INDEXED",
            Event::RollupComputed => "ROLLUP_COMPUTED",
            Event::StructuralIssue => "STRUCTURAL_ISSUE",
            Event::DataIssue => "DATA_ISSUE",
            Event::BatchComplete => "BATCH_COMPLETE",
            Event::NodeFailed => "NODE_FAILED",
            Event::PeriodComplete => "PERIOD_COMPLETE",
            Event::StoreTailTruncated => "STORE_TAIL_TRUNCATED",
        }
    }

    /// Default severity for this event
    pub fn severity(&self) -> Severity {
        match self {
            Event::RunAborted => Severity::Fatal,
            Event::NodeFailed => Severity::Error,
            Event::StructuralIssue
            | Event::DataIssue
            | Event::RunCancelled
            | Event::StoreTailTruncated => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
