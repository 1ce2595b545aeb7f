//! Hierarchy and ledger collaborators
//!
//! Both are bulk, read-only and called once per run before any write.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::errors::{SnapshotError, SnapshotResult};
use crate::forest::Node;
use crate::ledger::{DataIssue, LedgerEvent, ISSUE_SAMPLE_LIMIT};

/// Supplies the node set.
pub trait HierarchySource: Send + Sync {
    fn load_nodes(&self) -> SnapshotResult<Vec<Node>>;
}

/// Supplies ledger events booked in `[start, end)`.
pub trait LedgerSource: Send + Sync {
    fn load_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SnapshotResult<LedgerBatch>;
}

/// Events returned by a ledger read plus the records that could not be
/// parsed as events.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    pub events: Vec<LedgerEvent>,
    pub malformed: u64,
    /// First [`ISSUE_SAMPLE_LIMIT`] malformed records
    pub malformed_sample: Vec<DataIssue>,
}

impl LedgerBatch {
    fn note_malformed(&mut self, issue: DataIssue) {
        self.malformed += 1;
        if self.malformed_sample.len() < ISSUE_SAMPLE_LIMIT {
            self.malformed_sample.push(issue);
        }
    }
}

/// Fixed in-memory hierarchy and ledger.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    nodes: Vec<Node>,
    events: Vec<LedgerEvent>,
}

impl MemorySource {
    pub fn new(nodes: Vec<Node>, events: Vec<LedgerEvent>) -> Self {
        Self { nodes, events }
    }
}

impl HierarchySource for MemorySource {
    fn load_nodes(&self) -> SnapshotResult<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

impl LedgerSource for MemorySource {
    fn load_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SnapshotResult<LedgerBatch> {
        Ok(LedgerBatch {
            events: self
                .events
                .iter()
                .filter(|e| start <= e.timestamp && e.timestamp < end)
                .cloned()
                .collect(),
            ..LedgerBatch::default()
        })
    }
}

/// Hierarchy export with one JSON node object per line.
///
/// A line that does not parse aborts the read: a partial forest would
/// silently re-root whole subtrees.
#[derive(Debug, Clone)]
pub struct JsonLinesHierarchy {
    path: PathBuf,
}

impl JsonLinesHierarchy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HierarchySource for JsonLinesHierarchy {
    fn load_nodes(&self) -> SnapshotResult<Vec<Node>> {
        let content = read_file(&self.path).map_err(SnapshotError::HierarchyRead)?;
        let mut nodes = Vec::new();
        for (line_no, line) in numbered_lines(&content) {
            let node: Node = serde_json::from_str(line).map_err(|e| {
                SnapshotError::HierarchyRead(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    line_no,
                    e
                ))
            })?;
            nodes.push(node);
        }
        Ok(nodes)
    }
}

/// Ledger export with one JSON event object per line.
///
/// Unparseable lines are counted as malformed events and skipped.
#[derive(Debug, Clone)]
pub struct JsonLinesLedger {
    path: PathBuf,
}

impl JsonLinesLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LedgerSource for JsonLinesLedger {
    fn load_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SnapshotResult<LedgerBatch> {
        let content = read_file(&self.path).map_err(SnapshotError::LedgerRead)?;
        let mut batch = LedgerBatch::default();
        for (line_no, line) in numbered_lines(&content) {
            match serde_json::from_str::<LedgerEvent>(line) {
                Ok(event) if start <= event.timestamp && event.timestamp < end => {
                    batch.events.push(event)
                }
                Ok(_) => {}
                Err(e) => batch.note_malformed(DataIssue::Malformed {
                    line: line_no,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(batch)
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Non-blank lines with 1-based line numbers
fn numbered_lines(content: &str) -> impl Iterator<Item = (u64, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i as u64 + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}
