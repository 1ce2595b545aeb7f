//! JSON-Lines Source Tests
//!
//! Runs fed from hierarchy and ledger exports on disk:
//! - Field aliases used by upstream feeds are accepted
//! - Malformed ledger lines are skipped and counted
//! - A malformed hierarchy line aborts the run

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use downline::engine::{Engine, RunRequest};
use downline::ledger::{Amount, Period};
use downline::rollup::RollupKey;
use downline::snapshot::{JsonLinesHierarchy, JsonLinesLedger};
use downline::store::{MemoryRollupStore, RollupStore};

// =============================================================================
// Helper Functions
// =============================================================================

fn write(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn engine(dir: &Path, store: Arc<MemoryRollupStore>) -> Engine {
    Engine::new(
        Arc::new(JsonLinesHierarchy::new(dir.join("nodes.jsonl"))),
        Arc::new(JsonLinesLedger::new(dir.join("ledger.jsonl"))),
        store,
    )
}

// =============================================================================
// Tests
// =============================================================================

/// Mixed field spellings roll up the same as canonical ones.
#[tokio::test]
async fn test_aliases_and_malformed_lines() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "nodes.jsonl",
        &[
            r#"{"id":"R"}"#,
            r#"{"id":"A","upline":"R"}"#,
            r#"{"id":"B","uplineId":"A","active":false}"#,
            r#"{"id":"C","parent_id":"R","member":true}"#,
        ],
    );
    write(
        dir.path(),
        "ledger.jsonl",
        &[
            r#"{"owner_id":"R","amount":"1.10","timestamp":"2026-09-01T00:00:00Z"}"#,
            r#"{"userId":"B","amount":"2.255","createdAt":"2026-09-15T10:00:00Z","kind":"reward"}"#,
            r#"{"ownerId":"C","amount":3,"timestamp":"2026-09-30T23:59:59Z"}"#,
            r#"{"ownerId":"C","amount":"9","timestamp":"2026-10-01T00:00:00Z"}"#,
            r#"{"ownerId":"A","amount":"4","timestamp":"2026-09-02T00:00:00Z","deleted":true}"#,
            r#"{"ownerId":"A","amount":"not a number","timestamp":"2026-09-02T00:00:00Z"}"#,
            "garbage",
        ],
    );

    let store = Arc::new(MemoryRollupStore::new());
    let period = Period::month(2026, 9, 0).unwrap();
    let report = engine(dir.path(), store.clone())
        .run(&RunRequest::single(period))
        .await
        .unwrap();

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.skipped_events, 2);
    assert_eq!(report.data_issue_sample.len(), 2);
    assert!(report
        .data_issue_sample
        .iter()
        .all(|i| i.kind() == "malformed"));

    let root = store.get(&RollupKey::new("R", &period)).unwrap().unwrap();
    // 1.10 + 2.255 + 3; the October event and the deleted one do not count
    assert_eq!(root.team, "6.355".parse::<Amount>().unwrap());
    assert_eq!(root.first_line, Amount::from(3i64));
    assert_eq!(root.direct_count, 2);

    let a = store.get(&RollupKey::new("A", &period)).unwrap().unwrap();
    assert_eq!(a.personal, Amount::ZERO);
    assert_eq!(a.active_direct_count, 0);
    assert_eq!(a.team_events, 1);
}

/// A broken hierarchy line aborts with the line number and no writes.
#[tokio::test]
async fn test_bad_hierarchy_line_aborts() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "nodes.jsonl", &[r#"{"id":"R"}"#, r#"{"upline":"R"}"#]);
    write(dir.path(), "ledger.jsonl", &[]);

    let store = Arc::new(MemoryRollupStore::new());
    let err = engine(dir.path(), store.clone())
        .run(&RunRequest::single(Period::month(2026, 9, 0).unwrap()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "ROLLUP_SNAPSHOT_HIERARCHY");
    assert!(err.to_string().contains("line 2"));
    assert!(store.is_empty());
}

/// A missing ledger export is fatal, not an empty period.
#[tokio::test]
async fn test_missing_ledger_aborts() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "nodes.jsonl", &[r#"{"id":"R"}"#]);

    let store = Arc::new(MemoryRollupStore::new());
    let err = engine(dir.path(), store.clone())
        .run(&RunRequest::single(Period::month(2026, 9, 0).unwrap()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "ROLLUP_SNAPSHOT_LEDGER");
    assert!(store.is_empty());
}
