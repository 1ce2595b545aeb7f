//! Snapshot fingerprints
//!
//! A fingerprint identifies the exact inputs a rollup record was derived
//! from: the canonical node set plus one period's accepted events. Both are
//! sorted before hashing, so feed order never changes the value, and no
//! wall-clock time goes in.
//!
//! Format: `crc32:XXXXXXXX` (lowercase hex, zero-padded).

use chrono::SecondsFormat;
use crc32fast::Hasher;

use crate::forest::Forest;
use crate::ledger::PeriodIndex;

const FIELD: u8 = 0x1f;
const RECORD: u8 = 0x1e;

/// CRC32 of the forest as built: node ids, resolved parents and flags.
///
/// Computed once per run and folded into every period fingerprint.
pub fn forest_digest(forest: &Forest) -> u32 {
    let mut order: Vec<usize> = (0..forest.len()).collect();
    order.sort_unstable_by(|&a, &b| forest.id(a).cmp(forest.id(b)));

    let mut hasher = Hasher::new();
    for idx in order {
        let node = forest.node(idx);
        let parent = forest.parent(idx).map(|p| forest.id(p)).unwrap_or("");
        hasher.update(node.id.as_bytes());
        hasher.update(&[FIELD]);
        hasher.update(parent.as_bytes());
        hasher.update(&[FIELD, node.active as u8, node.member as u8, RECORD]);
    }
    hasher.finalize()
}

/// Fingerprint of one period: forest digest, period key and accepted events.
pub fn period_fingerprint(forest_digest: u32, index: &PeriodIndex) -> String {
    let mut events: Vec<(&str, String, String, &str, &str)> = index
        .accepted_events()
        .iter()
        .map(|e| {
            (
                e.owner().unwrap_or(""),
                e.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                e.amount.to_string(),
                e.kind.as_str(),
                e.id.as_deref().unwrap_or(""),
            )
        })
        .collect();
    events.sort_unstable();

    let mut hasher = Hasher::new();
    hasher.update(&forest_digest.to_le_bytes());
    hasher.update(index.period().key().as_bytes());
    hasher.update(&[RECORD]);
    for (owner, ts, amount, kind, id) in &events {
        for field in [*owner, ts.as_str(), amount.as_str(), *kind, *id] {
            hasher.update(field.as_bytes());
            hasher.update(&[FIELD]);
        }
        hasher.update(&[RECORD]);
    }
    format_fingerprint(hasher.finalize())
}

pub fn format_fingerprint(checksum: u32) -> String {
    format!("crc32:{:08x}", checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::forest::Node;
    use crate::ledger::{Amount, IndexOptions, LedgerEvent, Period};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn nodes() -> Vec<Node> {
        vec![Node::root("R"), Node::child("C1", "R"), Node::child("C2", "R")]
    }

    fn events() -> Vec<LedgerEvent> {
        vec![
            LedgerEvent::new("C1", Amount::from(5i64), ts("2026-09-03T00:00:00Z")),
            LedgerEvent::new("R", Amount::from(7i64), ts("2026-09-04T00:00:00Z")),
        ]
    }

    fn fingerprint(nodes: Vec<Node>, events: &[LedgerEvent]) -> String {
        let forest = Forest::from_nodes(nodes);
        let period = Period::month(2026, 9, 0).unwrap();
        let index = PeriodIndex::build(&forest, events, period, &IndexOptions::default());
        period_fingerprint(forest_digest(&forest), &index)
    }

    #[test]
    fn test_format() {
        assert_eq!(format_fingerprint(0xDEADBEEF), "crc32:deadbeef");
        assert_eq!(format_fingerprint(1), "crc32:00000001");
    }

    #[test]
    fn test_independent_of_input_order() {
        let mut reversed_nodes = nodes();
        reversed_nodes.reverse();
        let mut reversed_events = events();
        reversed_events.reverse();

        assert_eq!(
            fingerprint(nodes(), &events()),
            fingerprint(reversed_nodes, &reversed_events)
        );
    }

    #[test]
    fn test_changes_with_inputs() {
        let base = fingerprint(nodes(), &events());

        let mut moved = nodes();
        moved[2] = Node::child("C2", "C1");
        assert_ne!(base, fingerprint(moved, &events()));

        let mut more = events();
        more.push(LedgerEvent::new("C2", Amount::from(1i64), ts("2026-09-05T00:00:00Z")));
        assert_ne!(base, fingerprint(nodes(), &more));

        let mut inactive = nodes();
        inactive[1] = Node::child("C1", "R").with_status(false, false);
        assert_ne!(base, fingerprint(inactive, &events()));
    }

    #[test]
    fn test_ignores_excluded_events() {
        let base = fingerprint(nodes(), &events());
        let mut noisy = events();
        noisy.push(LedgerEvent::new("ghost", Amount::from(9i64), ts("2026-09-05T00:00:00Z")));
        noisy.push(LedgerEvent::new("R", Amount::from(9i64), ts("2026-11-05T00:00:00Z")));
        assert_eq!(base, fingerprint(nodes(), &noisy));
    }
}
