//! Persisted rollup output

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ledger::{Amount, Period};

/// Storage key of a rollup: one record per (node, period).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RollupKey {
    pub node_id: String,
    /// [`Period::key`] of the period
    pub period: String,
}

impl RollupKey {
    pub fn new(node_id: impl Into<String>, period: &Period) -> Self {
        Self {
            node_id: node_id.into(),
            period: period.key(),
        }
    }
}

impl fmt::Display for RollupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node_id, self.period)
    }
}

/// The (personal, first-line, team) rollup of one node for one period.
///
/// Derived only from the node set and the period's ledger events; the same
/// inputs always encode to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupRecord {
    pub node_id: String,
    pub period: Period,
    /// Sum of the node's own events
    pub personal: Amount,
    /// Sum of the direct children's personal production
    pub first_line: Amount,
    /// Sum of personal production over the whole subtree, node included
    pub team: Amount,
    /// Direct children
    pub direct_count: u32,
    /// Direct children flagged active
    pub active_direct_count: u32,
    /// Nodes in the subtree, node included
    pub team_size: u64,
    /// Events counted into `personal`
    pub personal_events: u64,
    /// Events counted into `team`
    pub team_events: u64,
    /// Checksum of the inputs this record was derived from
    pub snapshot_fingerprint: String,
}

impl RollupRecord {
    pub fn key(&self) -> RollupKey {
        RollupKey::new(self.node_id.clone(), &self.period)
    }

    /// Canonical byte encoding used by stores
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RollupRecord {
        RollupRecord {
            node_id: "R".into(),
            period: Period::month(2026, 9, 0).unwrap(),
            personal: "100.00".parse().unwrap(),
            first_line: "80.00".parse().unwrap(),
            team: "190.00".parse().unwrap(),
            direct_count: 2,
            active_direct_count: 2,
            team_size: 4,
            personal_events: 1,
            team_events: 4,
            snapshot_fingerprint: "crc32:0badf00d".into(),
        }
    }

    #[test]
    fn test_encode_is_stable() {
        let record = sample();
        assert_eq!(record.encode().unwrap(), record.clone().encode().unwrap());
        let decoded = RollupRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded.encode().unwrap(), record.encode().unwrap());
    }

    #[test]
    fn test_key() {
        let key = sample().key();
        assert_eq!(key.node_id, "R");
        assert_eq!(key.period, "2026-09-01T00:00:00Z/2026-10-01T00:00:00Z");
        assert_eq!(key.to_string(), "R@2026-09-01T00:00:00Z/2026-10-01T00:00:00Z");
    }
}
