//! Rollup Store Writer
//!
//! Idempotent upsert of rollup records keyed by (node, period).
//!
//! # Contract
//!
//! - Re-writing a record derived from unchanged inputs leaves the stored
//!   bytes identical ([`UpsertOutcome::Unchanged`])
//! - The scheduler never has two writes for one key in flight, so stores
//!   only guard their own handles
//! - A failed write is reported, not retried; the next run writes it again

mod errors;
mod file;
mod frame;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use file::FileRollupStore;
pub use memory::MemoryRollupStore;

use serde::Serialize;

use crate::ledger::Period;
use crate::rollup::{RollupKey, RollupRecord};

/// What an upsert did to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No record existed for the key
    Inserted,
    /// A different record was replaced
    Updated,
    /// The stored record was already bit-identical
    Unchanged,
}

/// Persistence collaborator for rollup records.
///
/// Implementations are shared across worker threads.
pub trait RollupStore: Send + Sync {
    fn upsert(&self, record: &RollupRecord) -> StoreResult<UpsertOutcome>;

    fn get(&self, key: &RollupKey) -> StoreResult<Option<RollupRecord>>;

    /// All records of one period, ordered by node id
    fn list_period(&self, period: &Period) -> StoreResult<Vec<RollupRecord>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
