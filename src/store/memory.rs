//! In-memory rollup store
//!
//! Holds the canonical encoding of each record so "unchanged" means
//! byte-for-byte identical, exactly like the file store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::errors::{StoreError, StoreResult};
use super::{RollupStore, UpsertOutcome};
use crate::ledger::Period;
use crate::rollup::{RollupKey, RollupRecord};

#[derive(Debug, Default)]
pub struct MemoryRollupStore {
    records: RwLock<BTreeMap<RollupKey, Vec<u8>>>,
}

impl MemoryRollupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes of `key`, for bit-level comparisons
    pub fn raw(&self, key: &RollupKey) -> Option<Vec<u8>> {
        self.records.read().ok()?.get(key).cloned()
    }
}

impl RollupStore for MemoryRollupStore {
    fn upsert(&self, record: &RollupRecord) -> StoreResult<UpsertOutcome> {
        let key = record.key();
        let bytes = record.encode().map_err(|e| StoreError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        match records.insert(key, bytes.clone()) {
            None => Ok(UpsertOutcome::Inserted),
            Some(previous) if previous == bytes => Ok(UpsertOutcome::Unchanged),
            Some(_) => Ok(UpsertOutcome::Updated),
        }
    }

    fn get(&self, key: &RollupKey) -> StoreResult<Option<RollupRecord>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        records
            .get(key)
            .map(|bytes| {
                RollupRecord::decode(bytes).map_err(|e| StoreError::Encode {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn list_period(&self, period: &Period) -> StoreResult<Vec<RollupRecord>> {
        let period_key = period.key();
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        records
            .iter()
            .filter(|(k, _)| k.period == period_key)
            .map(|(k, bytes)| {
                RollupRecord::decode(bytes).map_err(|e| StoreError::Encode {
                    key: k.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}
