//! Rollup store errors
//!
//! Codes:
//! - ROLLUP_STORE_IO (per-write, node marked failed)
//! - ROLLUP_STORE_ENCODE (per-write, node marked failed)
//! - ROLLUP_STORE_CORRUPTION (fatal on open)
//! - ROLLUP_STORE_LOCK (per-write, node marked failed)

use std::io;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode rollup {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Rollup store corrupted at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("Rollup store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        StoreError::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "ROLLUP_STORE_IO",
            StoreError::Encode { .. } => "ROLLUP_STORE_ENCODE",
            StoreError::Corruption { .. } => "ROLLUP_STORE_CORRUPTION",
            StoreError::LockPoisoned => "ROLLUP_STORE_LOCK",
        }
    }

    /// Corruption means the store cannot be trusted; nothing else is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corruption { .. })
    }
}
