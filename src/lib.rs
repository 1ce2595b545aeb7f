//! downline - deterministic downline rollups for referral forests
//!
//! Turns a flat participant hierarchy and an append-only production ledger
//! into per-node, per-period rollups (personal, first-line and team
//! production), persisted idempotently.
//!
//! Leaves first: `forest` → `ledger` → `rollup` → `scheduler` → `store`,
//! orchestrated by `engine` over a `snapshot` of the inputs.

pub mod cli;
pub mod config;
pub mod engine;
pub mod forest;
pub mod ledger;
pub mod observability;
pub mod rollup;
pub mod scheduler;
pub mod snapshot;
pub mod store;
