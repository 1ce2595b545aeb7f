//! Rollup Computer and rollup records
//!
//! A rollup pass is pure in-memory computation over a read-only forest and
//! period index. It never performs I/O and never suspends.

mod computer;
mod errors;
mod record;

pub use computer::{Rollup, RollupComputer, RollupTable};
pub use errors::{RollupError, RollupResult};
pub use record::{RollupKey, RollupRecord};
