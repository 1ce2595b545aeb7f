//! Per-node rollup finalization errors
//!
//! These never abort a run; the scheduler records them against the node.

use thiserror::Error;

pub type RollupResult<T> = Result<T, RollupError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollupError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node {0} was not visited by the rollup pass")]
    NotComputed(String),

    #[error("Amount overflow in the subtree of node {0}")]
    Overflow(String),
}

impl RollupError {
    /// Stable error code for logs and reports
    pub fn code(&self) -> &'static str {
        match self {
            RollupError::UnknownNode(_) => "ROLLUP_UNKNOWN_NODE",
            RollupError::NotComputed(_) => "ROLLUP_NOT_COMPUTED",
            RollupError::Overflow(_) => "ROLLUP_OVERFLOW",
        }
    }
}
