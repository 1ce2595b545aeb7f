//! Forest Builder
//!
//! Turns the hierarchy collaborator's flat `(id, parent_id)` list into an
//! index-based forest: a node array, per-node children index lists and an
//! id → index map.
//!
//! # Guarantees
//!
//! - O(N) build, input never mutated
//! - Every node appears exactly once with at most one parent
//! - Dangling and self-referencing parents are re-rooted and reported
//! - Parent cycles are left in place for the rollup traversal to cut

mod builder;
mod issues;
mod node;

pub use builder::Forest;
pub use issues::StructuralIssue;
pub use node::{Node, NodeIdx};
