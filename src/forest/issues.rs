//! Structural problems in the hierarchy that a run tolerates
//!
//! None of these abort a run. The affected node is re-rooted, dropped, or
//! the offending edge contributes nothing; the issue is logged and carried
//! into the run report.

use std::fmt;

use serde::Serialize;

/// A forest shape problem detected while building or traversing the forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralIssue {
    /// Node names itself as parent; treated as a root
    SelfParent { node_id: String },

    /// Parent id is not part of the working set; treated as a root
    DanglingParent { node_id: String, parent_id: String },

    /// A later node repeats an id already seen; the later one is dropped
    DuplicateId { node_id: String },

    /// Traversal reached a node still on the stack; the edge contributes zero
    Cycle { parent_id: String, child_id: String },
}

impl StructuralIssue {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            StructuralIssue::SelfParent { .. } => "self_parent",
            StructuralIssue::DanglingParent { .. } => "dangling_parent",
            StructuralIssue::DuplicateId { .. } => "duplicate_id",
            StructuralIssue::Cycle { .. } => "cycle",
        }
    }

    /// The node the issue is reported against
    pub fn node_id(&self) -> &str {
        match self {
            StructuralIssue::SelfParent { node_id }
            | StructuralIssue::DanglingParent { node_id, .. }
            | StructuralIssue::DuplicateId { node_id } => node_id,
            StructuralIssue::Cycle { child_id, .. } => child_id,
        }
    }

    /// Log fields for this issue
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("kind", self.kind().to_string())];
        match self {
            StructuralIssue::SelfParent { node_id } | StructuralIssue::DuplicateId { node_id } => {
                fields.push(("node_id", node_id.clone()));
            }
            StructuralIssue::DanglingParent { node_id, parent_id } => {
                fields.push(("node_id", node_id.clone()));
                fields.push(("parent_id", parent_id.clone()));
            }
            StructuralIssue::Cycle {
                parent_id,
                child_id,
            } => {
                fields.push(("node_id", child_id.clone()));
                fields.push(("parent_id", parent_id.clone()));
            }
        }
        fields
    }
}

impl fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralIssue::SelfParent { node_id } => {
                write!(f, "node '{}' is its own parent", node_id)
            }
            StructuralIssue::DanglingParent { node_id, parent_id } => write!(
                f,
                "node '{}' references unknown parent '{}'",
                node_id, parent_id
            ),
            StructuralIssue::DuplicateId { node_id } => {
                write!(f, "duplicate node id '{}'", node_id)
            }
            StructuralIssue::Cycle {
                parent_id,
                child_id,
            } => write!(
                f,
                "cycle detected on edge '{}' -> '{}'",
                parent_id, child_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_serializes_with_kind_tag() {
        let issue = StructuralIssue::Cycle {
            parent_id: "a".into(),
            child_id: "b".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "cycle");
        assert_eq!(json["child_id"], "b");
        assert_eq!(issue.node_id(), "b");
    }

    #[test]
    fn test_display() {
        let issue = StructuralIssue::DanglingParent {
            node_id: "n".into(),
            parent_id: "ghost".into(),
        };
        assert!(issue.to_string().contains("ghost"));
        assert_eq!(issue.kind(), "dangling_parent");
    }
}
