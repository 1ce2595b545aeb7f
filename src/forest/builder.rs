//! Flat node list to index-based forest
//!
//! O(N) time and space. Children are recorded in input order, which fixes
//! the traversal order (and so the decimal summation order) for a given
//! input.

use std::collections::HashMap;

use super::issues::StructuralIssue;
use super::node::{Node, NodeIdx};

/// Read-only rooted forest over a snapshot of nodes.
///
/// Nodes live in a flat array; edges are index lists. Nothing holds a
/// reference into another node, so the forest can be shared across worker
/// threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeIdx>>,
    children: Vec<Vec<NodeIdx>>,
    index: HashMap<String, NodeIdx>,
    roots: Vec<NodeIdx>,
    issues: Vec<StructuralIssue>,
}

impl Forest {
    /// Build from a borrowed node list; the input is left untouched.
    pub fn build(nodes: &[Node]) -> Self {
        Self::from_nodes(nodes.to_vec())
    }

    /// Build from an owned node list.
    ///
    /// - duplicate ids: first occurrence kept, the rest dropped and reported
    /// - missing or empty parent: root
    /// - self parent: root, reported
    /// - parent outside the set: root, reported
    pub fn from_nodes(input: Vec<Node>) -> Self {
        let mut issues = Vec::new();
        let mut index = HashMap::with_capacity(input.len());
        let mut nodes = Vec::with_capacity(input.len());

        for node in input {
            if index.contains_key(&node.id) {
                issues.push(StructuralIssue::DuplicateId {
                    node_id: node.id.clone(),
                });
                continue;
            }
            index.insert(node.id.clone(), nodes.len());
            nodes.push(node);
        }

        let mut parents = vec![None; nodes.len()];
        let mut children: Vec<Vec<NodeIdx>> = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();

        for (idx, node) in nodes.iter().enumerate() {
            let parent = match node.parent() {
                None => None,
                Some(pid) if pid == node.id => {
                    issues.push(StructuralIssue::SelfParent {
                        node_id: node.id.clone(),
                    });
                    None
                }
                Some(pid) => match index.get(pid) {
                    Some(&pidx) => Some(pidx),
                    None => {
                        issues.push(StructuralIssue::DanglingParent {
                            node_id: node.id.clone(),
                            parent_id: pid.to_string(),
                        });
                        None
                    }
                },
            };

            match parent {
                Some(pidx) => {
                    parents[idx] = Some(pidx);
                    children[pidx].push(idx);
                }
                None => roots.push(idx),
            }
        }

        Self {
            nodes,
            parents,
            children,
            index,
            roots,
            issues,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the node with the given id
    pub fn lookup(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    /// Panics if `idx` is out of range; indexes only come from this forest.
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    pub fn id(&self, idx: NodeIdx) -> &str {
        &self.nodes[idx].id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.parents[idx]
    }

    /// Direct children in input order
    pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.children[idx]
    }

    /// Nodes with no resolvable parent, in input order.
    ///
    /// Nodes that sit on a parent cycle have a parent and are not roots.
    pub fn roots(&self) -> &[NodeIdx] {
        &self.roots
    }

    /// Issues found while building
    pub fn issues(&self) -> &[StructuralIssue] {
        &self.issues
    }
}
