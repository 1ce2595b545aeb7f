//! Rollup Computer
//!
//! Derives every subtree aggregate exactly once with a memoized post-order
//! traversal:
//!
//! ```text
//! first_line(n) = Σ personal(c)          over direct children c
//! team(n)       = personal(n) + Σ team(c)
//! ```
//!
//! The traversal keeps its own stack so arbitrarily deep chains cannot
//! overflow the thread stack. A child that is still on the stack when its
//! parent reaches it closes a cycle: that edge contributes nothing and a
//! [`StructuralIssue::Cycle`] is recorded.
//!
//! The pass is pure. Its only output is the in-memory [`RollupTable`].

use super::errors::{RollupError, RollupResult};
use super::record::RollupRecord;
use crate::forest::{Forest, NodeIdx, StructuralIssue};
use crate::ledger::{Amount, Period, PeriodIndex};

/// Memoized aggregates of one node.
///
/// `first_line` and `team` are `None` when a sum overflowed somewhere in the
/// subtree; such nodes are reported as failed, never written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollup {
    pub personal: Amount,
    pub first_line: Option<Amount>,
    pub team: Option<Amount>,
    pub direct_count: u32,
    pub active_direct_count: u32,
    pub team_size: u64,
    pub personal_events: u64,
    pub team_events: u64,
}

/// Output of one rollup pass, shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct RollupTable {
    period: Period,
    scale: u32,
    entries: Vec<Option<Rollup>>,
    visited: usize,
    issues: Vec<StructuralIssue>,
}

impl RollupTable {
    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn get(&self, idx: NodeIdx) -> Option<&Rollup> {
        self.entries.get(idx).and_then(Option::as_ref)
    }

    /// Number of nodes that received a rollup
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Cycle edges cut during the pass
    pub fn issues(&self) -> &[StructuralIssue] {
        &self.issues
    }

    /// Finalize the persisted record of `idx`.
    pub fn record(
        &self,
        forest: &Forest,
        idx: NodeIdx,
        fingerprint: &str,
    ) -> RollupResult<RollupRecord> {
        if idx >= forest.len() {
            return Err(RollupError::UnknownNode(idx.to_string()));
        }
        let node_id = forest.id(idx);
        let rollup = self
            .get(idx)
            .ok_or_else(|| RollupError::NotComputed(node_id.to_string()))?;
        let overflow = || RollupError::Overflow(node_id.to_string());
        let at_scale = |amount: Option<Amount>| {
            amount
                .and_then(|a| a.normalize(self.scale))
                .ok_or_else(overflow)
        };

        Ok(RollupRecord {
            node_id: node_id.to_string(),
            period: self.period,
            personal: at_scale(Some(rollup.personal))?,
            first_line: at_scale(rollup.first_line)?,
            team: at_scale(rollup.team)?,
            direct_count: rollup.direct_count,
            active_direct_count: rollup.active_direct_count,
            team_size: rollup.team_size,
            personal_events: rollup.personal_events,
            team_events: rollup.team_events,
            snapshot_fingerprint: fingerprint.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

/// Runs rollup passes over one forest and one period index.
pub struct RollupComputer<'a> {
    forest: &'a Forest,
    index: &'a PeriodIndex,
}

impl<'a> RollupComputer<'a> {
    pub fn new(forest: &'a Forest, index: &'a PeriodIndex) -> Self {
        Self { forest, index }
    }

    /// Roll up every node.
    ///
    /// Roots are visited first; nodes reachable only through a parent
    /// cycle are then visited in node order so they still get a rollup.
    pub fn compute_all(&self) -> RollupTable {
        let mut pass = Pass::new(self.forest, self.index);
        for &root in self.forest.roots() {
            pass.visit(root);
        }
        for idx in 0..self.forest.len() {
            pass.visit(idx);
        }
        pass.finish()
    }

    /// Roll up only the subtrees under `roots` (targeted recompute).
    pub fn compute(&self, roots: &[NodeIdx]) -> RollupTable {
        let mut pass = Pass::new(self.forest, self.index);
        for &root in roots {
            if root < self.forest.len() {
                pass.visit(root);
            }
        }
        pass.finish()
    }
}

struct Pass<'a> {
    forest: &'a Forest,
    index: &'a PeriodIndex,
    state: Vec<Visit>,
    entries: Vec<Option<Rollup>>,
    visited: usize,
    issues: Vec<StructuralIssue>,
}

impl<'a> Pass<'a> {
    fn new(forest: &'a Forest, index: &'a PeriodIndex) -> Self {
        Self {
            forest,
            index,
            state: vec![Visit::Unvisited; forest.len()],
            entries: vec![None; forest.len()],
            visited: 0,
            issues: Vec::new(),
        }
    }

    fn visit(&mut self, start: NodeIdx) {
        if self.state[start] != Visit::Unvisited {
            return;
        }
        let forest = self.forest;

        // (node, position of the next child to descend into)
        let mut stack: Vec<(NodeIdx, usize)> = vec![(start, 0)];
        self.state[start] = Visit::OnStack;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let children = forest.children(node);

            if next < children.len() {
                top.1 += 1;
                let child = children[next];
                match self.state[child] {
                    Visit::Unvisited => {
                        self.state[child] = Visit::OnStack;
                        stack.push((child, 0));
                    }
                    Visit::OnStack => self.issues.push(StructuralIssue::Cycle {
                        parent_id: forest.id(node).to_string(),
                        child_id: forest.id(child).to_string(),
                    }),
                    Visit::Done => {}
                }
            } else {
                stack.pop();
                self.finalize(node);
                self.state[node] = Visit::Done;
            }
        }
    }

    /// Fold the memoized children of `node` into its own rollup.
    ///
    /// Children still on the stack close a cycle and are left out.
    fn finalize(&mut self, node: NodeIdx) {
        let personal = self.index.personal(node);
        let personal_events = self.index.event_count(node);

        let mut first_line = Some(Amount::ZERO);
        let mut team = Some(personal);
        let mut rollup = Rollup {
            personal,
            first_line: None,
            team: None,
            direct_count: 0,
            active_direct_count: 0,
            team_size: 1,
            personal_events,
            team_events: personal_events,
        };

        for &child in self.forest.children(node) {
            if self.state[child] != Visit::Done {
                continue;
            }
            let Some(sub) = self.entries[child].as_ref() else {
                continue;
            };
            rollup.direct_count += 1;
            if self.forest.node(child).active {
                rollup.active_direct_count += 1;
            }
            rollup.team_size += sub.team_size;
            rollup.team_events += sub.team_events;
            first_line = first_line.and_then(|acc| acc.checked_add(sub.personal));
            team = match (team, sub.team) {
                (Some(acc), Some(child_team)) => acc.checked_add(child_team),
                _ => None,
            };
        }

        rollup.first_line = first_line;
        rollup.team = team;
        self.entries[node] = Some(rollup);
        self.visited += 1;
    }

    fn finish(self) -> RollupTable {
        RollupTable {
            period: *self.index.period(),
            scale: self.index.scale(),
            entries: self.entries,
            visited: self.visited,
            issues: self.issues,
        }
    }
}
