use serde::{Deserialize, Serialize};

use crate::ledger::{IndexOptions, Period};
use crate::scheduler::SchedulerConfig;

/// Which nodes get a record when no explicit node list is given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidatePolicy {
    /// Every node of the forest
    #[default]
    All,
    /// Nodes with at least one accepted event in the period
    WithEvents,
}

/// What one engine run computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub periods: Vec<Period>,
    /// Explicit candidates; only their subtrees are rolled up
    pub nodes: Option<Vec<String>>,
    pub candidates: CandidatePolicy,
    pub index: IndexOptions,
    pub scheduler: SchedulerConfig,
}

impl RunRequest {
    pub fn new(periods: Vec<Period>) -> Self {
        Self {
            periods,
            nodes: None,
            candidates: CandidatePolicy::All,
            index: IndexOptions::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    pub fn single(period: Period) -> Self {
        Self::new(vec![period])
    }

    pub fn with_nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_candidates(mut self, policy: CandidatePolicy) -> Self {
        self.candidates = policy;
        self
    }

    pub fn with_index_options(mut self, options: IndexOptions) -> Self {
        self.index = options;
        self
    }

    pub fn with_scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }
}
