//! Forest participants as supplied by the hierarchy collaborator

use serde::{Deserialize, Serialize};

/// Position of a node inside a [`Forest`](super::Forest)'s node array.
pub type NodeIdx = usize;

/// A participant in the referral forest.
///
/// The hierarchy edge is carried as `parent_id`. Feeds that name it
/// `upline`, `uplineId` or `parentId` are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique participant id
    pub id: String,

    /// Sponsor id; `None`, empty, unknown or self-referencing means root
    #[serde(
        default,
        alias = "upline",
        alias = "uplineId",
        alias = "parentId",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,

    /// Whether the participant is currently active
    #[serde(default = "default_active")]
    pub active: bool,

    /// Whether the participant holds a paid membership
    #[serde(default)]
    pub member: bool,
}

fn default_active() -> bool {
    true
}

impl Node {
    /// Create an active, non-member root node
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            active: true,
            member: false,
        }
    }

    /// Create an active, non-member node under `parent_id`
    pub fn child(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
            active: true,
            member: false,
        }
    }

    /// Builder-style status override
    pub fn with_status(mut self, active: bool, member: bool) -> Self {
        self.active = active;
        self.member = member;
        self
    }

    /// Parent id with empty strings treated as absent
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }
}
