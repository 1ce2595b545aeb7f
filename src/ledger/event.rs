//! Ledger production events and the data issues raised while indexing them

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;

/// An immutable production record owned by one node.
///
/// Deleted events stay in the ledger with `deleted = true`; they are never
/// counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Ledger-assigned id, when the collaborator supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Owning node id
    #[serde(default, alias = "ownerId", alias = "userId")]
    pub owner_id: Option<String>,

    /// Production amount, already normalized to one currency
    pub amount: Amount,

    /// When the event was booked
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,

    /// Event kind, e.g. `reward` or `stake`
    #[serde(default)]
    pub kind: String,

    /// Soft-delete marker
    #[serde(default)]
    pub deleted: bool,
}

impl LedgerEvent {
    pub fn new(owner_id: impl Into<String>, amount: Amount, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            owner_id: Some(owner_id.into()),
            amount,
            timestamp,
            kind: String::new(),
            deleted: false,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Owner id with empty strings treated as absent
    pub fn owner(&self) -> Option<&str> {
        self.owner_id.as_deref().filter(|o| !o.trim().is_empty())
    }
}

/// Why an event was excluded from personal production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIssue {
    /// Event carries no owner
    MissingOwner { event_id: Option<String> },

    /// Owner is not part of the forest
    UnknownOwner {
        event_id: Option<String>,
        owner_id: String,
    },

    /// Source line could not be parsed as an event
    Malformed { line: u64, reason: String },

    /// Amount does not fit the ledger scale, or adding it would overflow
    /// the owner's personal total
    Overflow { owner_id: String },
}

impl DataIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            DataIssue::MissingOwner { .. } => "missing_owner",
            DataIssue::UnknownOwner { .. } => "unknown_owner",
            DataIssue::Malformed { .. } => "malformed",
            DataIssue::Overflow { .. } => "overflow",
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIssue::MissingOwner { event_id } => write!(
                f,
                "event {} has no owner",
                event_id.as_deref().unwrap_or("<no id>")
            ),
            DataIssue::UnknownOwner { event_id, owner_id } => write!(
                f,
                "event {} owned by unknown node '{}'",
                event_id.as_deref().unwrap_or("<no id>"),
                owner_id
            ),
            DataIssue::Malformed { line, reason } => {
                write!(f, "malformed event on line {}: {}", line, reason)
            }
            DataIssue::Overflow { owner_id } => {
                write!(f, "personal total of '{}' overflows", owner_id)
            }
        }
    }
}
