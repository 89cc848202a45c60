//! History entries of the per-key audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::record::CertificateRecord;

/// Effect of a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged mutation of a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
    pub action: HistoryAction,
    /// Snapshot after the mutation; for a delete, the last live snapshot.
    /// Ledgers that drop the value on delete report `null`.
    pub value: Option<CertificateRecord>,
}

impl HistoryEntry {
    pub fn created(tx_id: impl Into<String>, record: &CertificateRecord) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp: record.created_at,
            is_delete: false,
            action: HistoryAction::Create,
            value: Some(record.clone()),
        }
    }

    pub fn updated(tx_id: impl Into<String>, record: &CertificateRecord) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp: record.last_modified,
            is_delete: false,
            action: HistoryAction::Update,
            value: Some(record.clone()),
        }
    }

    pub fn deleted(
        tx_id: impl Into<String>,
        last_snapshot: &CertificateRecord,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp: deleted_at,
            is_delete: true,
            action: HistoryAction::Delete,
            value: Some(last_snapshot.clone()),
        }
    }

    /// Student the entry's snapshot belongs to, if it carries one
    pub fn student_id(&self) -> Option<&str> {
        self.value.as_ref().map(|r| r.student_id.as_str())
    }
}
