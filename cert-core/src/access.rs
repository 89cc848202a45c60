//! Role-based access policy
//!
//! | Role | Allowed |
//! |------|---------|
//! | admin | everything |
//! | university | create, update, delete, verify, read, read all, history |
//! | verifier | verify, read, read all, history |
//! | student | read, verify and history of own records; read all is filtered |
//!
//! `init_ledger` is reserved for admins.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::ScanFilter;
use crate::logging::operations;
use crate::types::{Caller, CertificateRecord, HistoryEntry, Role};

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Verify,
    Read,
    ReadAll,
    ReadHistory,
    InitLedger,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Verify => "verify",
            Self::Read => "read",
            Self::ReadAll => "read_all",
            Self::ReadHistory => "read_history",
            Self::InitLedger => "init_ledger",
        }
    }

    /// Operations a student may only perform on their own records
    fn is_owner_scoped(&self) -> bool {
        matches!(self, Self::Read | Self::Verify | Self::ReadHistory)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a caller may perform an operation
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Authorize `operation` for `caller`.
    ///
    /// Without a `target` only the role is checked; owner-scoped operations
    /// of a student must be authorized again once the record is known.
    pub fn authorize(
        &self,
        caller: &Caller,
        operation: Operation,
        target: Option<&CertificateRecord>,
    ) -> LedgerResult<()> {
        let allowed = match caller.role {
            Role::Admin => true,
            Role::University => !matches!(operation, Operation::InitLedger),
            Role::Verifier => matches!(
                operation,
                Operation::Verify | Operation::Read | Operation::ReadAll | Operation::ReadHistory
            ),
            Role::Student => match (operation, target) {
                (Operation::ReadAll, _) => true,
                (op, None) if op.is_owner_scoped() => true,
                (op, Some(record)) if op.is_owner_scoped() => record.belongs_to(&caller.id),
                _ => false,
            },
        };

        if allowed {
            return Ok(());
        }

        warn!(
            actor_id = %caller.id,
            role = %caller.role,
            operation = operation.as_str(),
            cert_id = target.map(|r| r.id.as_str()).unwrap_or(""),
            status = operations::ACCESS_DENY,
            "Access denied"
        );

        Err(LedgerError::access_denied(match (caller.role, target) {
            (Role::Student, Some(_)) => {
                "students can only access their own certificates".to_string()
            }
            (role, _) => format!("role '{}' may not {}", role, operation),
        }))
    }

    /// Scan filter that a listing for `caller` must apply
    pub fn scan_filter(&self, caller: &Caller) -> ScanFilter {
        match caller.role {
            Role::Student => ScanFilter::Student(caller.id.clone()),
            _ => ScanFilter::All,
        }
    }

    /// Whether `caller` may see `record` in a listing
    pub fn can_list(&self, caller: &Caller, record: &CertificateRecord) -> bool {
        caller.role != Role::Student || record.belongs_to(&caller.id)
    }

    /// Restrict a key's history to what `caller` may read.
    ///
    /// A key can be deleted and re-issued to another student, so a student
    /// gets only the entries whose snapshot is their own. A non-empty
    /// history without any such entry is denied.
    pub fn filter_history(
        &self,
        caller: &Caller,
        key: &str,
        entries: Vec<HistoryEntry>,
    ) -> LedgerResult<Vec<HistoryEntry>> {
        if caller.role != Role::Student || entries.is_empty() {
            return Ok(entries);
        }

        let own: Vec<HistoryEntry> = entries
            .into_iter()
            .filter(|e| e.student_id() == Some(caller.id.as_str()))
            .collect();
        if !own.is_empty() {
            return Ok(own);
        }

        warn!(
            actor_id = %caller.id,
            role = %caller.role,
            operation = Operation::ReadHistory.as_str(),
            cert_id = key,
            status = operations::ACCESS_DENY,
            "Access denied"
        );
        Err(LedgerError::access_denied(
            "students can only access their own certificates",
        ))
    }
}
