//! Verification results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::caller::{Caller, Role};
use super::record::CertificateRecord;

/// Reason reported when the certificate does not exist
pub const NOT_FOUND_REASON: &str = "not found";

/// Outcome of checking a certificate against expected field values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    /// `"not found"` or the name of the first mismatching field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<CertificateRecord>,
    pub verified_at: DateTime<Utc>,
    pub verified_by: String,
    pub verifier_role: Role,
}

impl VerificationResult {
    pub fn valid(record: CertificateRecord, caller: &Caller, at: DateTime<Utc>) -> Self {
        Self {
            valid: true,
            reason: None,
            record: Some(record),
            verified_at: at,
            verified_by: caller.id.clone(),
            verifier_role: caller.role,
        }
    }

    pub fn invalid(reason: impl Into<String>, caller: &Caller, at: DateTime<Utc>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            record: None,
            verified_at: at,
            verified_by: caller.id.clone(),
            verifier_role: caller.role,
        }
    }

    pub fn not_found(caller: &Caller, at: DateTime<Utc>) -> Self {
        Self::invalid(NOT_FOUND_REASON, caller, at)
    }
}
