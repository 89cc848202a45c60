//! Certificate input validation
//!
//! Runs before any backend call so a rejected request leaves no partial
//! state behind.
//!
//! # Rules
//!
//! 1. A create carries non-empty `studentId`, `studentName`, `course`,
//!    `grade` and an ISO-8601 `issuedAt`; `id` is optional.
//! 2. An update carries at least one of `studentName`, `course`, `grade`,
//!    `issuedAt`.
//! 3. Any other key is rejected. Issuer and bookkeeping fields are set by the
//!    service, never by the caller.

use crate::error::{LedgerError, LedgerResult};
use crate::types::{field, parse_timestamp, CertificatePatch, FieldMap, NewCertificate};

/// Keys accepted on create
pub const CREATE_FIELDS: [&str; 6] = [
    field::ID,
    field::STUDENT_ID,
    field::STUDENT_NAME,
    field::COURSE,
    field::GRADE,
    field::ISSUED_AT,
];

/// Keys accepted on update
pub const UPDATE_FIELDS: [&str; 4] = [
    field::STUDENT_NAME,
    field::COURSE,
    field::GRADE,
    field::ISSUED_AT,
];

/// Maximum length of a certificate id
pub const MAX_ID_LEN: usize = 128;

/// Validate a create request and build its typed form
pub fn validate_new_certificate(fields: &FieldMap) -> LedgerResult<NewCertificate> {
    reject_unknown_fields(fields, &CREATE_FIELDS)?;

    let id = match fields.get(field::ID) {
        Some(raw) => Some(validate_id(raw)?),
        None => None,
    };

    Ok(NewCertificate {
        id,
        student_id: required(fields, field::STUDENT_ID)?,
        student_name: required(fields, field::STUDENT_NAME)?,
        course: required(fields, field::COURSE)?,
        grade: required(fields, field::GRADE)?,
        issued_at: required_timestamp(fields, field::ISSUED_AT)?,
    })
}

/// Validate an update request and build its typed form
pub fn validate_patch(fields: &FieldMap) -> LedgerResult<CertificatePatch> {
    reject_unknown_fields(fields, &UPDATE_FIELDS)?;

    let patch = CertificatePatch {
        student_name: optional(fields, field::STUDENT_NAME)?,
        course: optional(fields, field::COURSE)?,
        grade: optional(fields, field::GRADE)?,
        issued_at: match fields.get(field::ISSUED_AT) {
            Some(_) => Some(required_timestamp(fields, field::ISSUED_AT)?),
            None => None,
        },
    };

    if patch.is_empty() {
        return Err(LedgerError::validation(format!(
            "update must contain at least one of: {}",
            UPDATE_FIELDS.join(", ")
        )));
    }
    Ok(patch)
}

/// Validate a caller-supplied certificate id
pub fn validate_id(raw: &str) -> LedgerResult<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(LedgerError::validation("\"id\" is not allowed to be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(LedgerError::validation(format!(
            "\"id\" must be at most {} characters",
            MAX_ID_LEN
        )));
    }
    if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(LedgerError::validation(
            "\"id\" must not contain whitespace or control characters",
        ));
    }
    Ok(id.to_string())
}

fn reject_unknown_fields(fields: &FieldMap, allowed: &[&str]) -> LedgerResult<()> {
    match fields.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(LedgerError::validation(format!("\"{}\" is not allowed", key))),
        None => Ok(()),
    }
}

fn required(fields: &FieldMap, name: &str) -> LedgerResult<String> {
    match fields.get(name).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(LedgerError::validation(format!(
            "\"{}\" is not allowed to be empty",
            name
        ))),
        None => Err(LedgerError::validation(format!("\"{}\" is required", name))),
    }
}

fn optional(fields: &FieldMap, name: &str) -> LedgerResult<Option<String>> {
    match fields.get(name) {
        Some(_) => required(fields, name).map(Some),
        None => Ok(None),
    }
}

fn required_timestamp(fields: &FieldMap, name: &str) -> LedgerResult<chrono::DateTime<chrono::Utc>> {
    let raw = required(fields, name)?;
    parse_timestamp(&raw).ok_or_else(|| {
        LedgerError::validation(format!("\"{}\" must be in ISO 8601 date format", name))
    })
}
