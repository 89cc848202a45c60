//! Certificate records and the inputs that produce them

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::caller::Role;

/// Flat field map exchanged with the request layer
pub type FieldMap = BTreeMap<String, String>;

/// Wire names of record fields
pub mod field {
    pub const ID: &str = "id";
    pub const STUDENT_ID: &str = "studentId";
    pub const STUDENT_NAME: &str = "studentName";
    pub const COURSE: &str = "course";
    pub const GRADE: &str = "grade";
    pub const ISSUED_AT: &str = "issuedAt";
    pub const CREATED_AT: &str = "createdAt";
    pub const LAST_MODIFIED: &str = "lastModified";
    pub const ISSUED_BY: &str = "issuedBy";
    pub const ISSUER_ROLE: &str = "issuerRole";

    /// Fields holding a timestamp
    pub const TIMESTAMPS: [&str; 3] = [ISSUED_AT, CREATED_AT, LAST_MODIFIED];
}

/// A stored academic credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub course: String,
    pub grade: String,
    pub issued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Identity of the creator, fixed at creation
    pub issued_by: String,
    /// Role of the creator, fixed at creation
    pub issuer_role: Role,
}

impl CertificateRecord {
    /// Render one field by its wire name
    pub fn field(&self, name: &str) -> Option<String> {
        let value = match name {
            field::ID => self.id.clone(),
            field::STUDENT_ID => self.student_id.clone(),
            field::STUDENT_NAME => self.student_name.clone(),
            field::COURSE => self.course.clone(),
            field::GRADE => self.grade.clone(),
            field::ISSUED_AT => format_timestamp(&self.issued_at),
            field::CREATED_AT => format_timestamp(&self.created_at),
            field::LAST_MODIFIED => format_timestamp(&self.last_modified),
            field::ISSUED_BY => self.issued_by.clone(),
            field::ISSUER_ROLE => self.issuer_role.as_str().to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Flat field map view of the record
    pub fn to_fields(&self) -> FieldMap {
        [
            field::ID,
            field::STUDENT_ID,
            field::STUDENT_NAME,
            field::COURSE,
            field::GRADE,
            field::ISSUED_AT,
            field::CREATED_AT,
            field::LAST_MODIFIED,
            field::ISSUED_BY,
            field::ISSUER_ROLE,
        ]
        .into_iter()
        .filter_map(|name| self.field(name).map(|v| (name.to_string(), v)))
        .collect()
    }

    pub fn belongs_to(&self, student_id: &str) -> bool {
        self.student_id == student_id
    }
}

/// Validated input of a create request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub id: Option<String>,
    pub student_id: String,
    pub student_name: String,
    pub course: String,
    pub grade: String,
    pub issued_at: DateTime<Utc>,
}

impl NewCertificate {
    /// Build the record to store, stamping issuer and creation time
    pub fn into_record(
        self,
        id: String,
        issued_by: impl Into<String>,
        issuer_role: Role,
        now: DateTime<Utc>,
    ) -> CertificateRecord {
        CertificateRecord {
            id,
            student_id: self.student_id,
            student_name: self.student_name,
            course: self.course,
            grade: self.grade,
            issued_at: self.issued_at,
            created_at: now,
            last_modified: now,
            issued_by: issued_by.into(),
            issuer_role,
        }
    }
}

/// Partial update of a certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl CertificatePatch {
    pub fn is_empty(&self) -> bool {
        self.student_name.is_none()
            && self.course.is_none()
            && self.grade.is_none()
            && self.issued_at.is_none()
    }

    /// Merge over an existing record.
    ///
    /// Identity, student and issuer fields are not patchable and carry over.
    pub fn apply(&self, existing: &CertificateRecord, modified_at: DateTime<Utc>) -> CertificateRecord {
        let mut updated = existing.clone();
        if let Some(name) = &self.student_name {
            updated.student_name = name.clone();
        }
        if let Some(course) = &self.course {
            updated.course = course.clone();
        }
        if let Some(grade) = &self.grade {
            updated.grade = grade.clone();
        }
        if let Some(issued_at) = self.issued_at {
            updated.issued_at = issued_at;
        }
        updated.last_modified = modified_at;
        updated
    }
}

/// Current time truncated to whole seconds
pub fn now_seconds() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// ISO-8601 rendering used on the wire (`2025-01-15T00:00:00Z`)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 date or date-time.
///
/// A bare date is taken as midnight UTC; a date-time without offset is
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
