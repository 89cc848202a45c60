//! Record store contract
//!
//! Both backends implement [`RecordStore`]:
//! - `LocalStore`: in-process table behind one lock
//! - `LedgerStore`: submit/evaluate calls against a distributed ledger
//!
//! Business logic only ever sees `Arc<dyn RecordStore>`, so create, update,
//! delete and verify behave the same regardless of backend.

mod history_log;

pub use history_log::HistoryLog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::types::{BackendKind, CertificatePatch, CertificateRecord, HealthStatus, HistoryEntry};

/// Restriction applied by a scan
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanFilter {
    /// Every live record
    #[default]
    All,
    /// Records of one student
    Student(String),
}

impl ScanFilter {
    pub fn matches(&self, record: &CertificateRecord) -> bool {
        match self {
            Self::All => true,
            Self::Student(id) => record.belongs_to(id),
        }
    }

    /// Narrow to one student, keeping an existing student restriction.
    ///
    /// Returns `None` when the two restrictions cannot both hold.
    pub fn and_student(&self, student_id: &str) -> Option<Self> {
        match self {
            Self::All => Some(Self::Student(student_id.to_string())),
            Self::Student(id) if id == student_id => Some(self.clone()),
            Self::Student(_) => None,
        }
    }
}

/// One item of a scan, as exchanged with the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanItem {
    pub key: String,
    pub record: CertificateRecord,
}

/// Finite result of a scan in ascending key order.
///
/// The scan is materialised, so it can be iterated any number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordScan {
    items: Vec<ScanItem>,
}

impl RecordScan {
    /// Build from unordered items; sorts by key
    pub fn new(mut items: Vec<ScanItem>) -> Self {
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Self { items }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CertificateRecord)> {
        self.items.iter().map(|i| (i.key.as_str(), &i.record))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.iter().any(|i| i.key == key)
    }

    /// Drop items that fail `keep`
    pub fn retain(mut self, mut keep: impl FnMut(&CertificateRecord) -> bool) -> Self {
        self.items.retain(|i| keep(&i.record));
        self
    }

    pub fn into_records(self) -> Vec<CertificateRecord> {
        self.items.into_iter().map(|i| i.record).collect()
    }
}

impl IntoIterator for RecordScan {
    type Item = ScanItem;
    type IntoIter = std::vec::IntoIter<ScanItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Uniform CRUD, scan and history contract over a backend
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend implementing this store
    fn backend(&self) -> BackendKind;

    /// Store a new record and append its CREATE entry.
    ///
    /// Fails `AlreadyExists` if `key` is live.
    async fn create(&self, key: &str, record: CertificateRecord) -> LedgerResult<CertificateRecord>;

    /// Fetch a live record; fails `NotFound` if absent
    async fn get(&self, key: &str) -> LedgerResult<CertificateRecord>;

    /// Merge `patch` over the live record, stamp `modified_at` and append an
    /// UPDATE entry. Issuer fields are preserved.
    async fn update(
        &self,
        key: &str,
        patch: CertificatePatch,
        modified_at: DateTime<Utc>,
    ) -> LedgerResult<CertificateRecord>;

    /// Remove the live record and append a DELETE entry; returns the last
    /// snapshot
    async fn delete(&self, key: &str, deleted_at: DateTime<Utc>) -> LedgerResult<CertificateRecord>;

    /// Live records matching `filter`
    async fn scan_all(&self, filter: &ScanFilter) -> LedgerResult<RecordScan>;

    /// Full history of `key`, oldest first; empty if the key never existed
    async fn history(&self, key: &str) -> LedgerResult<Vec<HistoryEntry>>;

    /// Check the backend
    async fn health(&self) -> LedgerResult<HealthStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Role};

    fn record(id: &str, student: &str) -> CertificateRecord {
        let ts = parse_timestamp("2025-01-15").unwrap();
        CertificateRecord {
            id: id.to_string(),
            student_id: student.to_string(),
            student_name: "Alice".to_string(),
            course: "CS".to_string(),
            grade: "A".to_string(),
            issued_at: ts,
            created_at: ts,
            last_modified: ts,
            issued_by: "UNIV1".to_string(),
            issuer_role: Role::University,
        }
    }

    #[test]
    fn test_scan_is_sorted_and_restartable() {
        let scan = RecordScan::new(vec![
            ScanItem { key: "CERT2".to_string(), record: record("CERT2", "STU002") },
            ScanItem { key: "CERT1".to_string(), record: record("CERT1", "STU001") },
        ]);
        let first: Vec<&str> = scan.iter().map(|(k, _)| k).collect();
        let second: Vec<&str> = scan.iter().map(|(k, _)| k).collect();
        assert_eq!(first, vec!["CERT1", "CERT2"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_filter_narrowing() {
        assert_eq!(
            ScanFilter::All.and_student("STU001"),
            Some(ScanFilter::Student("STU001".to_string()))
        );
        let own = ScanFilter::Student("STU001".to_string());
        assert_eq!(own.and_student("STU001"), Some(own.clone()));
        assert_eq!(own.and_student("STU002"), None);
        assert!(own.matches(&record("CERT1", "STU001")));
        assert!(!own.matches(&record("CERT2", "STU002")));
    }

    #[test]
    fn test_scan_item_wire_shape() {
        let item = ScanItem { key: "CERT1".to_string(), record: record("CERT1", "STU001") };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["key"], "CERT1");
        assert_eq!(json["record"]["studentId"], "STU001");
    }
}
