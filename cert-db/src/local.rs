//! In-process record store
//!
//! Keeps live records and per-key histories in memory. One lock covers the
//! whole table so a record and its history entry always change together.

use async_trait::async_trait;
use cert_core::logging::operations;
use cert_core::{
    BackendKind, CertificatePatch, CertificateRecord, HealthStatus, HistoryEntry, HistoryLog,
    LedgerError, LedgerResult, RecordScan, RecordStore, ScanFilter, ScanItem,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Prefix of transaction ids minted by [`LocalStore`]
pub const LOCAL_TX_PREFIX: &str = "local";

#[derive(Debug, Default)]
struct LocalState {
    /// Live records, ordered by key
    records: BTreeMap<String, CertificateRecord>,
    /// History per key, kept after deletion
    histories: HashMap<String, HistoryLog>,
}

/// In-memory store
///
/// Thread-safe through a single `RwLock`; every mutation holds the write
/// guard from the existence check until the history entry is appended.
#[derive(Debug)]
pub struct LocalStore {
    state: RwLock<LocalState>,
    tx_prefix: String,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self::with_tx_prefix(LOCAL_TX_PREFIX)
    }

    /// Store minting `{prefix}-{uuid}` transaction ids
    pub(crate) fn with_tx_prefix(prefix: &str) -> Self {
        Self {
            state: RwLock::new(LocalState::default()),
            tx_prefix: prefix.to_string(),
        }
    }

    fn next_tx_id(&self) -> String {
        format!("{}-{}", self.tx_prefix, uuid::Uuid::new_v4())
    }

    /// Number of live records
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn create(&self, key: &str, record: CertificateRecord) -> LedgerResult<CertificateRecord> {
        if record.id != key {
            return Err(LedgerError::validation(format!(
                "record id '{}' does not match key '{}'",
                record.id, key
            )));
        }

        let mut state = self.state.write().await;
        if state.records.contains_key(key) {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }

        let tx_id = self.next_tx_id();
        state
            .histories
            .entry(key.to_string())
            .or_default()
            .append(HistoryEntry::created(&tx_id, &record));
        state.records.insert(key.to_string(), record.clone());

        debug!(cert_id = key, tx_id = %tx_id, operation = operations::CREATE, "Record stored");
        Ok(record)
    }

    async fn get(&self, key: &str) -> LedgerResult<CertificateRecord> {
        let state = self.state.read().await;
        state
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(key))
    }

    async fn update(
        &self,
        key: &str,
        patch: CertificatePatch,
        modified_at: DateTime<Utc>,
    ) -> LedgerResult<CertificateRecord> {
        let mut state = self.state.write().await;
        let existing = state
            .records
            .get(key)
            .ok_or_else(|| LedgerError::not_found(key))?;
        let updated = patch.apply(existing, modified_at);

        let tx_id = self.next_tx_id();
        state
            .histories
            .entry(key.to_string())
            .or_default()
            .append(HistoryEntry::updated(&tx_id, &updated));
        state.records.insert(key.to_string(), updated.clone());

        debug!(cert_id = key, tx_id = %tx_id, operation = operations::UPDATE, "Record updated");
        Ok(updated)
    }

    async fn delete(&self, key: &str, deleted_at: DateTime<Utc>) -> LedgerResult<CertificateRecord> {
        let mut state = self.state.write().await;
        let removed = state
            .records
            .remove(key)
            .ok_or_else(|| LedgerError::not_found(key))?;

        let tx_id = self.next_tx_id();
        state
            .histories
            .entry(key.to_string())
            .or_default()
            .append(HistoryEntry::deleted(&tx_id, &removed, deleted_at));

        debug!(cert_id = key, tx_id = %tx_id, operation = operations::DELETE, "Record removed");
        Ok(removed)
    }

    async fn scan_all(&self, filter: &ScanFilter) -> LedgerResult<RecordScan> {
        let state = self.state.read().await;
        let items = state
            .records
            .iter()
            .filter(|(_, record)| filter.matches(record))
            .map(|(key, record)| ScanItem {
                key: key.clone(),
                record: record.clone(),
            })
            .collect();
        Ok(RecordScan::new(items))
    }

    async fn history(&self, key: &str) -> LedgerResult<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        Ok(state
            .histories
            .get(key)
            .map(|log| log.entries().to_vec())
            .unwrap_or_default())
    }

    async fn health(&self) -> LedgerResult<HealthStatus> {
        let count = self.state.read().await.records.len() as u64;
        Ok(HealthStatus::healthy(BackendKind::Local, Some(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cert_core::{parse_timestamp, ErrorKind, HistoryAction, Role};
    use std::sync::Arc;

    fn record(id: &str, student: &str) -> CertificateRecord {
        let ts = parse_timestamp("2025-01-15T00:00:00Z").unwrap();
        CertificateRecord {
            id: id.to_string(),
            student_id: student.to_string(),
            student_name: "Alice Johnson".to_string(),
            course: "Blockchain Development".to_string(),
            grade: "A".to_string(),
            issued_at: ts,
            created_at: ts,
            last_modified: ts,
            issued_by: "UNIV1".to_string(),
            issuer_role: Role::University,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = LocalStore::new();
        store.create("CERT1", record("CERT1", "STU001")).await.unwrap();

        let fetched = store.get("CERT1").await.unwrap();
        assert_eq!(fetched.student_id, "STU001");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_state_untouched() {
        let store = LocalStore::new();
        store.create("CERT1", record("CERT1", "STU001")).await.unwrap();

        let mut other = record("CERT1", "STU999");
        other.grade = "F".to_string();
        let err = store.create("CERT1", other).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        assert_eq!(store.get("CERT1").await.unwrap().student_id, "STU001");
        assert_eq!(store.history("CERT1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_key_rejected() {
        let store = LocalStore::new();
        let err = store.create("CERT2", record("CERT1", "STU001")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_keeps_history() {
        let store = LocalStore::new();
        store.create("CERT1", record("CERT1", "STU001")).await.unwrap();
        let later = parse_timestamp("2025-02-01T00:00:00Z").unwrap();
        let removed = store.delete("CERT1", later).await.unwrap();
        assert_eq!(removed.id, "CERT1");

        assert_eq!(store.get("CERT1").await.unwrap_err().kind(), ErrorKind::NotFound);
        let history = store.history("CERT1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].action, HistoryAction::Delete);
        assert!(history[1].is_delete);
        assert_eq!(history[1].timestamp, later);

        // the key can be issued again and its trail continues
        store.create("CERT1", record("CERT1", "STU001")).await.unwrap();
        assert_eq!(store.history("CERT1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tx_ids_are_unique_and_prefixed() {
        let store = LocalStore::new();
        store.create("CERT1", record("CERT1", "STU001")).await.unwrap();
        let later = parse_timestamp("2025-02-01T00:00:00Z").unwrap();
        store
            .update(
                "CERT1",
                CertificatePatch {
                    grade: Some("B".to_string()),
                    ..Default::default()
                },
                later,
            )
            .await
            .unwrap();

        let history = store.history("CERT1").await.unwrap();
        assert!(history.iter().all(|e| e.tx_id.starts_with("local-")));
        assert_ne!(history[0].tx_id, history[1].tx_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_single_winner() {
        let store = Arc::new(LocalStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create("CERT1", record("CERT1", &format!("STU{:03}", i)))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.history("CERT1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_health_reports_count() {
        let store = LocalStore::new();
        store.create("CERT1", record("CERT1", "STU001")).await.unwrap();
        let health = store.health().await.unwrap();
        assert!(health.available);
        assert_eq!(health.backend, BackendKind::Local);
        assert_eq!(health.record_count, Some(1));
    }
}
