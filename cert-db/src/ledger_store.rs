//! Ledger-backed record store
//!
//! Every operation is one [`Transport`] call: `submit` for mutations,
//! `evaluate` for reads. Each call is bounded by the configured timeout and
//! is never retried here. Transport errors keep their kind.
//!
//! Responses are parsed strictly; anything unreadable is a `Serialization`
//! error. With write confirmation on, every create and update is read back
//! and compared with what the ledger acknowledged.

use async_trait::async_trait;
use cert_core::logging::operations;
use cert_core::{
    format_timestamp, BackendKind, CertificatePatch, CertificateRecord, ErrorKind, HealthStatus,
    HistoryEntry, LedgerError, LedgerResult, RecordScan, RecordStore, ScanFilter, ScanItem,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::config::LedgerConfig;
use crate::transport::{functions, LedgerPatch, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Submit,
    Evaluate,
}

impl CallKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => operations::SUBMIT,
            Self::Evaluate => operations::EVALUATE,
        }
    }
}

/// Record store over a distributed ledger
pub struct LedgerStore {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    confirm_writes: bool,
}

impl LedgerStore {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            confirm_writes: true,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &LedgerConfig) -> Self {
        Self {
            transport,
            timeout: config.timeout(),
            confirm_writes: config.confirm_writes,
        }
    }

    /// Enable or disable read-after-write confirmation
    pub fn with_confirm_writes(mut self, confirm: bool) -> Self {
        self.confirm_writes = confirm;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, kind: CallKind, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        let start = Instant::now();
        let call = async {
            match kind {
                CallKind::Submit => self.transport.submit(function, args).await,
                CallKind::Evaluate => self.transport.evaluate(function, args).await,
            }
        };

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::connectivity(match kind {
                CallKind::Submit => format!(
                    "{} timed out after {}ms; not retried, the ledger may still commit it",
                    function,
                    self.timeout.as_millis()
                ),
                CallKind::Evaluate => format!(
                    "{} timed out after {}ms",
                    function,
                    self.timeout.as_millis()
                ),
            })),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(bytes) => debug!(
                function,
                operation = kind.as_str(),
                duration_ms,
                bytes = bytes.len(),
                "Ledger call completed"
            ),
            Err(e) => warn!(
                function,
                operation = kind.as_str(),
                duration_ms,
                error = %e,
                "Ledger call failed"
            ),
        }
        result
    }

    async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.call(CallKind::Submit, function, args).await
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.call(CallKind::Evaluate, function, args).await
    }

    /// Check that the acknowledged snapshot `expected` was committed.
    ///
    /// The live record normally equals it. When another writer has moved the
    /// key on since, the snapshot must be in the key's history, or the live
    /// record must be strictly newer.
    async fn confirm(&self, key: &str, expected: &CertificateRecord) -> LedgerResult<()> {
        let stored = match self.fetch(key).await {
            Ok(stored) => Some(stored),
            Err(LedgerError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        if stored.as_ref() == Some(expected) {
            return Ok(());
        }

        let history = self.history(key).await?;
        if history.iter().any(|e| e.value.as_ref() == Some(expected)) {
            debug!(
                cert_id = key,
                operation = operations::CONFIRM_WRITE,
                "Write committed, superseded by a later one"
            );
            return Ok(());
        }

        match stored {
            None => {
                error!(
                    cert_id = key,
                    operation = operations::CONFIRM_WRITE,
                    "Acknowledged write not visible on ledger"
                );
                Err(LedgerError::connectivity(format!(
                    "write of {} was acknowledged but is not visible on the ledger",
                    key
                )))
            }
            Some(stored) if stored.last_modified > expected.last_modified => {
                warn!(
                    cert_id = key,
                    operation = operations::CONFIRM_WRITE,
                    "Write superseded before it could be read back"
                );
                Ok(())
            }
            Some(_) => {
                error!(
                    cert_id = key,
                    operation = operations::CONFIRM_WRITE,
                    "Ledger returned a different record than acknowledged"
                );
                Err(LedgerError::serialization(format!(
                    "read-after-write mismatch for {}",
                    key
                )))
            }
        }
    }

    async fn fetch(&self, key: &str) -> LedgerResult<CertificateRecord> {
        let bytes = self
            .evaluate(functions::QUERY_CERTIFICATE, &[key.to_string()])
            .await?;
        decode(functions::QUERY_CERTIFICATE, key, &bytes)
    }

    async fn scan(&self, function: &str, args: &[String]) -> LedgerResult<Vec<ScanItem>> {
        let bytes = self.evaluate(function, args).await?;
        decode(function, "", &bytes)
    }
}

/// Parse a ledger response, logging the failure
fn decode<T: DeserializeOwned>(function: &str, key: &str, bytes: &[u8]) -> LedgerResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        error!(
            function,
            cert_id = key,
            error = %e,
            "Ledger returned an unreadable payload"
        );
        LedgerError::serialization(format!("{} returned unreadable payload: {}", function, e))
    })
}

/// Ensure the ledger answered for the key that was asked for
fn expect_key(function: &str, key: &str, record: &CertificateRecord) -> LedgerResult<()> {
    if record.id != key {
        error!(function, cert_id = key, returned = %record.id, "Ledger answered for another key");
        return Err(LedgerError::serialization(format!(
            "{} returned record {} for key {}",
            function, record.id, key
        )));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for LedgerStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Ledger
    }

    async fn create(&self, key: &str, record: CertificateRecord) -> LedgerResult<CertificateRecord> {
        if record.id != key {
            return Err(LedgerError::validation(format!(
                "record id '{}' does not match key '{}'",
                record.id, key
            )));
        }

        let payload = serde_json::to_string(&record)?;
        let bytes = self
            .submit(functions::CREATE_CERTIFICATE, &[payload])
            .await?;
        let stored: CertificateRecord = decode(functions::CREATE_CERTIFICATE, key, &bytes)?;
        expect_key(functions::CREATE_CERTIFICATE, key, &stored)?;

        if self.confirm_writes {
            self.confirm(key, &stored).await?;
        }
        Ok(stored)
    }

    async fn get(&self, key: &str) -> LedgerResult<CertificateRecord> {
        let record = self.fetch(key).await?;
        expect_key(functions::QUERY_CERTIFICATE, key, &record)?;
        Ok(record)
    }

    async fn update(
        &self,
        key: &str,
        patch: CertificatePatch,
        modified_at: DateTime<Utc>,
    ) -> LedgerResult<CertificateRecord> {
        let payload = serde_json::to_string(&LedgerPatch {
            patch,
            last_modified: modified_at,
        })?;
        let bytes = self
            .submit(functions::UPDATE_CERTIFICATE, &[key.to_string(), payload])
            .await?;
        let updated: CertificateRecord = decode(functions::UPDATE_CERTIFICATE, key, &bytes)?;
        expect_key(functions::UPDATE_CERTIFICATE, key, &updated)?;

        if self.confirm_writes {
            self.confirm(key, &updated).await?;
        }
        Ok(updated)
    }

    async fn delete(&self, key: &str, deleted_at: DateTime<Utc>) -> LedgerResult<CertificateRecord> {
        let bytes = self
            .submit(
                functions::DELETE_CERTIFICATE,
                &[key.to_string(), format_timestamp(&deleted_at)],
            )
            .await?;
        let removed: CertificateRecord = decode(functions::DELETE_CERTIFICATE, key, &bytes)?;
        expect_key(functions::DELETE_CERTIFICATE, key, &removed)?;
        Ok(removed)
    }

    async fn scan_all(&self, filter: &ScanFilter) -> LedgerResult<RecordScan> {
        let items = match filter {
            ScanFilter::All => self.scan(functions::QUERY_ALL_CERTIFICATES, &[]).await?,
            ScanFilter::Student(student_id) => {
                self.scan(
                    functions::QUERY_CERTIFICATES_BY_STUDENT,
                    &[student_id.clone()],
                )
                .await?
            }
        };

        // the ledger's own filter is not trusted for access control
        let items: Vec<ScanItem> = items
            .into_iter()
            .filter(|item| filter.matches(&item.record))
            .collect();
        debug!(count = items.len(), operation = operations::SCAN, "Ledger scan");
        Ok(RecordScan::new(items))
    }

    async fn history(&self, key: &str) -> LedgerResult<Vec<HistoryEntry>> {
        let bytes = match self
            .evaluate(functions::GET_CERTIFICATE_HISTORY, &[key.to_string()])
            .await
        {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries: Vec<HistoryEntry> =
            decode(functions::GET_CERTIFICATE_HISTORY, key, &bytes)?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn health(&self) -> LedgerResult<HealthStatus> {
        match self.evaluate(functions::PING, &[]).await {
            Ok(_) => Ok(HealthStatus::healthy(BackendKind::Ledger, None)),
            Err(e) => Ok(HealthStatus::unavailable(BackendKind::Ledger, e.to_string())),
        }
    }
}
