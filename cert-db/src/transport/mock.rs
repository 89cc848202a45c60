//! In-process ledger simulator
//!
//! Implements the ledger function table over a [`LocalStore`] and answers
//! with the same JSON an HTTP gateway would return. Knobs for tests:
//!
//! - failure mode: every call fails `Connectivity` before reaching the table
//! - latency: the response is delayed after the effect is applied, like a
//!   ledger that commits but answers slowly
//! - dropped writes: submits are acknowledged without being persisted
//! - canned responses: raw bytes returned for one function name

use async_trait::async_trait;
use cert_core::{
    CertificateRecord, LedgerError, LedgerResult, RecordStore, ScanFilter, ScanItem,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

use super::{functions, LedgerPatch, Transport};
use crate::local::LocalStore;

/// Prefix of transaction ids minted by the simulated ledger
pub const MOCK_TX_PREFIX: &str = "ledger";

/// Mock ledger transport for testing
pub struct MockTransport {
    ledger: LocalStore,
    fail_mode: AtomicBool,
    drop_writes: AtomicBool,
    latency_ms: AtomicU64,
    submit_calls: AtomicU64,
    evaluate_calls: AtomicU64,
    canned: Mutex<HashMap<String, Vec<u8>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            ledger: LocalStore::with_tx_prefix(MOCK_TX_PREFIX),
            fail_mode: AtomicBool::new(false),
            drop_writes: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            submit_calls: AtomicU64::new(0),
            evaluate_calls: AtomicU64::new(0),
            canned: Mutex::new(HashMap::new()),
        }
    }

    /// Enable failure mode for testing
    pub fn set_fail_mode(&self, fail: bool) {
        self.fail_mode.store(fail, Ordering::SeqCst);
    }

    /// Acknowledge submits without persisting them
    pub fn set_drop_writes(&self, drop: bool) {
        self.drop_writes.store(drop, Ordering::SeqCst);
    }

    /// Delay every response by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Answer `function` with `body` instead of running it
    pub async fn set_canned_response(&self, function: &str, body: impl Into<Vec<u8>>) {
        self.canned
            .lock()
            .await
            .insert(function.to_string(), body.into());
    }

    pub async fn clear_canned_responses(&self) {
        self.canned.lock().await.clear();
    }

    /// Submit calls received so far
    pub fn submit_count(&self) -> u64 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Evaluate calls received so far
    pub fn evaluate_count(&self) -> u64 {
        self.evaluate_calls.load(Ordering::SeqCst)
    }

    async fn handle(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(LedgerError::connectivity("Mock failure mode"));
        }

        trace!(function, ?args, "Mock ledger call");

        let canned = self.canned.lock().await.get(function).cloned();
        let result = match canned {
            Some(body) => Ok(body),
            None => self.dispatch(function, args).await,
        };

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        result
    }

    async fn dispatch(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        let drop_writes = self.drop_writes.load(Ordering::SeqCst);

        match function {
            functions::CREATE_CERTIFICATE => {
                let record: CertificateRecord = decode_arg(function, args, 0, 1)?;
                if drop_writes {
                    if self.ledger.get(&record.id).await.is_ok() {
                        return Err(LedgerError::AlreadyExists(record.id));
                    }
                    return encode(&record);
                }
                let key = record.id.clone();
                encode(&self.ledger.create(&key, record).await?)
            }
            functions::UPDATE_CERTIFICATE => {
                let key = arg(function, args, 0, 2)?;
                let patch: LedgerPatch = decode_arg(function, args, 1, 2)?;
                if drop_writes {
                    let existing = self.ledger.get(key).await?;
                    return encode(&patch.patch.apply(&existing, patch.last_modified));
                }
                encode(&self.ledger.update(key, patch.patch, patch.last_modified).await?)
            }
            functions::DELETE_CERTIFICATE => {
                let key = arg(function, args, 0, 2)?;
                let deleted_at = cert_core::parse_timestamp(arg(function, args, 1, 2)?)
                    .ok_or_else(|| {
                        LedgerError::validation(format!("{}: invalid deletedAt", function))
                    })?;
                if drop_writes {
                    return encode(&self.ledger.get(key).await?);
                }
                encode(&self.ledger.delete(key, deleted_at).await?)
            }
            functions::QUERY_CERTIFICATE => {
                let key = arg(function, args, 0, 1)?;
                encode(&self.ledger.get(key).await?)
            }
            functions::QUERY_ALL_CERTIFICATES => {
                expect_arity(function, args, 0)?;
                let items: Vec<ScanItem> = self.ledger.scan_all(&ScanFilter::All).await?.into_iter().collect();
                encode(&items)
            }
            functions::QUERY_CERTIFICATES_BY_STUDENT => {
                let student_id = arg(function, args, 0, 1)?;
                let filter = ScanFilter::Student(student_id.to_string());
                let items: Vec<ScanItem> = self.ledger.scan_all(&filter).await?.into_iter().collect();
                encode(&items)
            }
            functions::GET_CERTIFICATE_HISTORY => {
                let key = arg(function, args, 0, 1)?;
                encode(&self.ledger.history(key).await?)
            }
            functions::PING => encode(&serde_json::json!({ "status": "ok" })),
            other => Err(LedgerError::validation(format!(
                "unknown ledger function '{}'",
                other
            ))),
        }
    }
}

fn is_mutating(function: &str) -> bool {
    matches!(
        function,
        functions::CREATE_CERTIFICATE
            | functions::UPDATE_CERTIFICATE
            | functions::DELETE_CERTIFICATE
    )
}

fn expect_arity(function: &str, args: &[String], arity: usize) -> LedgerResult<()> {
    if args.len() != arity {
        return Err(LedgerError::validation(format!(
            "{} expects {} argument(s), got {}",
            function,
            arity,
            args.len()
        )));
    }
    Ok(())
}

fn arg<'a>(function: &str, args: &'a [String], index: usize, arity: usize) -> LedgerResult<&'a str> {
    expect_arity(function, args, arity)?;
    Ok(args[index].as_str())
}

fn decode_arg<T: serde::de::DeserializeOwned>(
    function: &str,
    args: &[String],
    index: usize,
    arity: usize,
) -> LedgerResult<T> {
    let raw = arg(function, args, index, arity)?;
    serde_json::from_str(raw)
        .map_err(|e| LedgerError::validation(format!("{}: malformed argument: {}", function, e)))
}

fn encode<T: Serialize>(value: &T) -> LedgerResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !is_mutating(function) {
            return Err(LedgerError::validation(format!(
                "{} is read-only, use evaluate",
                function
            )));
        }
        self.handle(function, args).await
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        if is_mutating(function) {
            return Err(LedgerError::validation(format!(
                "{} mutates state, use submit",
                function
            )));
        }
        self.handle(function, args).await
    }
}
