//! Ledger Transport
//!
//! Structured call/response contract between [`LedgerStore`] and the
//! distributed ledger. Implementations:
//! - [`HttpTransport`]: JSON over HTTP to a ledger gateway
//! - [`MockTransport`]: in-process ledger simulator (testing, demos)
//!
//! Errors use the shared taxonomy so the store can pass them through with
//! their kind intact.
//!
//! [`LedgerStore`]: crate::LedgerStore

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::MockTransport;

use async_trait::async_trait;
use cert_core::{CertificatePatch, LedgerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger function names
pub mod functions {
    /// submit `[recordJson]` -> record
    pub const CREATE_CERTIFICATE: &str = "createCertificate";
    /// submit `[id, patchJson]` -> record
    pub const UPDATE_CERTIFICATE: &str = "updateCertificate";
    /// submit `[id, deletedAt]` -> last snapshot
    pub const DELETE_CERTIFICATE: &str = "deleteCertificate";
    /// evaluate `[id]` -> record
    pub const QUERY_CERTIFICATE: &str = "queryCertificate";
    /// evaluate `[]` -> `[{key, record}]`
    pub const QUERY_ALL_CERTIFICATES: &str = "queryAllCertificates";
    /// evaluate `[studentId]` -> `[{key, record}]`
    pub const QUERY_CERTIFICATES_BY_STUDENT: &str = "queryCertificatesByStudent";
    /// evaluate `[id]` -> `[HistoryEntry]`
    pub const GET_CERTIFICATE_HISTORY: &str = "getCertificateHistory";
    /// evaluate `[]` -> anything
    pub const PING: &str = "ping";
}

/// Transport to the distributed ledger
#[async_trait]
pub trait Transport: Send + Sync {
    /// Mutating call, ordered and committed by the ledger
    async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>>;

    /// Read-only call, no side effects
    async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>>;
}

/// Body of a transport call on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub function: String,
    pub args: Vec<String>,
}

impl TransportRequest {
    pub fn new(function: &str, args: &[String]) -> Self {
        Self {
            function: function.to_string(),
            args: args.to_vec(),
        }
    }
}

/// Update payload sent to the ledger.
///
/// Carries the modification time chosen by the service so every endorsing
/// peer writes the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPatch {
    #[serde(flatten)]
    pub patch: CertificatePatch,
    pub last_modified: DateTime<Utc>,
}
