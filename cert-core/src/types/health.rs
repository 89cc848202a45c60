//! Backend identity and health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which record store implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store
    Local,
    /// Distributed ledger reached through a transport
    Ledger,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ledger => "ledger",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "memory" | "mem" => Some(Self::Local),
            "ledger" | "blockchain" | "fabric" => Some(Self::Ledger),
            _ => None,
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of backend health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub backend: BackendKind,
    pub available: bool,
    /// Live records, when the backend can count them cheaply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    pub message: String,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn healthy(backend: BackendKind, record_count: Option<u64>) -> Self {
        Self {
            backend,
            available: true,
            record_count,
            message: "OK".to_string(),
            checked_at: Utc::now(),
        }
    }

    pub fn unavailable(backend: BackendKind, message: impl Into<String>) -> Self {
        Self {
            backend,
            available: false,
            record_count: None,
            message: message.into(),
            checked_at: Utc::now(),
        }
    }
}
