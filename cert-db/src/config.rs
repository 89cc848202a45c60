//! Service Configuration
//!
//! Backend selection and ledger connection settings. Supports loading from
//! environment variables with the `CERT_` prefix; unparsable values fall back
//! to the default with a warning.

use cert_core::BackendKind;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

/// Default ledger gateway
pub const DEFAULT_LEDGER_URL: &str = "http://127.0.0.1:7080";

/// Default per-call timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Ledger connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Gateway base URL
    #[serde(default = "default_ledger_url")]
    pub url: String,
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Re-read every record after create/update
    #[serde(default = "default_confirm_writes")]
    pub confirm_writes: bool,
}

fn default_ledger_url() -> String {
    DEFAULT_LEDGER_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_confirm_writes() -> bool {
    true
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LEDGER_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            confirm_writes: true,
        }
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - CERT_LEDGER_URL: gateway base URL
    /// - CERT_LEDGER_TIMEOUT_MS: per-call timeout
    /// - CERT_LEDGER_CONFIRM_WRITES: true/false
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("CERT_LEDGER_URL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.url),
            timeout_ms: parse_or_default(
                lookup,
                "CERT_LEDGER_TIMEOUT_MS",
                defaults.timeout_ms,
                |s| s.parse().ok().filter(|ms| *ms > 0),
            ),
            confirm_writes: parse_or_default(
                lookup,
                "CERT_LEDGER_CONFIRM_WRITES",
                defaults.confirm_writes,
                parse_bool,
            ),
        }
    }
}

/// Certificate service configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Record store backend
    #[serde(default)]
    pub backend: BackendKind,
    /// Used when `backend` is `ledger`
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Seed the sample certificates into a local store
    #[serde(default)]
    pub seed_samples: bool,
    /// Health check interval in seconds, 0 disables the monitor
    #[serde(default)]
    pub health_monitor_secs: u64,
}

impl ServiceConfig {
    /// Local backend with defaults
    pub fn local() -> Self {
        Self::default()
    }

    /// Ledger backend at `url`
    pub fn ledger(url: &str) -> Self {
        Self {
            backend: BackendKind::Ledger,
            ledger: LedgerConfig {
                url: url.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Check interval, if the monitor is enabled
    pub fn health_monitor_interval(&self) -> Option<Duration> {
        (self.health_monitor_secs > 0).then(|| Duration::from_secs(self.health_monitor_secs))
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - CERT_BACKEND: local/ledger (legacy USE_BLOCKCHAIN=true|false when unset)
    /// - CERT_SEED_SAMPLES: true/false
    /// - CERT_HEALTH_MONITOR_SECS: check interval, 0 = disabled
    /// - CERT_LEDGER_*: see [`LedgerConfig::from_env`]
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend = match lookup("CERT_BACKEND") {
            Some(raw) => BackendKind::parse(&raw).unwrap_or_else(|| {
                warn!(key = "CERT_BACKEND", value = %raw, "Invalid config value, using default");
                defaults.backend
            }),
            None => parse_or_default(lookup, "USE_BLOCKCHAIN", defaults.backend, |s| {
                parse_bool(s).map(|on| if on { BackendKind::Ledger } else { BackendKind::Local })
            }),
        };

        Self {
            backend,
            ledger: LedgerConfig::from_lookup(lookup),
            seed_samples: parse_or_default(
                lookup,
                "CERT_SEED_SAMPLES",
                defaults.seed_samples,
                parse_bool,
            ),
            health_monitor_secs: parse_or_default(
                lookup,
                "CERT_HEALTH_MONITOR_SECS",
                defaults.health_monitor_secs,
                |s| s.parse().ok(),
            ),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or_default<T>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => parse(raw.trim()).unwrap_or_else(|| {
            warn!(key, value = %raw, "Invalid config value, using default");
            default
        }),
    }
}
