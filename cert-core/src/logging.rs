//! Logging Standards and Subscriber Setup
//!
//! All crates log through `tracing` with structured fields. The binary
//! installs the subscriber once with [`init_logging`].
//!
//! # Log Levels
//!
//! | Level | Usage | Examples |
//! |-------|-------|----------|
//! | ERROR | Unreadable payloads, unconfirmed writes | Ledger returned invalid JSON |
//! | WARN  | Denials, degraded backend | Access denied, health check failed |
//! | INFO  | Completed mutations | Certificate created, deleted |
//! | DEBUG | Reads and routing | Scan filter applied, transport call |
//! | TRACE | Full payloads | Transport request/response bodies |
//!
//! # Fields
//!
//! `cert_id`, `actor_id`, `operation` (one of [`operations`]), `backend`,
//! `function`, `duration_ms`, `error`, `count`, `status`.
//!
//! # Examples
//!
//! ```ignore
//! use tracing::info;
//!
//! info!(
//!     cert_id = %record.id,
//!     actor_id = %caller.id,
//!     operation = operations::CREATE,
//!     backend = %store.backend(),
//!     "Certificate created"
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Operation names used in the `operation` field
pub mod operations {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const SCAN: &str = "scan";
    pub const HISTORY: &str = "history";
    pub const VERIFY: &str = "verify";
    pub const INIT_LEDGER: &str = "init_ledger";

    pub const SUBMIT: &str = "submit";
    pub const EVALUATE: &str = "evaluate";
    pub const CONFIRM_WRITE: &str = "confirm_write";

    pub const ACCESS_DENY: &str = "access_deny";
    pub const HEALTH_CHECK: &str = "health_check";
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, for development
    Pretty,
    /// One JSON object per line, for production
    Json,
    /// Single-line text
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Compact
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include source file/line
    pub include_source: bool,
    /// Explicit filter (e.g. `cert_db=debug,reqwest=warn`), overrides `level`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            include_source: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Load from environment variables
    ///
    /// - CERT_LOG_LEVEL: error/warn/info/debug/trace
    /// - CERT_LOG_FORMAT: pretty/json/compact
    /// - CERT_LOG_FILTER: full `EnvFilter` directive
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("CERT_LOG_LEVEL")
                .ok()
                .and_then(|s| LogLevel::parse(&s))
                .unwrap_or(defaults.level),
            format: env::var("CERT_LOG_FORMAT")
                .ok()
                .and_then(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            include_source: env::var("CERT_LOG_SOURCE")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.include_source),
            filter: env::var("CERT_LOG_FILTER").ok().filter(|s| !s.trim().is_empty()),
        }
    }

    /// Filter directive for this configuration
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(f) => f.clone(),
            None => format!(
                "cert_core={level},cert_db={level},certctl={level},warn",
                level = self.level
            ),
        }
    }
}

/// Install the global subscriber. Logs go to stderr.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(config.directive())?;

    match config.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_directive_defaults_to_crate_targets() {
        let config = LogConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };
        assert_eq!(
            config.directive(),
            "cert_core=debug,cert_db=debug,certctl=debug,warn"
        );
        assert!(EnvFilter::try_new(config.directive()).is_ok());
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = LogConfig {
            filter: Some("cert_db=trace".to_string()),
            ..Default::default()
        };
        assert_eq!(config.directive(), "cert_db=trace");
    }
}
