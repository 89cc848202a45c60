//! HTTP ledger transport
//!
//! Talks to a ledger gateway exposing two endpoints:
//!
//! - `POST {base}/submit` for mutating calls
//! - `POST {base}/evaluate` for read-only calls
//!
//! Both take `{"function": .., "args": [..]}` and answer with the raw
//! function result. Non-success statuses map onto the error taxonomy:
//!
//! | Status | Error |
//! |--------|-------|
//! | 401, 403 | `AccessDenied` |
//! | 404 | `NotFound` |
//! | 409 | `AlreadyExists` |
//! | anything else | `Connectivity` |

use async_trait::async_trait;
use cert_core::logging::operations;
use cert_core::{LedgerError, LedgerResult};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::{Transport, TransportRequest};

/// HTTP-based ledger transport
pub struct HttpTransport {
    /// Base URL of the ledger gateway
    base_url: String,
    client: reqwest::Client,
    /// Per-request timeout
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::connectivity(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(&self, endpoint: &str, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = TransportRequest::new(function, args);
        let start = Instant::now();

        trace!(function, ?args, %url, "Ledger request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_failed(function, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_failed(function, e))?;

        debug!(
            function,
            operation = endpoint,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Ledger call finished"
        );

        if status.is_success() {
            trace!(function, body = %String::from_utf8_lossy(&bytes), "Ledger response");
            return Ok(bytes.to_vec());
        }

        let message = String::from_utf8_lossy(&bytes).trim().to_string();
        Err(status_error(status, function, message))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.call(operations::SUBMIT, function, args).await
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.call(operations::EVALUATE, function, args).await
    }
}

fn request_failed(function: &str, err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::connectivity(format!("{} timed out: {}", function, err))
    } else {
        LedgerError::connectivity(format!("{} request failed: {}", function, err))
    }
}

fn status_error(status: StatusCode, function: &str, message: String) -> LedgerError {
    let detail = if message.is_empty() {
        format!("{} returned status {}", function, status)
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LedgerError::AccessDenied(detail),
        StatusCode::NOT_FOUND => LedgerError::NotFound(detail),
        StatusCode::CONFLICT => LedgerError::AlreadyExists(detail),
        _ => LedgerError::Connectivity(format!("ledger status {}: {}", status.as_u16(), detail)),
    }
}
