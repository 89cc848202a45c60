//! Certificate Ledger Backends and Service
//!
//! Implementations of the [`RecordStore`] contract and the service built on
//! top of them:
//! - [`LocalStore`]: in-process table, for development and tests
//! - [`LedgerStore`]: a distributed ledger reached through a [`Transport`]
//! - [`CertificateService`]: authorization, validation and delegation
//!
//! The backend is chosen once from [`ServiceConfig`]; business logic only
//! sees `Arc<dyn RecordStore>`.

pub mod config;
pub mod ledger_store;
pub mod local;
pub mod services;
pub mod transport;

pub use config::{LedgerConfig, ServiceConfig};
pub use ledger_store::LedgerStore;
pub use local::LocalStore;
pub use services::{CertificateService, HealthMonitor};
pub use transport::{HttpTransport, MockTransport, Transport};

use cert_core::{BackendKind, LedgerResult, RecordStore};
use std::sync::Arc;
use tracing::info;

/// Construct the record store selected by `config`
pub fn connect_store(config: &ServiceConfig) -> LedgerResult<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.backend {
        BackendKind::Local => Arc::new(LocalStore::new()),
        BackendKind::Ledger => {
            let transport = HttpTransport::new(&config.ledger.url, config.ledger.timeout())?;
            Arc::new(LedgerStore::from_config(Arc::new(transport), &config.ledger))
        }
    };

    info!(backend = %config.backend, "Record store ready");
    Ok(store)
}
