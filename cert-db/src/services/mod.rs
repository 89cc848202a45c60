//! Certificate services
//!
//! Business logic over a [`RecordStore`](cert_core::RecordStore), plus the
//! optional background health monitor.

pub mod certificate_service;
pub mod health_monitor;

pub use certificate_service::{generate_certificate_id, CertificateService, SYSTEM_ACTOR};
pub use health_monitor::HealthMonitor;
