//! Certificate Ledger Core
//!
//! Core types and contracts for issuing, storing and verifying academic
//! certificates with a permanent per-record audit trail:
//! - [`types`]: records, history entries, callers, verification results
//! - [`access`]: role-based authorization
//! - [`ledger`]: the [`RecordStore`] contract shared by every backend and the
//!   append-only [`HistoryLog`]
//! - [`validation`]: input checks run before any backend call
//! - [`logging`]: field conventions and subscriber setup
//!
//! Backends and the certificate service live in `cert-db`.

pub mod access;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod types;
pub mod validation;

pub use access::{AccessPolicy, Operation};
pub use error::*;
pub use ledger::{HistoryLog, RecordScan, RecordStore, ScanFilter, ScanItem};
pub use types::*;
