//! Certificate Service
//!
//! Entry point for every certificate operation. Each call authorizes the
//! caller, validates input, then delegates to the configured
//! [`RecordStore`]. The service never knows which backend it talks to.

use cert_core::logging::operations;
use cert_core::validation::{validate_id, validate_new_certificate, validate_patch};
use cert_core::{
    field, now_seconds, parse_timestamp, AccessPolicy, BackendKind, Caller, CertificateRecord,
    FieldMap, HealthStatus, HistoryEntry, LedgerError, LedgerResult, NewCertificate, Operation,
    RecordStore, VerificationResult,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::ServiceConfig;

/// Identity used for work the service does on its own behalf
pub const SYSTEM_ACTOR: &str = "system";

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Certificate Service
pub struct CertificateService {
    store: Arc<dyn RecordStore>,
    policy: AccessPolicy,
}

impl CertificateService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            policy: AccessPolicy::new(),
        }
    }

    /// Build the configured backend and, if asked, seed the samples
    pub async fn from_config(config: &ServiceConfig) -> LedgerResult<Self> {
        let service = Self::new(crate::connect_store(config)?);

        if config.seed_samples {
            match service.backend() {
                BackendKind::Local => {
                    service.init_ledger(&Caller::admin(SYSTEM_ACTOR)).await?;
                }
                BackendKind::Ledger => {
                    warn!("Sample seeding only applies to the local backend, skipped");
                }
            }
        }
        Ok(service)
    }

    /// Backend in use, fixed at construction
    pub fn backend(&self) -> BackendKind {
        self.store.backend()
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    /// Issue a certificate
    #[instrument(skip(self, data, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn create_certificate(
        &self,
        data: &FieldMap,
        caller: &Caller,
    ) -> LedgerResult<CertificateRecord> {
        self.policy.authorize(caller, Operation::Create, None)?;
        let input = validate_new_certificate(data)?;
        self.issue(input, caller).await
    }

    async fn issue(&self, input: NewCertificate, caller: &Caller) -> LedgerResult<CertificateRecord> {
        let now = now_seconds();
        let id = match &input.id {
            Some(id) => id.clone(),
            None => generate_certificate_id(now),
        };
        let record = input.into_record(id.clone(), caller.id.clone(), caller.role, now);

        let stored = self
            .store
            .create(&id, record)
            .await
            .map_err(LedgerError::into_conflict)?;

        info!(
            cert_id = %stored.id,
            actor_id = %caller.id,
            operation = operations::CREATE,
            backend = %self.backend(),
            "Certificate created"
        );
        Ok(stored)
    }

    /// Read one certificate
    #[instrument(skip(self, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn get_certificate(&self, id: &str, caller: &Caller) -> LedgerResult<CertificateRecord> {
        let id = validate_id(id)?;
        self.policy.authorize(caller, Operation::Read, None)?;

        let record = self.store.get(&id).await?;
        self.policy.authorize(caller, Operation::Read, Some(&record))?;

        debug!(cert_id = %id, operation = operations::READ, "Certificate read");
        Ok(record)
    }

    /// Change the mutable fields of a certificate
    #[instrument(skip(self, patch, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn update_certificate(
        &self,
        id: &str,
        patch: &FieldMap,
        caller: &Caller,
    ) -> LedgerResult<CertificateRecord> {
        let id = validate_id(id)?;
        self.policy.authorize(caller, Operation::Update, None)?;
        let patch = validate_patch(patch)?;

        let updated = self.store.update(&id, patch, now_seconds()).await?;

        info!(
            cert_id = %id,
            actor_id = %caller.id,
            operation = operations::UPDATE,
            backend = %self.backend(),
            "Certificate updated"
        );
        Ok(updated)
    }

    /// Revoke a certificate; its history is kept
    #[instrument(skip(self, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn delete_certificate(&self, id: &str, caller: &Caller) -> LedgerResult<CertificateRecord> {
        let id = validate_id(id)?;
        self.policy.authorize(caller, Operation::Delete, None)?;

        let removed = self.store.delete(&id, now_seconds()).await?;

        info!(
            cert_id = %id,
            actor_id = %caller.id,
            operation = operations::DELETE,
            backend = %self.backend(),
            "Certificate deleted"
        );
        Ok(removed)
    }

    /// Check presented fields against the stored certificate.
    ///
    /// Keys are compared in ascending order and the first mismatch is
    /// reported by field name. A missing certificate is an invalid result,
    /// not an error.
    #[instrument(skip(self, expected, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn verify_certificate(
        &self,
        id: &str,
        expected: &FieldMap,
        caller: &Caller,
    ) -> LedgerResult<VerificationResult> {
        let id = validate_id(id)?;
        self.policy.authorize(caller, Operation::Verify, None)?;

        let verified_at = now_seconds();
        let record = match self.store.get(&id).await {
            Ok(record) => record,
            Err(LedgerError::NotFound(_)) => {
                debug!(cert_id = %id, operation = operations::VERIFY, "Certificate to verify not found");
                return Ok(VerificationResult::not_found(caller, verified_at));
            }
            Err(e) => return Err(e),
        };
        self.policy.authorize(caller, Operation::Verify, Some(&record))?;

        let result = match first_mismatch(&record, expected) {
            Some(field_name) => VerificationResult::invalid(field_name, caller, verified_at),
            None => VerificationResult::valid(record, caller, verified_at),
        };

        info!(
            cert_id = %id,
            actor_id = %caller.id,
            operation = operations::VERIFY,
            valid = result.valid,
            "Certificate verified"
        );
        Ok(result)
    }

    /// Every certificate the caller may see
    #[instrument(skip(self, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn get_all_certificates(&self, caller: &Caller) -> LedgerResult<Vec<CertificateRecord>> {
        self.policy.authorize(caller, Operation::ReadAll, None)?;

        let filter = self.policy.scan_filter(caller);
        let records = self
            .store
            .scan_all(&filter)
            .await?
            .retain(|record| self.policy.can_list(caller, record))
            .into_records();

        debug!(count = records.len(), operation = operations::SCAN, "Certificates listed");
        Ok(records)
    }

    /// Certificates of one student, as far as the caller may see them
    #[instrument(skip(self, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn get_certificates_by_student(
        &self,
        student_id: &str,
        caller: &Caller,
    ) -> LedgerResult<Vec<CertificateRecord>> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(LedgerError::validation("\"studentId\" is not allowed to be empty"));
        }
        self.policy.authorize(caller, Operation::ReadAll, None)?;

        let filter = match self.policy.scan_filter(caller).and_student(student_id) {
            Some(filter) => filter,
            None => {
                debug!(student_id, operation = operations::SCAN, "Listing outside caller scope");
                return Ok(Vec::new());
            }
        };

        let records = self
            .store
            .scan_all(&filter)
            .await?
            .retain(|record| record.belongs_to(student_id) && self.policy.can_list(caller, record))
            .into_records();

        debug!(count = records.len(), operation = operations::SCAN, "Certificates listed");
        Ok(records)
    }

    /// Audit trail of one certificate, including deleted ones
    #[instrument(skip(self, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn get_certificate_history(
        &self,
        id: &str,
        caller: &Caller,
    ) -> LedgerResult<Vec<HistoryEntry>> {
        let id = validate_id(id)?;
        self.policy.authorize(caller, Operation::ReadHistory, None)?;

        let entries = self.store.history(&id).await?;
        let entries = self.policy.filter_history(caller, &id, entries)?;

        debug!(cert_id = %id, count = entries.len(), operation = operations::HISTORY, "History read");
        Ok(entries)
    }

    /// Seed the sample certificates; ids already present are skipped
    #[instrument(skip(self, caller), fields(actor_id = %caller.id, role = %caller.role))]
    pub async fn init_ledger(&self, caller: &Caller) -> LedgerResult<Vec<CertificateRecord>> {
        self.policy.authorize(caller, Operation::InitLedger, None)?;

        let mut created = Vec::new();
        for sample in sample_certificates() {
            let id = sample.id.clone().unwrap_or_default();
            match self.store.get(&id).await {
                Ok(_) => {
                    debug!(cert_id = %id, "Sample already present");
                    continue;
                }
                Err(LedgerError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }

            match self.issue(sample, caller).await {
                Ok(record) => created.push(record),
                Err(LedgerError::Conflict(_)) => debug!(cert_id = %id, "Sample created concurrently"),
                Err(e) => return Err(e),
            }
        }

        info!(
            count = created.len(),
            actor_id = %caller.id,
            operation = operations::INIT_LEDGER,
            backend = %self.backend(),
            "Ledger initialized"
        );
        Ok(created)
    }

    /// Backend health
    pub async fn health(&self) -> LedgerResult<HealthStatus> {
        self.store.health().await
    }
}

/// `CERT_<base36 millis>_<5 random base36>`, uppercase
pub fn generate_certificate_id(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("CERT_{}_{}", to_base36(millis), suffix)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// First expected field, in key order, that differs from the record
fn first_mismatch<'a>(record: &CertificateRecord, expected: &'a FieldMap) -> Option<&'a str> {
    expected
        .iter()
        .find(|(name, value)| !field_matches(record, name, value))
        .map(|(name, _)| name.as_str())
}

fn field_matches(record: &CertificateRecord, name: &str, expected: &str) -> bool {
    let Some(actual) = record.field(name) else {
        return false;
    };
    if field::TIMESTAMPS.contains(&name) {
        if let (Some(a), Some(e)) = (parse_timestamp(&actual), parse_timestamp(expected)) {
            return a == e;
        }
    }
    actual == expected
}

fn sample_certificates() -> Vec<NewCertificate> {
    let sample = |id: &str, student_id: &str, name: &str, course: &str, grade: &str, issued: &str| {
        NewCertificate {
            id: Some(id.to_string()),
            student_id: student_id.to_string(),
            student_name: name.to_string(),
            course: course.to_string(),
            grade: grade.to_string(),
            issued_at: parse_timestamp(issued).unwrap_or_default(),
        }
    };

    vec![
        sample("CERT1", "STU001", "Alice Johnson", "Blockchain Development", "A", "2025-01-15"),
        sample("CERT2", "STU002", "Bob Smith", "Data Science", "B", "2025-01-20"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalStore;
    use cert_core::{ErrorKind, Role};

    fn service() -> CertificateService {
        CertificateService::new(Arc::new(LocalStore::new()))
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_generated_id_shape() {
        let now = parse_timestamp("2025-01-15T00:00:00Z").unwrap();
        let id = generate_certificate_id(now);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CERT");
        assert_eq!(parts[1], to_base36(now.timestamp_millis() as u64));
        assert_eq!(parts[2].len(), 5);
        assert_eq!(id, id.to_uppercase());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_736_899_200_000), "M5X4XS00");
    }

    #[test]
    fn test_timestamp_fields_compare_as_instants() {
        let ts = parse_timestamp("2025-01-15").unwrap();
        let record = CertificateRecord {
            id: "CERT1".to_string(),
            student_id: "STU001".to_string(),
            student_name: "Alice".to_string(),
            course: "CS".to_string(),
            grade: "A".to_string(),
            issued_at: ts,
            created_at: ts,
            last_modified: ts,
            issued_by: "UNIV1".to_string(),
            issuer_role: Role::University,
        };

        assert!(field_matches(&record, "issuedAt", "2025-01-15"));
        assert!(field_matches(&record, "issuedAt", "2025-01-15T02:00:00+02:00"));
        assert!(!field_matches(&record, "issuedAt", "2025-01-16"));
        assert!(!field_matches(&record, "grade", "a"));
        assert!(!field_matches(&record, "signature", "x"));
    }

    #[tokio::test]
    async fn test_create_generates_id_and_stamps_issuer() {
        let svc = service();
        let record = svc
            .create_certificate(
                &fields(&[
                    ("studentId", "STU001"),
                    ("studentName", "Alice Johnson"),
                    ("course", "Blockchain Development"),
                    ("grade", "A"),
                    ("issuedAt", "2025-01-15"),
                ]),
                &Caller::university("UNIV1"),
            )
            .await
            .unwrap();

        assert!(record.id.starts_with("CERT_"));
        assert_eq!(record.issued_by, "UNIV1");
        assert_eq!(record.issuer_role, Role::University);
        assert_eq!(record.created_at, record.last_modified);
    }

    #[tokio::test]
    async fn test_denied_create_touches_nothing() {
        let svc = service();
        let err = svc
            .create_certificate(
                &fields(&[
                    ("id", "CERT9"),
                    ("studentId", "STU001"),
                    ("studentName", "Alice"),
                    ("course", "CS"),
                    ("grade", "A"),
                    ("issuedAt", "2025-01-15"),
                ]),
                &Caller::verifier("VER1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert!(svc.store().history("CERT9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_ledger_is_admin_only_and_idempotent() {
        let svc = service();
        let err = svc
            .init_ledger(&Caller::university("UNIV1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let admin = Caller::admin("ADMIN1");
        let created = svc.init_ledger(&admin).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].id, "CERT1");
        assert_eq!(created[1].student_name, "Bob Smith");

        assert!(svc.init_ledger(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_student_listing_other_student_is_empty() {
        let svc = service();
        svc.init_ledger(&Caller::admin("ADMIN1")).await.unwrap();

        let student = Caller::student("STU001");
        let own = svc.get_certificates_by_student("STU001", &student).await.unwrap();
        assert_eq!(own.len(), 1);
        let other = svc.get_certificates_by_student("STU002", &student).await.unwrap();
        assert!(other.is_empty());

        let all = svc.get_all_certificates(&student).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "CERT1");
    }

    #[tokio::test]
    async fn test_from_config_seeds_local_store() {
        let config = ServiceConfig {
            seed_samples: true,
            ..ServiceConfig::local()
        };
        let svc = CertificateService::from_config(&config).await.unwrap();
        assert_eq!(svc.backend(), BackendKind::Local);
        let all = svc.get_all_certificates(&Caller::admin("ADMIN1")).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
