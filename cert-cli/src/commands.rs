//! Command handlers for the CLI

use cert_core::{Caller, FieldMap, LedgerError, LedgerResult};
use cert_db::CertificateService;
use clap::Subcommand;
use serde_json::Value;

pub type CmdResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue a certificate
    Create {
        /// Field as key=value (id, studentId, studentName, course, grade, issuedAt)
        #[arg(short = 'f', long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Show one certificate
    Get {
        /// Certificate ID
        id: String,
    },

    /// List certificates
    List {
        /// Only certificates of this student
        #[arg(short, long)]
        student: Option<String>,
    },

    /// Change mutable fields of a certificate
    Update {
        /// Certificate ID
        id: String,
        /// Field as key=value (studentName, course, grade, issuedAt)
        #[arg(short = 'f', long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Delete a certificate; its history is kept
    Delete {
        /// Certificate ID
        id: String,
    },

    /// Check presented fields against the stored certificate
    Verify {
        /// Certificate ID
        id: String,
        /// Expected field as key=value
        #[arg(short = 'f', long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Show the audit trail of a certificate
    History {
        /// Certificate ID
        id: String,
    },

    /// Seed the sample certificates (admin only)
    Init,

    /// Show backend health
    Health,

    /// Start an interactive session
    Shell,
}

/// Who the CLI acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Option<String>,
    pub id: String,
}

impl Identity {
    pub fn new(role: Option<String>, id: Option<String>) -> Self {
        Self {
            role,
            id: id.unwrap_or_default(),
        }
    }

    pub fn caller(&self) -> LedgerResult<Caller> {
        Caller::resolve(self.role.as_deref(), &self.id)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.role, self.id.is_empty()) {
            (Some(role), false) => write!(f, "{}:{}", role, self.id),
            (Some(role), true) => write!(f, "{}:<no id>", role),
            (None, _) => f.write_str("<anonymous>"),
        }
    }
}

/// Parse `key=value`
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// Collect `-f` pairs; a key given twice is rejected
fn field_map(fields: Vec<(String, String)>) -> LedgerResult<FieldMap> {
    let mut map = FieldMap::new();
    for (key, value) in fields {
        if map.contains_key(&key) {
            return Err(LedgerError::validation(format!(
                "field \"{}\" given more than once",
                key
            )));
        }
        map.insert(key, value);
    }
    Ok(map)
}

/// Run one command against the service, returning its JSON output
pub async fn execute(
    service: &CertificateService,
    identity: &Identity,
    command: Command,
) -> CmdResult<Value> {
    let output = match command {
        Command::Create { fields } => {
            let caller = identity.caller()?;
            let record = service
                .create_certificate(&field_map(fields)?, &caller)
                .await?;
            serde_json::to_value(record)?
        }
        Command::Get { id } => {
            let record = service.get_certificate(&id, &identity.caller()?).await?;
            serde_json::to_value(record)?
        }
        Command::List { student } => {
            let caller = identity.caller()?;
            let records = match student {
                Some(student_id) => {
                    service
                        .get_certificates_by_student(&student_id, &caller)
                        .await?
                }
                None => service.get_all_certificates(&caller).await?,
            };
            serde_json::to_value(records)?
        }
        Command::Update { id, fields } => {
            let caller = identity.caller()?;
            let record = service
                .update_certificate(&id, &field_map(fields)?, &caller)
                .await?;
            serde_json::to_value(record)?
        }
        Command::Delete { id } => {
            let record = service.delete_certificate(&id, &identity.caller()?).await?;
            serde_json::to_value(record)?
        }
        Command::Verify { id, fields } => {
            let caller = identity.caller()?;
            let result = service
                .verify_certificate(&id, &field_map(fields)?, &caller)
                .await?;
            serde_json::to_value(result)?
        }
        Command::History { id } => {
            let history = service
                .get_certificate_history(&id, &identity.caller()?)
                .await?;
            serde_json::to_value(history)?
        }
        Command::Init => {
            let created = service.init_ledger(&identity.caller()?).await?;
            serde_json::to_value(created)?
        }
        Command::Health => serde_json::to_value(service.health().await?)?,
        Command::Shell => return Err("already in an interactive session".into()),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cert_db::LocalStore;
    use std::sync::Arc;

    fn service() -> CertificateService {
        CertificateService::new(Arc::new(LocalStore::new()))
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("grade=A").unwrap(),
            ("grade".to_string(), "A".to_string())
        );
        assert_eq!(
            parse_field("studentName=Alice = Johnson").unwrap().1,
            "Alice = Johnson"
        );
        assert!(parse_field("grade").is_err());
        assert!(parse_field("=A").is_err());
    }

    #[test]
    fn test_field_map_rejects_repeated_key() {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());

        let map = field_map(vec![pair("grade", "A"), pair("course", "CS")]).unwrap();
        assert_eq!(map.len(), 2);

        let err = field_map(vec![pair("grade", "A"), pair("grade", "B")]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("grade"));
    }

    #[tokio::test]
    async fn test_execute_update_with_repeated_field_changes_nothing() {
        let svc = service();
        let admin = Identity::new(Some("admin".to_string()), Some("ADMIN1".to_string()));
        execute(&svc, &admin, Command::Init).await.unwrap();

        let err = execute(
            &svc,
            &admin,
            Command::Update {
                id: "CERT1".to_string(),
                fields: vec![
                    ("grade".to_string(), "A".to_string()),
                    ("grade".to_string(), "F".to_string()),
                ],
            },
        )
        .await
        .unwrap_err();
        let ledger_err = err.downcast_ref::<cert_core::LedgerError>().unwrap();
        assert_eq!(ledger_err.code(), "VALIDATION_ERROR");

        let fetched = execute(&svc, &admin, Command::Get { id: "CERT1".to_string() })
            .await
            .unwrap();
        assert_eq!(fetched["grade"], "A");
    }

    #[test]
    fn test_identity_display() {
        let identity = Identity::new(Some("student".to_string()), Some("STU001".to_string()));
        assert_eq!(identity.to_string(), "student:STU001");
        assert!(identity.caller().is_ok());

        let anonymous = Identity::new(None, None);
        assert_eq!(anonymous.to_string(), "<anonymous>");
        assert!(anonymous.caller().is_err());
    }

    #[tokio::test]
    async fn test_execute_create_and_get() {
        let svc = service();
        let univ = Identity::new(Some("university".to_string()), Some("UNIV1".to_string()));

        let created = execute(
            &svc,
            &univ,
            Command::Create {
                fields: vec![
                    ("id".to_string(), "CERT1".to_string()),
                    ("studentId".to_string(), "STU001".to_string()),
                    ("studentName".to_string(), "Alice Johnson".to_string()),
                    ("course".to_string(), "Blockchain Development".to_string()),
                    ("grade".to_string(), "A".to_string()),
                    ("issuedAt".to_string(), "2025-01-15".to_string()),
                ],
            },
        )
        .await
        .unwrap();
        assert_eq!(created["issuedBy"], "UNIV1");

        let fetched = execute(&svc, &univ, Command::Get { id: "CERT1".to_string() })
            .await
            .unwrap();
        assert_eq!(fetched["studentId"], "STU001");
    }

    #[tokio::test]
    async fn test_health_needs_no_caller() {
        let svc = service();
        let output = execute(&svc, &Identity::new(None, None), Command::Health)
            .await
            .unwrap();
        assert_eq!(output["available"], true);
        assert_eq!(output["backend"], "local");
    }

    #[tokio::test]
    async fn test_missing_role_is_denied() {
        let svc = service();
        let err = execute(&svc, &Identity::new(None, None), Command::Init)
            .await
            .unwrap_err();
        let ledger_err = err.downcast_ref::<cert_core::LedgerError>().unwrap();
        assert_eq!(ledger_err.code(), "ACCESS_DENIED");
    }
}
