//! Caller identity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// Permission class of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Implicitly allowed everything
    Admin,
    /// Issuing institution
    University,
    /// Third party checking credentials
    Verifier,
    /// Certificate holder, limited to own records
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::University => "university",
            Self::Verifier => "verifier",
            Self::Student => "student",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "university" => Some(Self::University),
            "verifier" => Some(Self::Verifier),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub role: Role,
    pub id: String,
}

impl Caller {
    pub fn new(role: Role, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
        }
    }

    /// Resolve a caller from the raw values handed over by the request layer.
    ///
    /// A missing or unknown role and an empty identity are both denials.
    pub fn resolve(role: Option<&str>, id: &str) -> LedgerResult<Self> {
        let raw = role.ok_or_else(|| LedgerError::access_denied("no role assigned"))?;
        let role = Role::parse(raw)
            .ok_or_else(|| LedgerError::access_denied(format!("unknown role '{}'", raw)))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(LedgerError::access_denied("caller identity is empty"));
        }
        Ok(Self::new(role, id))
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(Role::Admin, id)
    }

    pub fn university(id: impl Into<String>) -> Self {
        Self::new(Role::University, id)
    }

    pub fn verifier(id: impl Into<String>) -> Self {
        Self::new(Role::Verifier, id)
    }

    pub fn student(id: impl Into<String>) -> Self {
        Self::new(Role::Student, id)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("University"), Some(Role::University));
        assert_eq!(Role::parse(" student "), Some(Role::Student));
        assert_eq!(Role::parse("registrar"), None);
    }

    #[test]
    fn test_resolve_rejects_missing_or_unknown_role() {
        let err = Caller::resolve(None, "UNIV1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let err = Caller::resolve(Some("registrar"), "UNIV1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let err = Caller::resolve(Some("student"), "  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_resolve_accepts_known_role() {
        let caller = Caller::resolve(Some("verifier"), "ACME").unwrap();
        assert_eq!(caller, Caller::verifier("ACME"));
        assert_eq!(caller.to_string(), "verifier:ACME");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::University).unwrap();
        assert_eq!(json, "\"university\"");
    }
}
