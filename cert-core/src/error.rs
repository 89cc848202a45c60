//! Error types for the certificate ledger
//!
//! One taxonomy is shared by both backends and the service so that a
//! failure keeps its kind from the point it is raised to the boundary.

use thiserror::Error;

/// Ledger operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Certificate not found: {0}")]
    NotFound(String),

    /// Raised by a record store when the key is already live
    #[error("Certificate already exists: {0}")]
    AlreadyExists(String),

    /// Raised by the service for a create collision
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    AccessDenied,
    NotFound,
    AlreadyExists,
    Conflict,
    Connectivity,
    Serialization,
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Stable error code for the request layer
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::AccessDenied => "ACCESS_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Connectivity => "CONNECTIVITY_FAILURE",
            ErrorKind::Serialization => "SERIALIZATION_ERROR",
        }
    }

    /// Whether a caller may repeat the failed call if it was a read.
    ///
    /// Mutations are never retried automatically: a timed-out submit may
    /// already be committed on the ledger.
    pub fn is_retryable_read(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Turn a store-level collision into the service-level conflict
    pub fn into_conflict(self) -> Self {
        match self {
            Self::AlreadyExists(id) => Self::Conflict(format!(
                "certificate {} already exists, choose a new id",
                id
            )),
            other => other,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(LedgerError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(LedgerError::access_denied("x").code(), "ACCESS_DENIED");
        assert_eq!(LedgerError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(LedgerError::connectivity("x").code(), "CONNECTIVITY_FAILURE");
        assert_eq!(LedgerError::serialization("x").code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_into_conflict_only_maps_collisions() {
        let err = LedgerError::AlreadyExists("CERT1".to_string()).into_conflict();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("CERT1"));

        let err = LedgerError::not_found("CERT1").into_conflict();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(LedgerError::connectivity("timeout").is_retryable_read());
        assert!(!LedgerError::serialization("bad json").is_retryable_read());
        assert!(!LedgerError::access_denied("student").is_retryable_read());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: LedgerError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
