//! Application layer error types

use crate::domain::DomainError;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Vulnerability index error: {0}")]
    Index(#[from] IndexError),

    #[error("Authorization failed: {reason}")]
    Authorization { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Background task failed: {message}")]
    Task { message: String },
}

/// Coarse classification of failures reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientInput,
    Authorization,
    ResourceExhaustion,
    TransientStore,
    DataIntegrity,
    Internal,
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::Domain(_) | ApplicationError::Parse(_) => ErrorKind::ClientInput,
            ApplicationError::Authorization { .. } => ErrorKind::Authorization,
            ApplicationError::Store(store_error) => store_error.kind(),
            ApplicationError::Index(_)
            | ApplicationError::Configuration { .. }
            | ApplicationError::Task { .. } => ErrorKind::Internal,
        }
    }

    /// Get the error type as a string for API responses
    pub fn error_type(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ClientInput => "client_input_error",
            ErrorKind::Authorization => "authorization_error",
            ErrorKind::ResourceExhaustion => "resource_exhaustion",
            ErrorKind::TransientStore => "transient_store_error",
            ErrorKind::DataIntegrity => "data_integrity_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: expected {expected}")]
    InvalidField { field: String, expected: String },

    #[error("Invalid record: {0}")]
    Record(#[from] DomainError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection-level failure; the only retryable kind
    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Circuit breaker open, store calls suspended for another {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    #[error("Timed out after {waited_ms}ms waiting for a pooled connection")]
    PoolTimeout { waited_ms: u64 },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Constraint violation: {message}")]
    Integrity { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Invalid storage configuration: {message}")]
    Configuration { message: String },
}

impl StoreError {
    /// Whether a whole submit may be retried after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connection { .. } | StoreError::CircuitOpen { .. } => {
                ErrorKind::TransientStore
            }
            StoreError::PoolTimeout { .. } => ErrorKind::ResourceExhaustion,
            StoreError::Integrity { .. } => ErrorKind::DataIntegrity,
            StoreError::PoolClosed | StoreError::Query { .. } | StoreError::Configuration { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Feed returned HTTP {status}")]
    Http { status: u16 },

    #[error("Invalid feed document: {message}")]
    Format { message: String },

    #[error("Feed contained no advisories")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(
            StoreError::Connection {
                message: "reset".into()
            }
            .is_transient()
        );
        assert!(!StoreError::CircuitOpen { retry_after_ms: 10 }.is_transient());
        assert!(!StoreError::PoolTimeout { waited_ms: 10 }.is_transient());
        assert!(
            !StoreError::Integrity {
                message: "duplicate key".into()
            }
            .is_transient()
        );
        assert!(
            !StoreError::Query {
                message: "syntax".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_error_kinds() {
        let parse = ApplicationError::Parse(ParseError::MissingField {
            field: "components".into(),
        });
        assert_eq!(parse.kind(), ErrorKind::ClientInput);
        assert_eq!(parse.error_type(), "client_input_error");

        let auth = ApplicationError::Authorization {
            reason: "denied".into(),
        };
        assert_eq!(auth.kind(), ErrorKind::Authorization);

        let exhausted = ApplicationError::Store(StoreError::PoolTimeout { waited_ms: 30_000 });
        assert_eq!(exhausted.kind(), ErrorKind::ResourceExhaustion);

        let integrity = ApplicationError::Store(StoreError::Integrity {
            message: "duplicate".into(),
        });
        assert_eq!(integrity.error_type(), "data_integrity_error");

        let open = ApplicationError::Store(StoreError::CircuitOpen { retry_after_ms: 5 });
        assert_eq!(open.kind(), ErrorKind::TransientStore);
    }
}
