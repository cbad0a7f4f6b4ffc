//! Domain-specific error types

use thiserror::Error;

/// Domain-level validation errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid dependency type: {value} (expected license or cve)")]
    InvalidDependencyType { value: String },

    #[error("Invalid input for field {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error(
        "Record for {package} belongs to component {found_component}/{found_type}, expected {expected_component}/{expected_type}"
    )]
    GenerationMismatch {
        package: String,
        expected_component: i64,
        expected_type: String,
        found_component: i64,
        found_type: String,
    },
}
