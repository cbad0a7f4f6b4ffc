//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query parameters selecting the generation to write or clear
#[derive(Debug, Default, Deserialize)]
pub struct DependencyQuery {
    /// Component id; `comp_id` is accepted for older callers
    #[serde(alias = "comp_id")]
    pub compid: Option<String>,

    /// Report format discriminator (`license`, `sbom`, `cve`, `scan`, ...)
    pub deptype: Option<String>,
}

/// Response for a successful report upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub message: String,
    pub component_id: i64,
    pub dependency_type: String,
    /// Records now stored for the generation
    pub count: u64,
}

/// Response for a successful delete
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub component_id: i64,
    /// Records removed
    pub count: u64,
}

/// Error response model
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error context
    pub details: Option<serde_json::Value>,

    /// Request ID for tracking and debugging
    pub request_id: Uuid,

    /// Error occurrence timestamp
    pub timestamp: DateTime<Utc>,
}
