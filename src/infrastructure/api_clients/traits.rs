//! Traits for external HTTP collaborators

use crate::application::errors::{ApplicationError, IndexError};
use async_trait::async_trait;

/// Session material forwarded to the validator service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredential {
    pub cookie: Option<String>,
    pub authorization: Option<String>,
}

impl SessionCredential {
    pub fn new(cookie: Option<String>, authorization: Option<String>) -> Self {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            cookie: non_blank(cookie),
            authorization: non_blank(authorization),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookie.is_none() && self.authorization.is_none()
    }
}

/// Source of the vulnerability reference feed document
#[async_trait]
pub trait AdvisoryFeed: Send + Sync {
    async fn fetch(&self) -> Result<serde_json::Value, IndexError>;
}

/// Gate deciding whether a caller may write dependency data
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, credential: &SessionCredential) -> Result<(), ApplicationError>;
}
