//! Session validator clients

use super::traits::{SessionCredential, SessionValidator};
use crate::application::errors::ApplicationError;
use crate::config::AuthConfig;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, COOKIE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Asks the session service whether the forwarded credentials are valid.
///
/// Any answer other than `200 OK` is a rejection, and so is a service that
/// cannot be reached.
pub struct HttpSessionValidator {
    client: Client,
    url: String,
}

impl HttpSessionValidator {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApplicationError::Configuration {
                message: format!("failed to create validator HTTP client: {}", e),
            })?;

        Ok(Self { client, url })
    }
}

fn rejected(reason: impl Into<String>) -> ApplicationError {
    ApplicationError::Authorization {
        reason: reason.into(),
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn validate(&self, credential: &SessionCredential) -> Result<(), ApplicationError> {
        if credential.is_empty() {
            return Err(rejected("no session credentials supplied"));
        }

        let mut request = self.client.get(&self.url);
        if let Some(cookie) = &credential.cookie {
            request = request.header(COOKIE, cookie);
        }
        if let Some(authorization) = &credential.authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Session validator unreachable");
            rejected("session validator unreachable")
        })?;

        if response.status() != reqwest::StatusCode::OK {
            debug!(status = response.status().as_u16(), "Session rejected");
            return Err(rejected(format!(
                "session rejected with HTTP {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

/// Accepts every caller; selected when authorization is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllValidator;

#[async_trait]
impl SessionValidator for AllowAllValidator {
    async fn validate(&self, _credential: &SessionCredential) -> Result<(), ApplicationError> {
        Ok(())
    }
}

/// Build the validator for the configured auth mode
pub fn build_validator(config: &AuthConfig) -> Result<Arc<dyn SessionValidator>, ApplicationError> {
    if !config.enabled {
        warn!("Session validation is disabled; every request is allowed to write");
        return Ok(Arc::new(AllowAllValidator));
    }

    Ok(Arc::new(HttpSessionValidator::new(
        config.validator_url.clone(),
        Duration::from_secs(config.timeout_seconds),
    )?))
}
