//! HTTP middleware for the web server

use axum::{
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

use crate::application::errors::{ApplicationError, ErrorKind, StoreError};
use crate::presentation::models::ErrorResponse;

tokio::task_local! {
    /// Id of the request being served, set by [`logging_middleware`]
    static REQUEST_ID: Uuid;
}

/// Id of the current request, or a fresh one outside the logging middleware
pub fn current_request_id() -> Uuid {
    REQUEST_ID.try_with(|id| *id).unwrap_or_else(|_| Uuid::new_v4())
}

/// HTTP status for each error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
        ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
        ErrorKind::ResourceExhaustion | ErrorKind::TransientStore => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::DataIntegrity => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error handling middleware
impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        let message = match kind {
            ErrorKind::ClientInput | ErrorKind::Authorization | ErrorKind::DataIntegrity => {
                self.to_string()
            }
            ErrorKind::ResourceExhaustion | ErrorKind::TransientStore => {
                "Dependency store temporarily unavailable, retry later".to_string()
            }
            ErrorKind::Internal => "An internal error occurred".to_string(),
        };

        let request_id = current_request_id();
        if kind == ErrorKind::Internal {
            tracing::error!(request_id = %request_id, error = %self, "Request failed");
        } else {
            tracing::warn!(
                request_id = %request_id,
                error = %self,
                error_type = self.error_type(),
                "Request rejected"
            );
        }

        let retry_after_secs = match &self {
            ApplicationError::Store(StoreError::CircuitOpen { retry_after_ms }) => {
                Some(retry_after_ms.div_ceil(1000).max(1))
            }
            _ => None,
        };

        // Store and internal failures stay in the logs
        let details = match kind {
            ErrorKind::ClientInput | ErrorKind::Authorization | ErrorKind::DataIntegrity => {
                Some(serde_json::json!({ "error": self.to_string() }))
            }
            ErrorKind::ResourceExhaustion | ErrorKind::TransientStore | ErrorKind::Internal => None,
        };

        let error_response = ErrorResponse {
            code: self.error_type().to_uppercase(),
            message,
            details,
            request_id,
            timestamp: Utc::now(),
        };

        let mut response = (status, Json(error_response)).into_response();
        if let Some(seconds) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Request logging middleware with timing and request ID
pub async fn logging_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Processing request"
    );

    let mut response = REQUEST_ID.scope(request_id, next.run(request)).await;
    let duration = start_time.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::ClientInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Authorization), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(ErrorKind::ResourceExhaustion),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(ErrorKind::DataIntegrity), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_circuit_open_sets_retry_after() {
        let response =
            ApplicationError::Store(StoreError::CircuitOpen { retry_after_ms: 2500 }).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_store_failures_omit_details() {
        for error in [
            ApplicationError::Store(StoreError::Query {
                message: "relation \"dm_componentdeps\" does not exist".to_string(),
            }),
            ApplicationError::Store(StoreError::Connection {
                message: "connection reset by 10.0.0.5:5432".to_string(),
            }),
        ] {
            let payload = body_of(error.into_response()).await;
            assert!(payload["details"].is_null());
            assert!(!payload.to_string().contains("dm_componentdeps"));
            assert!(!payload.to_string().contains("10.0.0.5"));
        }
    }

    #[tokio::test]
    async fn test_error_body_uses_scoped_request_id() {
        let request_id = Uuid::new_v4();
        let response = REQUEST_ID
            .scope(request_id, async {
                ApplicationError::Authorization {
                    reason: "missing session".to_string(),
                }
                .into_response()
            })
            .await;

        let payload = body_of(response).await;
        assert_eq!(payload["request_id"], request_id.to_string());
        assert_eq!(payload["details"]["error"], "Authorization failed: missing session");
    }

    #[test]
    fn test_client_input_response() {
        let response = ApplicationError::Domain(DomainError::InvalidDependencyType {
            value: "yaml".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
