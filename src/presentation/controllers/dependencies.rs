//! Dependency upload controller

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::Json,
};

use crate::application::errors::ApplicationError;
use crate::domain::{ComponentId, DependencyType, DomainError};
use crate::infrastructure::SessionCredential;
use crate::presentation::controllers::AppState;
use crate::presentation::models::{DeleteResponse, DependencyQuery, UpdateResponse};

fn invalid(field: &str, message: impl Into<String>) -> ApplicationError {
    ApplicationError::Domain(DomainError::InvalidInput {
        field: field.to_string(),
        message: message.into(),
    })
}

fn component_id(query: &DependencyQuery) -> Result<ComponentId, ApplicationError> {
    let raw = query
        .compid
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("compid", "query parameter is required"))?;

    let id = raw
        .parse::<i64>()
        .map_err(|_| invalid("compid", format!("'{}' is not an integer", raw)))?;

    Ok(ComponentId::new(id)?)
}

fn dependency_type(query: &DependencyQuery) -> Result<Option<DependencyType>, ApplicationError> {
    match query.deptype.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Ok(Some(value.parse()?)),
    }
}

fn credential(headers: &HeaderMap) -> SessionCredential {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    SessionCredential::new(text(header::COOKIE), text(header::AUTHORIZATION))
}

/// Replace a component's generation with the uploaded report
pub async fn ingest_dependencies(
    State(app_state): State<AppState>,
    Query(query): Query<DependencyQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UpdateResponse>, ApplicationError> {
    let component_id = component_id(&query)?;
    let dependency_type =
        dependency_type(&query)?.ok_or_else(|| invalid("deptype", "query parameter is required"))?;

    let outcome = app_state
        .dependency_service
        .ingest(&credential(&headers), component_id, dependency_type, &body)
        .await?;

    Ok(Json(UpdateResponse {
        message: "components updated successfully".to_string(),
        component_id: outcome.component_id.value(),
        dependency_type: outcome.dependency_type.to_string(),
        count: outcome.count,
    }))
}

/// Delete a component's records, one generation or all of them
pub async fn clear_dependencies(
    State(app_state): State<AppState>,
    Query(query): Query<DependencyQuery>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, ApplicationError> {
    let component_id = component_id(&query)?;
    let dependency_type = dependency_type(&query)?;

    let outcome = app_state
        .dependency_service
        .clear(&credential(&headers), component_id, dependency_type)
        .await?;

    Ok(Json(DeleteResponse {
        message: format!("comp id {} deleted", outcome.component_id),
        component_id: outcome.component_id.value(),
        count: outcome.count,
    }))
}
