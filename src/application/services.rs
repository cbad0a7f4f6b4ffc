//! Application services for orchestrating dependency ingestion

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::errors::{ApplicationError, ParseError};
use crate::domain::{ComponentId, DependencyType, Generation};
use crate::infrastructure::{
    DependencyRepository, IndexHandle, ParseContext, ParserRegistry, SessionCredential,
    SessionValidator,
};

/// Result of replacing one generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub component_id: ComponentId,
    pub dependency_type: DependencyType,
    pub count: u64,
}

/// Result of clearing stored records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    pub component_id: ComponentId,
    pub dependency_type: Option<DependencyType>,
    pub count: u64,
}

/// Service for ingesting dependency reports
#[async_trait]
pub trait DependencyService: Send + Sync {
    /// Authorize, parse `body` with the parser for `dependency_type`, and
    /// replace the component's generation with the result
    async fn ingest(
        &self,
        credential: &SessionCredential,
        component_id: ComponentId,
        dependency_type: DependencyType,
        body: &[u8],
    ) -> Result<IngestOutcome, ApplicationError>;

    /// Authorize and delete one generation, or all of them with `None`
    async fn clear(
        &self,
        credential: &SessionCredential,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<ClearOutcome, ApplicationError>;
}

/// Service implementation wiring the validator, parsers, index and repository
pub struct DependencyServiceImpl {
    validator: Arc<dyn SessionValidator>,
    parsers: Arc<ParserRegistry>,
    index: IndexHandle,
    repository: Arc<dyn DependencyRepository>,
}

impl DependencyServiceImpl {
    pub fn new(
        validator: Arc<dyn SessionValidator>,
        parsers: Arc<ParserRegistry>,
        index: IndexHandle,
        repository: Arc<dyn DependencyRepository>,
    ) -> Self {
        Self {
            validator,
            parsers,
            index,
            repository,
        }
    }

    /// Parse a report into a validated generation without touching storage
    pub fn build_generation(
        &self,
        component_id: ComponentId,
        dependency_type: DependencyType,
        body: &[u8],
    ) -> Result<Generation, ApplicationError> {
        let parser =
            self.parsers
                .parser_for(dependency_type)
                .ok_or_else(|| ApplicationError::Configuration {
                    message: format!("no parser registered for {}", dependency_type),
                })?;

        let document: serde_json::Value = serde_json::from_slice(body).map_err(ParseError::from)?;

        // Hold one snapshot for the whole request
        let index = self.index.snapshot();
        let records = parser.parse(
            ParseContext {
                component_id,
                index: &index,
            },
            &document,
        )?;

        Ok(Generation::new(component_id, dependency_type, records)?)
    }
}

#[async_trait]
impl DependencyService for DependencyServiceImpl {
    async fn ingest(
        &self,
        credential: &SessionCredential,
        component_id: ComponentId,
        dependency_type: DependencyType,
        body: &[u8],
    ) -> Result<IngestOutcome, ApplicationError> {
        let started = Instant::now();
        self.validator.validate(credential).await?;

        let generation = self.build_generation(component_id, dependency_type, body)?;
        debug!(
            component_id = %component_id,
            dependency_type = %dependency_type,
            records = generation.len(),
            "Report parsed"
        );

        // A started write runs to completion even if the caller goes away
        let repository = self.repository.clone();
        let count = tokio::spawn(async move { repository.replace_generation(&generation).await })
            .await
            .map_err(|e| ApplicationError::Task {
                message: e.to_string(),
            })??;

        info!(
            component_id = %component_id,
            dependency_type = %dependency_type,
            count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dependency report ingested"
        );

        Ok(IngestOutcome {
            component_id,
            dependency_type,
            count,
        })
    }

    async fn clear(
        &self,
        credential: &SessionCredential,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<ClearOutcome, ApplicationError> {
        self.validator.validate(credential).await?;

        let repository = self.repository.clone();
        let count =
            tokio::spawn(async move { repository.clear(component_id, dependency_type).await })
                .await
                .map_err(|e| ApplicationError::Task {
                    message: e.to_string(),
                })??;

        info!(
            component_id = %component_id,
            dependency_type = dependency_type.map(|kind| kind.as_str()).unwrap_or("all"),
            count,
            "Dependency records cleared"
        );

        Ok(ClearOutcome {
            component_id,
            dependency_type,
            count,
        })
    }
}
