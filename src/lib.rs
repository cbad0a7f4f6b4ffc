//! deppkg - component dependency ingestion service
//!
//! Normalizes SBOM license data and vulnerability scan reports into dependency
//! records and atomically replaces each component's stored generation. Laid
//! out in domain, application, infrastructure and presentation layers.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use config::Config;
pub use logging::init_tracing;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;

use application::DependencyServiceImpl;
use infrastructure::{
    AdvisoryFeed, DependencyRepository, FeedClient, IndexHandle, ParserRegistry,
    VulnerabilityIndex, api_clients::build_validator, repositories::build_repository,
};
use presentation::{AppState, create_router};

/// A wired application: the router plus the resources released at shutdown
pub struct App {
    pub router: Router,
    pub repository: Arc<dyn DependencyRepository>,
    refresh_task: Option<JoinHandle<()>>,
}

impl App {
    /// Stop the index refresh and close the store
    pub fn shutdown(self) {
        if let Some(task) = self.refresh_task {
            task.abort();
        }
        self.repository.close();
    }
}

/// Build every component from configuration.
///
/// Fails when the vulnerability index cannot be built, so the service never
/// starts with an empty index.
pub async fn create_app(config: &Config) -> Result<App, Box<dyn std::error::Error>> {
    let feed: Arc<dyn AdvisoryFeed> = Arc::new(FeedClient::from_config(&config.feed)?);
    let index = match VulnerabilityIndex::load(feed.as_ref()).await {
        Ok(index) => IndexHandle::new(index),
        Err(e) => {
            tracing::error!(error = %e, url = %config.feed.url, "Failed to build vulnerability index");
            return Err(e.into());
        }
    };

    let refresh_task = config
        .feed
        .refresh_interval_hours
        .filter(|hours| *hours > 0)
        .map(|hours| {
            tracing::info!(hours, "Scheduling vulnerability index refresh");
            index.spawn_refresh(feed.clone(), Duration::from_secs(hours * 3600))
        });

    let repository = build_repository(&config.database, &config.resilience)?;
    let validator = build_validator(&config.auth)?;

    let dependency_service = Arc::new(DependencyServiceImpl::new(
        validator,
        Arc::new(ParserRegistry::new()),
        index,
        repository.clone(),
    ));

    let router = create_router(AppState { dependency_service }, config);

    Ok(App {
        router,
        repository,
        refresh_task,
    })
}
