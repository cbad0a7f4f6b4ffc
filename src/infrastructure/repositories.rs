//! Repository implementations

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::resilience::{CircuitBreakerConfig, RetryPolicy, retry_with_policy};
use super::storage::{
    MemoryStore, PoolSettings, PooledConnection, PostgresConnector, StorageContext,
    StoreConnection, StoreConnector,
};
use crate::application::errors::StoreError;
use crate::config::{DatabaseConfig, ResilienceConfig, StoreBackend};
use crate::domain::{ComponentId, DependencyType, Generation};

/// Repository trait for dependency table writes
#[async_trait]
pub trait DependencyRepository: Send + Sync {
    /// Atomically replace the stored generation with `generation`.
    ///
    /// Returns the number of records inserted. An empty generation clears
    /// the pair.
    async fn replace_generation(&self, generation: &Generation) -> Result<u64, StoreError>;

    /// Delete one generation, or every generation of the component when
    /// `dependency_type` is `None`. Returns the number of records removed.
    async fn clear(
        &self,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<u64, StoreError>;

    fn backend(&self) -> &'static str;

    /// Stop accepting writes and close idle connections
    fn close(&self);
}

/// Write executed inside one transaction
#[derive(Debug, Clone, Copy)]
enum GenerationWrite<'a> {
    Replace(&'a Generation),
    Clear {
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    },
}

impl GenerationWrite<'_> {
    fn component_id(&self) -> ComponentId {
        match self {
            GenerationWrite::Replace(generation) => generation.component_id(),
            GenerationWrite::Clear { component_id, .. } => *component_id,
        }
    }

    fn dependency_type(&self) -> Option<DependencyType> {
        match self {
            GenerationWrite::Replace(generation) => Some(generation.dependency_type()),
            GenerationWrite::Clear {
                dependency_type, ..
            } => *dependency_type,
        }
    }
}

/// Runs generation writes as single transactions over the pooled store,
/// retrying whole transactions on transient failures
pub struct PersistenceCoordinator<C: StoreConnector> {
    storage: Arc<StorageContext<C>>,
    retry_policy: RetryPolicy,
}

impl<C: StoreConnector> PersistenceCoordinator<C> {
    pub fn new(storage: Arc<StorageContext<C>>, retry_policy: RetryPolicy) -> Self {
        Self {
            storage,
            retry_policy,
        }
    }

    /// Build the pool, breaker and retry policy from configuration
    pub fn from_config(
        connector: C,
        database: &DatabaseConfig,
        resilience: &ResilienceConfig,
    ) -> Result<Self, StoreError> {
        let settings = PoolSettings {
            pool_size: database.pool_size,
            max_overflow: database.max_overflow,
            acquire_timeout: Duration::from_secs(database.acquire_timeout_seconds),
        };
        let breaker_config = CircuitBreakerConfig {
            failure_threshold: resilience.fail_threshold.max(1),
            recovery_timeout: Duration::from_secs(resilience.reset_timeout_seconds),
            half_open_max_requests: 1,
            request_timeout: Duration::from_secs(database.connect_timeout_seconds.max(1)),
        };
        let retry_policy = RetryPolicy {
            max_retries: resilience.max_retries,
            delay: Duration::from_millis(resilience.retry_delay_ms),
            backoff_multiplier: resilience.backoff_multiplier,
            ..RetryPolicy::default()
        };

        let storage = StorageContext::new(connector, settings, breaker_config)?;
        Ok(Self::new(Arc::new(storage), retry_policy))
    }

    pub fn storage(&self) -> &StorageContext<C> {
        &self.storage
    }

    async fn run(&self, write: GenerationWrite<'_>) -> Result<u64, StoreError> {
        let started = Instant::now();
        let breaker = self.storage.breaker();

        let result = retry_with_policy(
            &self.retry_policy,
            || self.attempt(write),
            || breaker.is_open(),
        )
        .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let dependency_type = write
            .dependency_type()
            .map(|kind| kind.as_str())
            .unwrap_or("all");

        match &result {
            Ok(affected) => info!(
                component_id = %write.component_id(),
                dependency_type,
                affected,
                elapsed_ms,
                "Dependency generation written"
            ),
            Err(error) => warn!(
                component_id = %write.component_id(),
                dependency_type,
                error = %error,
                elapsed_ms,
                "Dependency generation write failed"
            ),
        }

        result
    }

    /// One transaction: acquire, begin, apply, commit, release
    async fn attempt(&self, write: GenerationWrite<'_>) -> Result<u64, StoreError> {
        let mut conn = self.storage.acquire().await?;

        if let Err(error) = conn.begin().await {
            conn.discard();
            return Err(error);
        }

        let affected = match apply(&mut *conn, write).await {
            Ok(affected) => affected,
            Err(error) => return self.abort(conn, error).await,
        };

        match conn.commit().await {
            Ok(()) => {
                conn.release();
                Ok(affected)
            }
            Err(error) => self.abort(conn, error).await,
        }
    }

    /// Roll back a failed transaction and decide the connection's fate
    async fn abort(&self, mut conn: PooledConnection<C>, error: StoreError) -> Result<u64, StoreError> {
        match conn.rollback().await {
            Ok(()) if !error.is_transient() => conn.release(),
            Ok(()) => {
                debug!(error = %error, "Discarding connection after transient failure");
                conn.discard();
            }
            Err(rollback_error) => {
                warn!(
                    error = %error,
                    rollback_error = %rollback_error,
                    "Rollback failed, discarding connection"
                );
                conn.discard();
            }
        }

        Err(error)
    }
}

async fn apply<T: StoreConnection>(conn: &mut T, write: GenerationWrite<'_>) -> Result<u64, StoreError> {
    match write {
        GenerationWrite::Replace(generation) => {
            let removed = conn
                .delete_generation(generation.component_id(), Some(generation.dependency_type()))
                .await?;

            for record in generation.records() {
                conn.insert_record(record).await?;
            }

            debug!(
                component_id = %generation.component_id(),
                removed,
                inserted = generation.len(),
                "Generation staged"
            );
            Ok(generation.len() as u64)
        }
        GenerationWrite::Clear {
            component_id,
            dependency_type,
        } => conn.delete_generation(component_id, dependency_type).await,
    }
}

#[async_trait]
impl<C: StoreConnector> DependencyRepository for PersistenceCoordinator<C> {
    async fn replace_generation(&self, generation: &Generation) -> Result<u64, StoreError> {
        self.run(GenerationWrite::Replace(generation)).await
    }

    async fn clear(
        &self,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<u64, StoreError> {
        self.run(GenerationWrite::Clear {
            component_id,
            dependency_type,
        })
        .await
    }

    fn backend(&self) -> &'static str {
        self.storage.backend()
    }

    fn close(&self) {
        self.storage.close();
    }
}

/// Build the repository for the configured backend
pub fn build_repository(
    database: &DatabaseConfig,
    resilience: &ResilienceConfig,
) -> Result<Arc<dyn DependencyRepository>, StoreError> {
    let repository: Arc<dyn DependencyRepository> = match database.backend {
        StoreBackend::Postgres => Arc::new(PersistenceCoordinator::from_config(
            PostgresConnector::new(database),
            database,
            resilience,
        )?),
        StoreBackend::Memory => {
            warn!("Using the in-memory dependency store; rows are lost on restart");
            Arc::new(PersistenceCoordinator::from_config(
                MemoryStore::new(),
                database,
                resilience,
            )?)
        }
    };

    Ok(repository)
}
