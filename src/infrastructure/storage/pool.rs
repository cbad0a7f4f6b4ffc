//! Pooled store connections guarded by a circuit breaker

use deadpool::Runtime;
use deadpool::managed::{
    Manager, Metrics, Object, Pool, PoolError, RecycleError, RecycleResult, Status, TimeoutType,
};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::traits::{StoreConnection, StoreConnector};
use crate::application::errors::StoreError;
use crate::infrastructure::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Pool sizing and acquisition limits
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Connections kept open between requests
    pub pool_size: usize,
    /// Extra connections opened under load and closed again on release
    pub max_overflow: usize,
    /// How long an acquisition may wait for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 5,
            max_overflow: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// deadpool manager creating connections through the circuit breaker
pub struct ConnectionManager<C: StoreConnector> {
    connector: C,
    breaker: Arc<CircuitBreaker>,
}

impl<C: StoreConnector> Manager for ConnectionManager<C> {
    type Type = C::Connection;
    type Error = StoreError;

    async fn create(&self) -> Result<C::Connection, StoreError> {
        self.breaker.execute(|| self.connector.connect()).await
    }

    async fn recycle(
        &self,
        conn: &mut C::Connection,
        _metrics: &Metrics,
    ) -> RecycleResult<StoreError> {
        if conn.is_healthy().await {
            Ok(())
        } else {
            Err(RecycleError::Backend(StoreError::Connection {
                message: "pooled connection failed its health check".to_string(),
            }))
        }
    }
}

/// Owns the connection pool and the breaker guarding it.
///
/// Built once at startup and shared by reference; `close` stops handing out
/// connections at shutdown.
pub struct StorageContext<C: StoreConnector> {
    pool: Pool<ConnectionManager<C>>,
    breaker: Arc<CircuitBreaker>,
    settings: PoolSettings,
    backend: &'static str,
}

impl<C: StoreConnector> StorageContext<C> {
    pub fn new(
        connector: C,
        settings: PoolSettings,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, StoreError> {
        if settings.pool_size == 0 {
            return Err(StoreError::Configuration {
                message: "pool_size must be at least 1".to_string(),
            });
        }

        let backend = connector.backend();
        let breaker = Arc::new(CircuitBreaker::new(breaker_config));
        let manager = ConnectionManager {
            connector,
            breaker: breaker.clone(),
        };

        let pool = Pool::builder(manager)
            .max_size(settings.pool_size + settings.max_overflow)
            .wait_timeout(Some(settings.acquire_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::Configuration {
                message: format!("failed to build connection pool: {}", e),
            })?;

        info!(
            backend,
            pool_size = settings.pool_size,
            max_overflow = settings.max_overflow,
            acquire_timeout_ms = settings.acquire_timeout.as_millis() as u64,
            "Storage context initialized"
        );

        Ok(Self {
            pool,
            breaker,
            settings,
            backend,
        })
    }

    /// Check out a connection, waiting up to the acquisition timeout
    pub async fn acquire(&self) -> Result<PooledConnection<C>, StoreError> {
        let started = Instant::now();

        let object = self.pool.get().await.map_err(|error| match error {
            PoolError::Timeout(TimeoutType::Wait) => StoreError::PoolTimeout {
                waited_ms: started.elapsed().as_millis() as u64,
            },
            PoolError::Timeout(kind) => StoreError::Connection {
                message: format!("pool {:?} timeout", kind),
            },
            PoolError::Backend(store_error) => store_error,
            PoolError::Closed => StoreError::PoolClosed,
            other => StoreError::Configuration {
                message: other.to_string(),
            },
        })?;

        debug!(
            backend = self.backend,
            waited_ms = started.elapsed().as_millis() as u64,
            "Acquired store connection"
        );

        Ok(PooledConnection {
            object,
            pool: self.pool.clone(),
            core_size: self.settings.pool_size,
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn status(&self) -> Status {
        self.pool.status()
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Stop handing out connections and drop idle ones
    pub fn close(&self) {
        info!(backend = self.backend, "Closing storage context");
        self.pool.close();
    }
}

/// A checked-out connection.
///
/// Dropping it returns the connection to the pool; [`release`](Self::release)
/// additionally closes overflow connections and [`discard`](Self::discard)
/// closes it unconditionally.
pub struct PooledConnection<C: StoreConnector> {
    object: Object<ConnectionManager<C>>,
    pool: Pool<ConnectionManager<C>>,
    core_size: usize,
}

impl<C: StoreConnector> PooledConnection<C> {
    /// Hand the connection back after a clean transaction
    pub fn release(self) {
        if self.pool.status().size > self.core_size {
            debug!("Closing overflow connection on release");
            drop(Object::take(self.object));
        }
    }

    /// Close the connection instead of returning it to the pool
    pub fn discard(self) {
        drop(Object::take(self.object));
    }
}

impl<C: StoreConnector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl<C: StoreConnector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.object
    }
}
