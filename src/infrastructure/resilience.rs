//! Resilience patterns for store connections

use crate::application::errors::StoreError;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Wait suggested to callers turned away while a trial connection is running
const TRIAL_IN_FLIGHT_RETRY: Duration = Duration::from_secs(1);

/// Circuit breaker states
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed through
    Closed,
    /// Circuit is open, requests are rejected immediately
    Open,
    /// Circuit is half-open, a single trial request is probing the store
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to wait before transitioning from Open to HalfOpen
    pub recovery_timeout: Duration,
    /// Maximum number of requests allowed in HalfOpen state
    pub half_open_max_requests: u32,
    /// Timeout for individual requests
    pub request_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(10),
            half_open_max_requests: 1,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Circuit breaker guarding connection creation
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Arc<Mutex<CircuitBreakerState>>,
}

#[derive(Debug)]
struct CircuitBreakerState {
    current_state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    half_open_requests: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(CircuitBreakerState {
                current_state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                half_open_requests: 0,
            })),
        }
    }

    /// Execute a function with circuit breaker protection
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Err(retry_after) = self.try_acquire().await {
            return Err(StoreError::CircuitOpen {
                retry_after_ms: retry_after.as_millis() as u64,
            });
        }

        let result = tokio::time::timeout(self.config.request_timeout, operation()).await;

        match result {
            Ok(Ok(success)) => {
                self.on_success().await;
                Ok(success)
            }
            Ok(Err(error)) => {
                self.on_failure().await;
                Err(error)
            }
            Err(_) => {
                self.on_failure().await;
                Err(StoreError::Connection {
                    message: format!(
                        "connection attempt timed out after {}ms",
                        self.config.request_timeout.as_millis()
                    ),
                })
            }
        }
    }

    /// Reserve the right to call the store, or return the remaining cool-down
    async fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;

        match state.current_state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_time
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.recovery_timeout);

                if elapsed >= self.config.recovery_timeout {
                    debug!("Circuit breaker cool-down elapsed, permitting trial connection");
                    state.current_state = CircuitState::HalfOpen;
                    // The caller that flips the state is the trial request
                    state.half_open_requests = 1;
                    Ok(())
                } else {
                    Err(self.config.recovery_timeout - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                if state.half_open_requests < self.config.half_open_max_requests {
                    state.half_open_requests += 1;
                    Ok(())
                } else {
                    Err(TRIAL_IN_FLIGHT_RETRY)
                }
            }
        }
    }

    /// Handle successful request
    async fn on_success(&self) {
        let mut state = self.state.lock().await;

        if state.current_state != CircuitState::Closed {
            debug!("Trial connection succeeded, closing circuit breaker");
        }
        state.current_state = CircuitState::Closed;
        state.failure_count = 0;
        state.half_open_requests = 0;
    }

    /// Handle failed request
    async fn on_failure(&self) {
        let mut state = self.state.lock().await;

        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.current_state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        failures = state.failure_count,
                        cooldown_ms = self.config.recovery_timeout.as_millis() as u64,
                        "Circuit breaker opened"
                    );
                    state.current_state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("Trial connection failed, reopening circuit breaker");
                state.current_state = CircuitState::Open;
                state.half_open_requests = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Get current circuit breaker state
    pub async fn get_state(&self) -> CircuitState {
        let state = self.state.lock().await;
        state.current_state.clone()
    }

    /// Whether calls are currently being rejected without reaching the store
    pub async fn is_open(&self) -> bool {
        let state = self.state.lock().await;
        state.current_state == CircuitState::Open
            && state
                .last_failure_time
                .is_some_and(|at| at.elapsed() < self.config.recovery_timeout)
    }

    /// Get current failure count
    pub async fn get_failure_count(&self) -> u32 {
        let state = self.state.lock().await;
        state.failure_count
    }

    /// Reset the circuit breaker to closed state
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.current_state = CircuitState::Closed;
        state.failure_count = 0;
        state.last_failure_time = None;
        state.half_open_requests = 0;
    }
}

/// Retry policy applied to a whole store submit
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub delay: Duration,
    /// Multiplier applied to the delay after each retry (1.0 keeps it fixed)
    pub backoff_multiplier: f64,
    /// Upper bound for the delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(200),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether an error may be retried at all
    pub fn is_retryable(&self, error: &StoreError) -> bool {
        error.is_transient()
    }

    /// Delay to wait before the given retry (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry.saturating_sub(1) as i32);
        let millis = (self.delay.as_millis() as f64 * factor) as u64;
        std::cmp::min(Duration::from_millis(millis), self.max_delay)
    }
}

/// Execute an operation under a retry policy.
///
/// `halted` is consulted before every retry; when it reports true the last
/// error is returned without sleeping or calling the operation again.
pub async fn retry_with_policy<F, Fut, T, H, HFut>(
    policy: &RetryPolicy,
    mut operation: F,
    mut halted: H,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
    H: FnMut() -> HFut,
    HFut: Future<Output = bool>,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if retries >= policy.max_retries || !policy.is_retryable(&error) {
                    return Err(error);
                }

                if halted().await {
                    debug!(error = %error, "Skipping retries while the store is unavailable");
                    return Err(error);
                }

                retries += 1;
                let delay = policy.delay_for(retries);
                warn!(
                    error = %error,
                    retry = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
