//! Resilient invocation of remote operations

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, RetryPolicy};
use crate::domain::DomainError;

/// Decides whether a failed attempt should be retried
pub type RetryPredicate = fn(&DomainError) -> bool;

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub retry: Option<RetryPolicy>,
    pub should_retry: Option<RetryPredicate>,
}

impl CallOptions {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_should_retry(mut self, predicate: RetryPredicate) -> Self {
        self.should_retry = Some(predicate);
        self
    }
}

/// Runs remote operations under retry with backoff and a circuit breaker per dependency.
///
/// Only retryable failures count against the breaker. Rejections such as a 400
/// prove the dependency is reachable and are recorded as successes.
#[derive(Debug)]
pub struct ResilientClient {
    retry: RetryPolicy,
    breaker_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), CircuitBreakerConfig::default())
    }
}

impl ResilientClient {
    pub fn new(retry: RetryPolicy, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            retry,
            breaker_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Call with the default policy
    pub async fn call<T, F, Fut>(
        &self,
        dependency: &str,
        operation: &str,
        f: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        self.call_with(dependency, operation, CallOptions::default(), f)
            .await
    }

    pub async fn call_with<T, F, Fut>(
        &self,
        dependency: &str,
        operation: &str,
        options: CallOptions,
        mut f: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let policy = options.retry.unwrap_or_else(|| self.retry.clone());
        let should_retry = options
            .should_retry
            .unwrap_or(DomainError::is_retryable as RetryPredicate);
        let max_attempts = policy.max_attempts.max(1);
        let breaker = self.breaker(dependency).await;

        let mut attempt = 1;
        loop {
            breaker.try_acquire().await?;

            let error = match f().await {
                Ok(value) => {
                    breaker.record_success().await;
                    if attempt > 1 {
                        debug!(dependency, operation, attempt, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if error.is_retryable() {
                breaker.record_failure().await;
            } else {
                breaker.record_success().await;
            }

            if !should_retry(&error) {
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!(
                    dependency,
                    operation,
                    attempts = attempt,
                    error = %error,
                    "Remote call failed after exhausting retries"
                );
                return Err(error);
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                dependency,
                operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Remote call failed, retrying"
            );
            counter!(
                "remote_call_retries_total",
                "dependency" => dependency.to_string(),
                "operation" => operation.to_string()
            )
            .increment(1);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Get or create the breaker for a dependency
    pub async fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(cb) = breakers.get(dependency) {
                return cb.clone();
            }
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    dependency,
                    self.breaker_config.clone(),
                ))
            })
            .clone()
    }

    pub async fn breaker_stats(&self) -> Vec<CircuitBreakerStats> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().cloned().collect();

        let mut stats = Vec::with_capacity(breakers.len());
        for cb in breakers {
            stats.push(cb.stats().await);
        }
        stats.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resilience::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn transient() -> DomainError {
        DomainError::remote_retryable("engine", "503 Service Unavailable", Some(503))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff() {
        let client = ResilientClient::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let mut offsets = Vec::new();

        let result = client
            .call("engine", "get_workflow", || {
                offsets.push(started.elapsed());
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 { Err(transient()) } else { Ok("ok") }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(offsets[1] - offsets[0], Duration::from_millis(1000));
        assert_eq!(offsets[2] - offsets[1], Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_max_attempts() {
        let client = ResilientClient::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = client
            .call("engine", "list_workflows", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let client = ResilientClient::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = client
            .call("engine", "create_workflow", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DomainError::remote_rejected("engine", "bad payload", Some(400))) }
            })
            .await;

        assert!(!result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let cb = client.breaker("engine").await;
        assert_eq!(cb.failure_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate_disables_retry() {
        let client = ResilientClient::default();
        let calls = AtomicU32::new(0);
        let options = CallOptions::default().with_should_retry(|_| false);

        let result: Result<(), _> = client
            .call_with("engine", "ping", options, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_and_recovers() {
        let client = ResilientClient::new(
            RetryPolicy::no_retry(),
            CircuitBreakerConfig {
                failure_threshold: 5,
                success_threshold: 3,
                reset_timeout_ms: 60_000,
            },
        );
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _: Result<(), _> = client
                .call("engine", "get_workflow", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(transient()) }
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // Sixth call fails fast without invoking the operation
        let result: Result<(), _> = client
            .call("engine", "get_workflow", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(DomainError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        tokio::time::advance(Duration::from_millis(60_000)).await;

        for _ in 0..3 {
            client
                .call("engine", "get_workflow", || async { Ok(()) })
                .await
                .unwrap();
        }

        let cb = client.breaker("engine").await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert_eq!(cb.failure_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakers_are_per_dependency() {
        let client = ResilientClient::new(
            RetryPolicy::no_retry(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );

        let _: Result<(), _> = client
            .call("oauth", "refresh", || async { Err(transient()) })
            .await;

        assert_eq!(client.breaker("oauth").await.state().await, CircuitState::Open);
        assert!(client.call("engine", "ping", || async { Ok(()) }).await.is_ok());

        let stats = client.breaker_stats().await;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].dependency, "engine");
    }
}
