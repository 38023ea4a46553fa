//! Retry with exponential backoff for recoverable errors
//!
//! This module provides a retry mechanism with configurable exponential backoff
//! for handling transient failures when calling the diagnosis service and the
//! chat webhook.

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::{Result, ServiceError};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_interval: Duration,

    /// Maximum backoff duration
    pub max_interval: Duration,

    /// Multiplier for backoff between retries
    pub multiplier: f64,

    /// Jitter applied to each interval (0.2 means ±20%)
    pub randomization_factor: f64,

    /// Maximum total time to spend retrying
    pub max_elapsed_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            randomization_factor: 0.2,
            max_elapsed_time: Some(Duration::from_secs(10)),
        }
    }
}

impl RetryConfig {
    /// A fixed doubling schedule without jitter
    pub fn deterministic(max_retries: u32, initial_interval: Duration) -> Self {
        Self {
            max_retries,
            initial_interval,
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(self.max_elapsed_time)
            .build()
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RetryConfig {{ max_retries: {}, initial_interval: {:?}, max_interval: {:?}, multiplier: {}, randomization_factor: {}, max_elapsed_time: {:?} }}",
            self.max_retries,
            self.initial_interval,
            self.max_interval,
            self.multiplier,
            self.randomization_factor,
            self.max_elapsed_time
        )
    }
}

/// Result of a retried operation together with the number of attempts made
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    /// Retry configuration
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a fallible operation, retrying errors for which
    /// `ServiceError::is_retryable` holds
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = self.run(operation, ServiceError::is_retryable).await;
        match outcome.result {
            Ok(value) => Ok(value),
            Err(err) if outcome.attempts > 1 => Err(err.with_context_value("attempts", outcome.attempts)),
            Err(err) => Err(err),
        }
    }

    /// Execute a fallible operation with a caller-supplied retry predicate.
    ///
    /// The operation receives the 1-based attempt number. At most
    /// `max_retries + 1` attempts are made, fewer if the backoff's elapsed
    /// time budget runs out first.
    pub async fn run<F, Fut, T, P>(&self, operation: F, should_retry: P) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&ServiceError) -> bool,
    {
        self.run_observed(operation, should_retry, |_, _| {}).await
    }

    /// Like `run`, calling `observe(attempt, error)` after every attempt,
    /// with `None` for a successful one
    pub async fn run_observed<F, Fut, T, P, O>(
        &self,
        mut operation: F,
        should_retry: P,
        mut observe: O,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&ServiceError) -> bool,
        O: FnMut(u32, Option<&ServiceError>),
    {
        let mut backoff = self.config.build_backoff();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let result = operation(attempts).await;
            observe(attempts, result.as_ref().err());

            match result {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    }
                }
                Err(err) if should_retry(&err) && attempts <= self.config.max_retries => {
                    match backoff.next_backoff() {
                        Some(backoff_duration) => {
                            log::warn!(
                                "Operation failed with retryable error, retrying in {:?} (retry {}/{}): {}",
                                backoff_duration,
                                attempts,
                                self.config.max_retries,
                                err
                            );

                            tokio::time::sleep(backoff_duration).await;
                        }
                        None => {
                            log::warn!("Retry budget exhausted after {} attempts: {}", attempts, err);
                            return RetryOutcome {
                                result: Err(err),
                                attempts,
                            };
                        }
                    }
                }
                Err(err) => {
                    return RetryOutcome {
                        result: Err(err),
                        attempts,
                    }
                }
            }
        }
    }

    /// Get the current retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(100),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_successful_operation() {
        let retry = RetryExecutor::new(RetryConfig::default());
        let result = retry.execute(|_| async { Ok::<_, ServiceError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_on_failure() {
        let retry = RetryExecutor::new(fast_config(2));

        let result = retry
            .execute(|attempt| async move {
                if attempt < 3 {
                    Err(ServiceError::network("Test failure"))
                } else {
                    Ok::<_, ServiceError>(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let retry = RetryExecutor::new(fast_config(2));

        let result: Result<()> = retry
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::service("invalid_request")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_retries_exceeded() {
        let retry = RetryExecutor::new(fast_config(2));

        let outcome = retry
            .run(
                |_| async { Err::<(), _>(ServiceError::timeout("Persistent failure")) },
                ServiceError::is_retryable,
            )
            .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_attempt_count_recorded_on_error() {
        let retry = RetryExecutor::new(fast_config(1));
        let err = retry
            .execute(|_| async { Err::<(), _>(ServiceError::network("down")) })
            .await
            .unwrap_err();
        assert_eq!(err.context_value("attempts"), Some("2"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let retry = RetryExecutor::new(fast_config(2));
        let outcome = retry
            .run(
                |_| async { Err::<(), _>(ServiceError::service("503")) },
                |_| true,
            )
            .await;
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_observer_sees_every_attempt() {
        let retry = RetryExecutor::new(fast_config(2));
        let mut seen = Vec::new();
        let outcome = retry
            .run_observed(
                |attempt| async move {
                    if attempt == 1 {
                        Err(ServiceError::network("flaky"))
                    } else {
                        Ok(attempt)
                    }
                },
                ServiceError::is_retryable,
                |attempt, err| seen.push((attempt, err.is_some())),
            )
            .await;

        assert_eq!(outcome.result.unwrap(), 2);
        assert_eq!(seen, vec![(1, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_deterministic_schedule() {
        let retry = RetryExecutor::new(RetryConfig::deterministic(2, Duration::from_millis(40)));
        let start = Instant::now();
        let outcome = retry
            .run(|_| async { Err::<(), _>(ServiceError::network("x")) }, |_| true)
            .await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.attempts, 3);
        // 40ms + 80ms of backoff, no jitter
        assert!(elapsed >= Duration::from_millis(120), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_elapsed_budget_stops_retries() {
        let config = RetryConfig {
            max_retries: 10,
            initial_interval: Duration::from_millis(30),
            max_interval: Duration::from_millis(30),
            multiplier: 1.0,
            randomization_factor: 0.0,
            max_elapsed_time: Some(Duration::from_millis(50)),
        };
        let outcome = RetryExecutor::new(config)
            .run(|_| async { Err::<(), _>(ServiceError::network("x")) }, |_| true)
            .await;
        assert!(outcome.attempts < 11);
    }
}
