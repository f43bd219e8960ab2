//! Caller-side retry of protocol requests
//!
//! The engine never retries on its own. Schedulers and other callers use
//! [`RetryExecutor`] to re-issue a request while the response carries a
//! retryable error, waiting out rate-limit windows when told to.

use crate::protocol::{ErrorDescriptor, ErrorKind, Response};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// How a caller re-issues requests that failed with a retryable error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Backoff before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on any single backoff
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt
    pub exponential_base: f64,

    /// Fraction of the delay randomized in either direction
    pub jitter_factor: f64,

    /// Wait for the full rate-limit window instead of capping at `max_delay_ms`
    pub respect_next_reset: bool,

    /// Overall budget including backoff; `None` is unbounded
    pub timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
            respect_next_reset: false,
            timeout_ms: Some(60_000),
        }
    }
}

impl RetryPolicy {
    /// Default policy with a custom retry count
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Policy for scheduled collection: few attempts, waits out rate limits
    pub fn scheduled() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 3.0,
            jitter_factor: 0.2,
            respect_next_reset: true,
            timeout_ms: Some(20 * 60 * 1_000),
        }
    }

    /// A policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn calculate_delay(
        &self,
        attempt: u32,
        error: &ErrorDescriptor,
        now: DateTime<Utc>,
    ) -> Duration {
        let cap = Duration::from_millis(self.max_delay_ms);

        if error.kind == ErrorKind::RateLimitExceeded {
            if let Some(reset) = error.next_reset {
                let until_reset = (reset - now).to_std().unwrap_or(Duration::ZERO);
                return if self.respect_next_reset {
                    until_reset
                } else {
                    until_reset.min(cap)
                };
            }
        }

        let base_delay = self.initial_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let delay_with_jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(delay_with_jitter as u64)
    }

    /// Whether another attempt should be made after `attempt` retries
    pub fn should_retry(&self, error: &ErrorDescriptor, attempt: u32) -> bool {
        attempt < self.max_retries && error.retryable
    }
}

/// Outcome of a retried request
#[derive(Debug, Clone)]
pub struct RetryResult {
    /// The last response received
    pub response: Response,

    /// Number of retries made
    pub attempts: u32,

    /// Total time spent waiting between attempts
    pub total_delay_ms: u64,

    /// Errors received before the last response
    pub error_history: Vec<ErrorDescriptor>,
}

impl RetryResult {
    /// Whether the final response succeeded
    pub fn is_success(&self) -> bool {
        !self.response.is_error()
    }
}

/// Drives an operation under a [`RetryPolicy`]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Issue `operation` until it succeeds or the policy gives up
    pub async fn execute<F, Fut>(&self, mut operation: F) -> RetryResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut attempts = 0;
        let mut total_delay_ms = 0;
        let mut error_history = Vec::new();
        let start_time = Instant::now();

        loop {
            let response = operation().await;
            let Some(error) = response.error.clone() else {
                return RetryResult {
                    response,
                    attempts,
                    total_delay_ms,
                    error_history,
                };
            };

            if !self.policy.should_retry(&error, attempts) {
                return RetryResult {
                    response,
                    attempts,
                    total_delay_ms,
                    error_history,
                };
            }

            let delay = self.policy.calculate_delay(attempts, &error, Utc::now());
            if let Some(timeout_ms) = self.policy.timeout_ms {
                let spent = start_time.elapsed() + delay;
                if spent.as_millis() > u128::from(timeout_ms) {
                    debug!(kind = %error.kind, "Retry budget exhausted");
                    return RetryResult {
                        response,
                        attempts,
                        total_delay_ms,
                        error_history,
                    };
                }
            }

            debug!(
                kind = %error.kind,
                attempt = attempts + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying request"
            );
            error_history.push(error);
            total_delay_ms += delay.as_millis() as u64;
            tokio::time::sleep(delay).await;
            attempts += 1;
        }
    }
}
