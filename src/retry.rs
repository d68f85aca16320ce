//! Retry utilities with exponential backoff.
//!
//! All outbound HTTP in this crate (tool-protocol calls, A2A tasks, LLM
//! completions) shares one retry policy: exponential backoff starting at
//! 200 ms, doubling per attempt, with ±20% jitter and at most 3 attempts.
//! Only transient failures are retried; validation and protocol errors
//! surface immediately.
//!
//! # Examples
//!
//! ```rust,no_run
//! use policy_agents::retry::{retry_transient, RetryConfig};
//!
//! # async fn example() -> policy_agents::Result<()> {
//! let config = RetryConfig::default();
//! let value = retry_transient(&config, || async {
//!     Ok::<_, policy_agents::Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Cap on the delay between retries
    pub max_delay: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Random jitter applied around the computed delay (0.0 to 1.0;
    /// 0.2 means the delay varies by ±20% of itself)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with the crate-wide defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the delay before the first retry
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the cap on inter-retry delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor (clamped to 0.0..=1.0)
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay for a given zero-based attempt: exponential, capped, jittered.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let nominal_ms = (self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32))
        .min(self.max_delay.as_millis() as f64);

        // A factor of 0.2 lands the actual delay anywhere within ±20% of
        // the nominal backoff, so synchronized clients fan out instead of
        // retrying in lockstep.
        let jittered_ms = if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            nominal_ms * (1.0 + rng.gen_range(-self.jitter_factor..=self.jitter_factor))
        } else {
            nominal_ms
        };

        Duration::from_millis(jittered_ms.max(0.0) as u64)
    }
}

/// Retry an async operation, sleeping with backoff between attempts, but
/// only while the failure is transient ([`Error::is_retryable`]).
///
/// Non-retryable errors (invalid parameters, protocol mismatches,
/// not-found results, backpressure rejections) return immediately without
/// consuming the attempt budget.
pub async fn retry_transient<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                last_error = Some(err);

                // No sleep after the final attempt
                if attempt < config.max_attempts - 1 {
                    sleep(config.calculate_delay(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or(Error::Timeout))
}
