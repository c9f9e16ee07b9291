//! Retry policy for remote-store operations.
//!
//! Provides bounded exponential backoff with optional jitter around any
//! async operation that returns [`bf_error::Result`]. Whether a failure is
//! retried at all is decided by [`bf_error::classify`]; this crate only
//! drives the loop, the waits and the terminal wrapping.

use std::time::Duration;

use bf_error::{BfError, Result, is_transient};
use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retry behavior.
///
/// Defaults match the store-client tuning this core was extracted with:
/// up to 10 attempts, waits starting at one second and doubling up to five
/// minutes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (the first call included) before giving up.
    pub max_attempts: u32,
    /// Initial wait between attempts in milliseconds.
    pub initial_wait_ms: u64,
    /// Maximum wait between attempts in milliseconds.
    pub max_wait_ms: u64,
    /// Whether to add jitter to wait times.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_wait_ms: 1000,
            max_wait_ms: 300_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial wait in milliseconds.
    pub fn with_initial_wait_ms(mut self, initial_wait_ms: u64) -> Self {
        self.initial_wait_ms = initial_wait_ms;
        self
    }

    /// Set the maximum wait in milliseconds.
    pub fn with_max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = max_wait_ms;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the wait before the next try, after `attempt` failures.
    ///
    /// The wait doubles on each failed attempt, capped at `max_wait_ms`,
    /// with up to 25% additive jitter when enabled. Monotonically
    /// non-decreasing in `attempt` (jitter aside).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base_ms = self.initial_wait_ms.saturating_mul(factor);
        let capped_ms = base_ms.min(self.max_wait_ms);

        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4;
            let jitter = rand::rng().random_range(0..=jitter_range);
            capped_ms.saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }
}

/// Execute an async operation with retry logic.
///
/// Transient failures (per [`bf_error::classify`]) are retried with
/// backoff until `max_attempts` is reached, at which point a
/// [`BfError::GiveUp`] carrying the first and last observed errors is
/// returned. A fatal failure short-circuits immediately, wrapped as a
/// configuration error so callers can tell the two terminal states apart.
///
/// Most failed attempts are logged with the error's display form only;
/// every third attempt logs the full error detail to keep long outages
/// from flooding the log.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging and wrapping
/// * `operation` - The async operation to execute
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut first_error: Option<Box<BfError>> = None;

    for attempt in 1..=config.max_attempts.max(1) {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_transient(&e) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Non-retryable error"
                    );
                    return Err(BfError::config_with(
                        format!("{operation_name} failed with a non-retryable error"),
                        e,
                    ));
                }

                if attempt >= config.max_attempts {
                    return Err(BfError::GiveUp {
                        attempts: attempt,
                        first: first_error,
                        last: Box::new(e),
                    });
                }

                let wait = config.backoff_duration(attempt);
                if attempt % 3 == 0 {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = config.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = ?e,
                        "Retryable error, backing off"
                    );
                } else {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = config.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Retryable error, backing off"
                    );
                }

                if first_error.is_none() {
                    first_error = Some(Box::new(e));
                }

                sleep(wait).await;
            }
        }
    }

    unreachable!("retry loop always returns")
}
