//! Load Retry
//!
//! Exponential backoff with jitter for loading a stock handle whose
//! transport is still starting up, or whose symbol the transport has not
//! registered yet.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::application::services::stock_handle::StockHandle;
use crate::domain::error::FeedError;
use crate::infrastructure::config::RetrySettings;

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each retry.
    pub multiplier: f64,
    /// Random spread as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Retries allowed after the first attempt (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            initial_delay: settings.initial_delay,
            max_delay: settings.max_delay,
            multiplier: settings.multiplier,
            jitter_factor: 0.1,
            max_attempts: settings.max_attempts,
        }
    }
}

/// Backoff state for one retry sequence.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl RetryPolicy {
    /// Create a policy at its initial delay.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Delay before the next retry, or `None` once retries are used up.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;

        let delay = self.jittered(self.current_delay);
        let grown = self.current_delay.as_secs_f64() * self.config.multiplier.max(1.0);
        self.current_delay = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);
        Some(delay)
    }

    /// Return to the initial delay after a success.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Retries handed out since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another retry is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }
        let spread = self.config.jitter_factor.min(1.0);
        let factor: f64 = rand::rng().random_range(1.0 - spread..=1.0 + spread);
        delay.mul_f64(factor).max(Duration::from_millis(1))
    }
}

/// Why a retried load gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Every allowed attempt failed.
    #[error("load failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Load attempts made, including the first.
        attempts: u32,
        /// Error from the final attempt.
        last: FeedError,
    },
    /// The cancellation token fired first.
    #[error("load retry cancelled")]
    Cancelled,
}

/// Load `handle`, retrying recoverable failures with backoff.
///
/// Returns the number of load attempts it took. The policy is reset on
/// success so it can be reused.
///
/// # Errors
///
/// - [`RetryError::Exhausted`] once the policy allows no more retries.
/// - [`RetryError::Cancelled`] if `cancel` fires before a load succeeds.
pub async fn load_with_retry(
    handle: &StockHandle,
    policy: &mut RetryPolicy,
    cancel: &CancellationToken,
) -> Result<u32, RetryError> {
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        attempts += 1;
        let error = match handle.load() {
            Ok(()) => {
                policy.reset();
                return Ok(attempts);
            }
            Err(e) => e,
        };

        let Some(delay) = policy.next_delay() else {
            return Err(RetryError::Exhausted {
                attempts,
                last: error,
            });
        };

        tracing::warn!(
            symbol = %handle.symbol(),
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Load failed, retrying"
        );

        tokio::select! {
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
