//! Caller-side retry with backoff.
//!
//! The completion gateway never retries on its own. Stages that want a retry
//! wrap their call here; only errors that classify as retry-worthy are
//! retried, and a provider backoff hint is honored over the exponential
//! schedule.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use adforge_gemini::CompletionError;
use adforge_models::AssetFailure;

/// Errors that know whether a retry can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Provider-suggested delay before the next attempt.
    fn backoff_hint(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        CompletionError::is_retryable(self)
    }

    fn backoff_hint(&self) -> Option<Duration> {
        CompletionError::backoff_hint(self)
    }
}

impl Retryable for AssetFailure {
    fn is_retryable(&self) -> bool {
        AssetFailure::is_retryable(self)
    }

    fn backoff_hint(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries, hints included.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        hint.map_or(exponential, |h| h.max(exponential))
            .min(self.max_delay)
    }
}

/// Execute an async operation, retrying retry-worthy failures.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new("rank_blueprints").with_max_retries(2);
/// let value = retry_async(&config, || gateway.complete(request.clone())).await?;
/// ```
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt, e.backoff_hint());
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        "{} failed after {} attempts: {}",
                        config.operation_name,
                        attempt + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}
