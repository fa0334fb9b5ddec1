//! Retry policy for transient Resource Manager failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use super::AzureBackendError;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Capped exponential backoff applied to retryable errors.
///
/// A `Retry-After` hint from the service replaces the computed delay but is
/// still clamped to the maximum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Policy with default delays and the given retry budget.
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self::new(max_retries, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Number of attempts made after the first one.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.map_or_else(
            || {
                let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor).min(self.max_delay)
            },
            |hint| hint.min(self.max_delay),
        )
    }

    /// Runs `operation`, repeating it while it fails with a retryable error
    /// and the budget allows.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, or the last retryable one once the
    /// budget is spent.
    pub async fn run<T, F, Fut>(&self, action: &str, mut operation: F) -> Result<T, AzureBackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AzureBackendError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, err.retry_after());
                    attempt += 1;
                    warn!(
                        action,
                        attempt,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %err,
                        "transient Azure failure, retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(3)
    }
}
