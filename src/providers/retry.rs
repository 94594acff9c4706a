use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::ProviderResult;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Retry behavior for transient provider errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each subsequent one
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(5))
    }
}

/// Run `operation`, retrying transient errors with exponential backoff
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{} failed with transient error (attempt {}), retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    delay,
                    e
                );
                sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::debug!("{} gave up after {} retries", operation_name, attempt);
                }
                return Err(e);
            }
        }
    }
}
