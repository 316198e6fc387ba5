//! Retry with exponential backoff
//!
//! The policy is fixed: 4xx responses are final except 408, 5xx and
//! transport failures (status 0) are retried.

use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Whether a failed attempt may be repeated
pub fn should_retry(error: &ApiError) -> bool {
    match error.status {
        0 => true,
        408 => true,
        400..=499 => false,
        500..=599 => true,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// The last error is returned unchanged on exhaustion.
pub async fn retry_request<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retries && should_retry(&err) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Request failed ({}: {}), retrying in {:?}... (retry {}/{})",
                    err.status,
                    err.message,
                    delay,
                    attempt,
                    policy.retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
