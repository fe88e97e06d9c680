//! Retry with exponential backoff

use crate::hub::error::HubError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often, and how patiently, a file upload is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per file
    pub max_retries: u32,
    /// Delay unit; after failed attempt `k` the wait is `2^k` units
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `operation` until it succeeds or the attempts are used up
    ///
    /// Returns the last error when every attempt failed.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, HubError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HubError>>,
    {
        let attempts = self.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Upload failed (attempt {}/{}) for {}: {}", attempt, attempts, label, e);
                    if attempt >= attempts {
                        return Err(e);
                    }
                    let delay = self.delay_after(attempt);
                    warn!("  -> Retrying in {:?}...", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
