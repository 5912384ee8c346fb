use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;
use crate::error::TokenCacheError;
use crate::utils::constants::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};

/// Caller-side retry for token acquisition. The cache never retries on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&RetryConfig> for RetrySettings {
    fn from(retry: &RetryConfig) -> Self {
        Self {
            attempts: retry.attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS).max(1),
            base_delay_ms: retry.base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay_ms: retry.max_delay_ms.unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetrySettings {
    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts run out. Delay doubles up to `max_delay_ms`.
    pub async fn run_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, TokenCacheError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TokenCacheError>>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    sleep(Duration::from_millis(delay)).await;
                    delay = delay.saturating_mul(2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!("giving up after {attempt} attempt(s): {e}");
                    return Err(e);
                }
            }
        }
    }
}
