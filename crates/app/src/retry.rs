//! Bounded retry with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use chathub_domain::error::ProviderError;

/// Retry schedule shared by session opening and message sending.
///
/// Attempt `n` (1-based) that fails transiently waits
/// `base_delay * multiplier^(n-1)` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ProviderError`], or the last transient one
    /// once `max_attempts` is reached.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2,
        }
    }

    #[test]
    fn should_grow_delay_exponentially() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run("send", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::transient("503"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("send", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::transient("timeout")) }
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_retry_fatal_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("send", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::fatal("401")) }
            })
            .await;
        assert_eq!(result, Err(ProviderError::fatal("401")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_treat_zero_attempts_as_one() {
        let calls = AtomicU32::new(0);
        let p = RetryPolicy {
            max_attempts: 0,
            ..policy()
        };
        let _: Result<(), _> = p
            .run("open", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::transient("x")) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
