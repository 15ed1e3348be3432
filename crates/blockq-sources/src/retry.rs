use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Bounded exponential backoff applied by adapters to upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Upper bound on the summed backoff between `max_attempts` attempts.
    pub fn max_total_delay(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|attempt| {
                let multiplier = 2_u64.saturating_pow(attempt - 1);
                let delay = self.base_delay_ms.saturating_mul(multiplier);
                let jitter = self.base_delay_ms / 2;
                Duration::from_millis(delay.saturating_add(jitter).min(self.max_delay_ms))
            })
            .sum()
    }

    /// Delay before retry number `attempt` (1-based): exponential with jitter,
    /// capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay_ms.saturating_mul(multiplier);
        let jitter = rand::random::<u64>() % (self.base_delay_ms / 2 + 1);
        Duration::from_millis(delay.saturating_add(jitter).min(self.max_delay_ms))
    }
}

/// Execute an async operation with retries. Errors for which `is_retryable`
/// returns false are handed back immediately.
pub async fn retry_async<T, E, F, Fut, R>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if !is_retryable(&e) {
                    warn!("Operation '{}' failed permanently: {}", operation_name, e);
                    return Err(e);
                }
                if attempt >= max_attempts {
                    error!(
                        "Failed to execute '{}' after {} attempts: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "Operation '{}' failed. Retrying in {:?} (Attempt {}/{}): {}",
                    operation_name, delay, attempt, max_attempts, e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 500,
        };
        assert!(policy.delay_for(1) >= Duration::from_millis(100));
        assert_eq!(policy.delay_for(8), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_async(
            "flaky",
            &RetryPolicy::default(),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            ..Default::default()
        };
        let result: Result<(), String> = retry_async(
            "down",
            &policy,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unreachable".to_string())
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_async(
            "rejected",
            &RetryPolicy::default(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("method not found".to_string())
            },
            |e| !e.contains("not found"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_total_delay_bounds_every_backoff() {
        let policy = RetryPolicy::default();
        // 200 + 100 jitter, then 400 + 100 jitter
        assert_eq!(policy.max_total_delay(), Duration::from_millis(800));
        for _ in 0..20 {
            let actual = policy.delay_for(1) + policy.delay_for(2);
            assert!(actual <= policy.max_total_delay());
        }
        assert_eq!(RetryPolicy::no_retry().max_total_delay(), Duration::ZERO);
    }
}
