//! Retry loop with exponential backoff.
//!
//! The provider gateway retries a request only when the failure carries one
//! of the transient status codes; whether an error qualifies is decided by
//! the caller-supplied predicate.

use crate::config::NetworkConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff schedule for retried requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each subsequent one.
    pub backoff_factor: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: NetworkConfig::MAX_RETRIES,
            backoff_factor: NetworkConfig::BACKOFF_FACTOR,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-indexed): `factor * 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let secs = self.backoff_factor.as_secs_f64() * 2f64.powi(retry as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Outcome bookkeeping for one retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    pub last_error: Option<String>,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's budget is spent.
pub async fn retry_async<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let mut retry = 0;

    loop {
        stats.attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                stats.success = true;
                if stats.attempts > 1 {
                    debug!("Request succeeded after {} attempts", stats.attempts);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };

        stats.last_error = Some(err.to_string());

        if !should_retry(&err) {
            return (Err(err), stats);
        }

        if retry >= policy.max_retries {
            warn!(
                "Giving up after {} attempts. Last error: {}",
                stats.attempts, err
            );
            return (Err(err), stats);
        }

        let delay = policy.delay_for(retry);
        stats.total_delay += delay;
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            stats.attempts,
            policy.max_attempts(),
            err,
            delay
        );
        tokio::time::sleep(delay).await;
        retry += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::new().with_backoff_factor(Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let (result, stats) = retry_async(
            &RetryPolicy::new(),
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("503".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            |_: &String| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.total_delay, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted() {
        let (result, stats) = retry_async(
            &RetryPolicy::new(),
            || async { Err::<u8, _>("502".to_string()) },
            |_: &String| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 4);
        assert!(!stats.success);
        assert_eq!(stats.last_error.as_deref(), Some("502"));
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let (result, stats) = retry_async(
            &RetryPolicy::new(),
            || async { Err::<u8, _>("404".to_string()) },
            |e: &String| e != "404",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.total_delay, Duration::ZERO);
    }
}
