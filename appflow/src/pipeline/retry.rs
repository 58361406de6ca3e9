//! Bounded retry with a fixed delay between attempts.
//!
//! The delay is constant across attempts; there is no backoff and no jitter.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry budget and delay for one operation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Re-attempts permitted after the first attempt.
    pub retries: usize,
    /// Delay after each failed attempt, in milliseconds.
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Creates a policy with `retries` re-attempts and a fixed `delay`.
    #[must_use]
    pub fn new(retries: usize, delay: Duration) -> Self {
        Self {
            retries,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// A policy that re-issues immediately after a failure.
    #[must_use]
    pub fn immediate(retries: usize) -> Self {
        Self { retries, delay_ms: 0 }
    }

    /// A policy that tries exactly once.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// The delay as a `Duration`.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Upper bound on attempts under this policy.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.retries.saturating_add(1)
    }
}

/// Per-instance retry bookkeeping.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Retries consumed so far.
    pub retries_used: usize,
}

impl RetryState {
    /// Creates a fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts issued so far, assuming the current one has completed.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.retries_used + 1
    }

    /// Returns true once the budget is spent.
    #[must_use]
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.retries_used >= policy.retries
    }

    /// Decides what to do after a failed attempt, consuming one retry if granted.
    pub fn next(&mut self, policy: &RetryPolicy, retryable: bool) -> RetryDecision {
        if !retryable {
            return RetryDecision::NotRetryable;
        }
        if self.is_exhausted(policy) {
            return RetryDecision::GiveUp;
        }
        self.retries_used += 1;
        RetryDecision::Retry(policy.delay())
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

/// Runs `operation` and re-issues it after every failure until it succeeds or
/// the policy's budget is spent. The last failure is returned unchanged.
pub async fn retry_with_delay<T, E, F, Fut>(
    policy: &RetryPolicy,
    key: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_delay_if(policy, key, operation, |_| true).await
}

/// Like [`retry_with_delay`], but failures for which `is_retryable` returns
/// false end the loop immediately.
pub async fn retry_with_delay_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    key: &str,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut state = RetryState::new();

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => match state.next(policy, is_retryable(&e)) {
                RetryDecision::Retry(delay) => {
                    tracing::debug!(
                        key,
                        attempt = state.retries_used,
                        retries = policy.retries,
                        delay_ms = policy.delay_ms,
                        error = %e,
                        "Retrying after error"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryDecision::GiveUp => {
                    tracing::debug!(
                        key,
                        attempts = state.attempts(),
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }
                RetryDecision::NotRetryable => {
                    tracing::debug!(key, error = %e, "Error is not retryable");
                    return Err(e);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::none().with_retries(40).with_delay_ms(2000);

        assert_eq!(policy.retries, 40);
        assert_eq!(policy.delay(), Duration::from_secs(2));
        assert_eq!(policy.max_attempts(), 41);
        assert_eq!(policy, RetryPolicy::new(40, Duration::from_secs(2)));
    }

    #[test]
    fn test_retry_state_decisions() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let mut state = RetryState::new();

        assert_eq!(state.next(&policy, true), RetryDecision::Retry(Duration::from_millis(10)));
        assert_eq!(state.next(&policy, true), RetryDecision::Retry(Duration::from_millis(10)));
        assert_eq!(state.next(&policy, true), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 3);
    }

    #[test]
    fn test_retry_state_not_retryable_keeps_budget() {
        let policy = RetryPolicy::immediate(3);
        let mut state = RetryState::new();

        assert_eq!(state.next(&policy, false), RetryDecision::NotRetryable);
        assert_eq!(state.retries_used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try_has_no_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2));
        let calls = counter();
        let start = Instant::now();

        let c = calls.clone();
        let result: Result<i32, String> = retry_with_delay(&policy, "test", || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(200));
        let calls = counter();
        let start = Instant::now();

        let c = calls.clone();
        let result: Result<i32, String> = retry_with_delay(&policy, "test", || {
            let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(format!("attempt {attempt}"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_is_bounded() {
        for retries in 0..4 {
            let policy = RetryPolicy::new(retries, Duration::from_millis(100));
            let calls = counter();
            let start = Instant::now();

            let c = calls.clone();
            let result: Result<(), String> = retry_with_delay(&policy, "test", || {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {attempt}")) }
            })
            .await;

            // Last failure surfaces unchanged.
            assert_eq!(result, Err(format!("failure {}", retries + 1)));
            assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
            assert!(start.elapsed() >= Duration::from_millis(100) * retries as u32);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_behaves_like_direct_call() {
        let policy = RetryPolicy::new(0, Duration::from_secs(10));
        let calls = counter();
        let start = Instant::now();

        let c = calls.clone();
        let result: Result<(), &str> = retry_with_delay(&policy, "test", || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;

        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = counter();

        let c = calls.clone();
        let result: Result<(), String> = retry_with_delay_if(
            &policy,
            "test",
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
            |e| e != "fatal",
        )
        .await;

        assert_eq!(result, Err("fatal".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
