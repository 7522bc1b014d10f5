//! Request throttling and retry for every outbound API call.
//!
//! [`RetryPolicy`] holds the pure parts (which failures are retryable, how
//! long to wait); [`Governor`] pairs it with one process-wide rate limiter and
//! runs the bounded attempt loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::arc::{ApiError, ErrorKind};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound for any single backoff delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// delay = base_delay_ms * 2^(attempt - 1), capped at max_delay_ms.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms)
    }

    /// Only transient network failures and rate limiting are worth another try.
    pub fn should_retry(err: &ApiError) -> bool {
        matches!(
            err.kind(),
            ErrorKind::TransientNetwork | ErrorKind::RateLimited
        )
    }

    /// Wait before retry number `attempt`, honouring a server `Retry-After`.
    pub fn backoff(&self, attempt: u32, err: &ApiError) -> Duration {
        let exponential = self.delay_for_attempt(attempt);
        let server = match err {
            ApiError::RateLimited {
                retry_after_ms: Some(ms),
            } => *ms,
            _ => 0,
        };
        Duration::from_millis(exponential.max(server))
    }
}

/// Global throttle plus retry loop. Cheap to clone; clones share the limiter.
#[derive(Clone)]
pub struct Governor {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    policy: RetryPolicy,
}

impl Governor {
    /// `min_interval` is the minimum spacing between any two calls; zero disables throttling.
    pub fn new(policy: RetryPolicy, min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(|q| Arc::new(RateLimiter::direct(q)));
        Self { limiter, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. In the last case the final error is wrapped in
    /// [`ApiError::RetriesExhausted`].
    pub async fn call<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut retries = 0;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !RetryPolicy::should_retry(&err) => return Err(err),
                Err(err) if retries >= self.policy.max_retries => {
                    return Err(ApiError::RetriesExhausted {
                        attempts: retries + 1,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    retries += 1;
                    let delay = self.policy.backoff(retries, &err);
                    warn!(
                        call = label,
                        retry = retries,
                        max = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying"
                    );
                    sleep(delay).await;
                    debug!(call = label, retry = retries, "retry starting");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        }
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let p = policy(5);
        assert_eq!(p.delay_for_attempt(1), 100);
        assert_eq!(p.delay_for_attempt(2), 200);
        assert_eq!(p.delay_for_attempt(3), 400);
        assert_eq!(p.delay_for_attempt(4), 800);
        assert_eq!(p.delay_for_attempt(5), 1_000);
        assert_eq!(p.delay_for_attempt(64), 1_000);
    }

    #[test]
    fn retryable_classification() {
        assert!(RetryPolicy::should_retry(&ApiError::Transient("reset".into())));
        assert!(RetryPolicy::should_retry(&ApiError::RateLimited { retry_after_ms: None }));
        assert!(!RetryPolicy::should_retry(&ApiError::NotFound("x".into())));
        assert!(!RetryPolicy::should_retry(&ApiError::Authentication {
            status: 401,
            message: "no".into()
        }));
        assert!(!RetryPolicy::should_retry(&ApiError::Conflict {
            status: 409,
            message: "no".into()
        }));
        assert!(!RetryPolicy::should_retry(&ApiError::Unexpected("x".into())));
    }

    #[test]
    fn backoff_honours_retry_after() {
        let p = policy(3);
        let err = ApiError::RateLimited {
            retry_after_ms: Some(5_000),
        };
        assert_eq!(p.backoff(1, &err), Duration::from_millis(5_000));
        let err = ApiError::Transient("x".into());
        assert_eq!(p.backoff(2, &err), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let gov = Governor::new(policy(3), Duration::ZERO);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = gov
            .call("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ApiError::Transient("reset".into()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_wraps_last_error() {
        let gov = Governor::new(policy(2), Duration::ZERO);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let err = gov
            .call("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ApiError::RateLimited { retry_after_ms: None })
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            ApiError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.kind(), ErrorKind::RateLimited);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let gov = Governor::new(policy(5), Duration::ZERO);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let err = gov
            .call("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ApiError::NotFound("gone".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn limiter_spaces_calls() {
        let gov = Governor::new(policy(0), Duration::from_millis(20));
        let start = Instant::now();
        for _ in 0..3 {
            gov.call("test", || async { Ok::<_, ApiError>(()) }).await.unwrap();
        }
        // First call passes immediately, the next two wait one period each.
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[tokio::test]
    async fn clones_share_one_limiter() {
        let gov = Governor::new(policy(0), Duration::from_millis(20));
        let other = gov.clone();
        let start = Instant::now();
        gov.call("a", || async { Ok::<_, ApiError>(()) }).await.unwrap();
        other.call("b", || async { Ok::<_, ApiError>(()) }).await.unwrap();
        gov.call("a", || async { Ok::<_, ApiError>(()) }).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(35));
    }
}
