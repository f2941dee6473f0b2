//! Transient-failure retry interceptor for outbound RPC calls.
//!
//! Wraps any `tower::Service` whose error classifies itself through
//! [`Transient`]. Only transient failures are re-attempted; everything else
//! is returned from the first attempt untouched.

use std::time::Duration;

use rand::Rng;
use tower::retry::{Policy, RetryLayer};

use super::catalog::PEER_CALL_RETRIES;

/// Classifies an error as worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retry policy with exponential, jittered backoff.
///
/// Each call gets its own copy of the policy, so `attempts` counts retries of
/// one request only.
#[derive(Debug, Clone)]
pub struct TransientRetryPolicy {
    max_retries: u32,
    attempts: u32,
    base_backoff: Duration,
}

impl TransientRetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            attempts: 0,
            base_backoff,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus up to `base` of jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff.saturating_mul(1u32 << attempt.saturating_sub(1).min(10));
        let base_ms = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter = if base_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=base_ms)
        };
        exp.saturating_add(Duration::from_millis(jitter))
    }
}

impl Default for TransientRetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

impl<Req, Res, E> Policy<Req, Res, E> for TransientRetryPolicy
where
    Req: Clone,
    E: Transient + std::fmt::Display,
{
    type Future = tokio::time::Sleep;

    fn retry(&mut self, _req: &mut Req, result: &mut Result<Res, E>) -> Option<Self::Future> {
        let Err(error) = result else {
            return None;
        };
        if !error.is_transient() || self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;
        let delay = self.backoff(self.attempts);
        tracing::debug!(
            attempt = self.attempts,
            max_retries = self.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            %error,
            "retrying transient failure"
        );
        metrics::counter!(PEER_CALL_RETRIES).increment(1);
        Some(tokio::time::sleep(delay))
    }

    fn clone_request(&mut self, req: &Req) -> Option<Req> {
        Some(req.clone())
    }
}

/// Layer applying [`TransientRetryPolicy`].
#[must_use]
pub fn retry_layer(max_retries: u32, base_backoff: Duration) -> RetryLayer<TransientRetryPolicy> {
    RetryLayer::new(TransientRetryPolicy::new(max_retries, base_backoff))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tower::{Layer, ServiceExt};

    use super::*;

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum TestError {
        #[error("connection reset")]
        Reset,
        #[error("bad request")]
        Rejected,
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Reset)
        }
    }

    /// A service that fails with `error` for the first `failures` calls.
    fn flaky(
        failures: u32,
        error: fn() -> TestError,
        calls: Arc<AtomicU32>,
    ) -> impl tower::Service<u32, Response = &'static str, Error = TestError> + Clone {
        tower::service_fn(move |_req: u32| {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < failures {
                    Err(error())
                } else {
                    Ok("done")
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = retry_layer(3, Duration::from_millis(10)).layer(flaky(2, || TestError::Reset, calls.clone()));

        assert_eq!(svc.oneshot(7).await, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = retry_layer(2, Duration::from_millis(10)).layer(flaky(10, || TestError::Reset, calls.clone()));

        assert_eq!(svc.oneshot(7).await, Err(TestError::Reset));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_pass_through_after_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = retry_layer(5, Duration::from_millis(10)).layer(flaky(1, || TestError::Rejected, calls.clone()));

        assert_eq!(svc.oneshot(7).await, Err(TestError::Rejected));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_with_bounded_jitter() {
        let policy = TransientRetryPolicy::new(3, Duration::from_millis(10));
        for attempt in 1..=3u32 {
            let delay = policy.backoff(attempt);
            let floor = Duration::from_millis(10 * (1 << (attempt - 1)));
            assert!(delay >= floor && delay <= floor + Duration::from_millis(10));
        }
    }
}
