use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hookrelay_core::DeliveryOutcome;
use hookrelay_delivery::{DeliveryError, settle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::backoff::{JitterSource, ThreadRngJitter, delay_with_jitter};
use crate::error::ExecuteError;
use crate::policy::RetryPolicy;
use crate::tracker::RetryTracker;

/// Runs a fallible delivery operation up to `max_attempts` times within the
/// current request, sleeping a jittered backoff delay between attempts.
///
/// Non-retryable failures are returned immediately. The caller can cancel
/// via a [`CancellationToken`]; it is observed before every attempt and while
/// sleeping between attempts.
pub struct BoundedRetryExecutor {
    policy: RetryPolicy,
    jitter: Arc<dyn JitterSource>,
    attempt_timeout: Option<Duration>,
}

impl BoundedRetryExecutor {
    /// Create an executor that draws jitter from the thread-local RNG.
    ///
    /// # Examples
    ///
    /// ```
    /// use hookrelay_executor::{BoundedRetryExecutor, RetryPolicy};
    ///
    /// let executor = BoundedRetryExecutor::new(RetryPolicy::default());
    /// assert_eq!(executor.policy().max_attempts(), 3);
    /// ```
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            jitter: Arc::new(ThreadRngJitter),
            attempt_timeout: None,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Bound each individual attempt. An attempt that overruns counts as a
    /// [`DeliveryError::Timeout`], which is retryable.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires.
    pub async fn execute<F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<DeliveryOutcome, ExecuteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<DeliveryOutcome, DeliveryError>>,
    {
        let mut tracker = RetryTracker::new();
        self.execute_tracked(cancel, &mut tracker, operation).await
    }

    /// Like [`execute`](Self::execute), recording attempts in `tracker`.
    #[instrument(
        skip_all,
        fields(max_attempts = self.policy.max_attempts(), attempt)
    )]
    pub async fn execute_tracked<F, Fut>(
        &self,
        cancel: &CancellationToken,
        tracker: &mut RetryTracker,
        mut operation: F,
    ) -> Result<DeliveryOutcome, ExecuteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<DeliveryOutcome, DeliveryError>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!(attempt, "cancelled before attempt");
                return Err(ExecuteError::Cancelled);
            }

            tracing::Span::current().record("attempt", attempt);
            tracker.begin_attempt();

            let result = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, operation())
                    .await
                    .unwrap_or(Err(DeliveryError::Timeout(limit))),
                None => operation().await,
            };

            let err = match settle(result) {
                Ok(outcome) => {
                    debug!(attempt, status = outcome.status_code, "attempt succeeded");
                    return Ok(outcome);
                }
                Err(err) => err,
            };
            tracker.record_failure(&err);

            if !err.is_retryable() {
                warn!(attempt, error = %err, "permanent failure, not retrying");
                return Err(ExecuteError::Permanent(err));
            }

            let delay = delay_with_jitter(attempt, &self.policy, self.jitter.as_ref());
            attempt += 1;
            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %err, "retry attempts exhausted");
                return Err(ExecuteError::MaxAttemptsExceeded {
                    attempts: attempt,
                    last: err,
                });
            }

            if let Ok(wait) = chrono::Duration::from_std(delay) {
                tracker.schedule(Utc::now() + wait);
            }
            warn!(
                attempt,
                error = %err,
                delay_ms = %delay.as_millis(),
                "retryable failure, will retry"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt, "cancelled while waiting to retry");
                    return Err(ExecuteError::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
