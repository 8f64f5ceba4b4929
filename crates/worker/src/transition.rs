use std::time::Duration;

use chrono::{DateTime, Utc};
use hookrelay_core::{DeliveryOutcome, ExecutionId, RetryableEvent};
use hookrelay_delivery::DeliveryError;
use hookrelay_executor::{RetryPolicy, delay};

/// State change to apply to a pending event after one delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryTransition {
    /// Delivered; clear the retry schedule.
    Processed { execution_id: Option<ExecutionId> },
    /// Retryable failure with retries left.
    Reschedule {
        reason: String,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// Non-retryable failure, or retries exhausted. `retry_count` is the count
    /// to persist, never above `max_retries`.
    PermanentlyFailed { reason: String, retry_count: u32 },
}

/// Decide what happens to `event` given the result of delivering it at `now`.
///
/// A retryable failure increments the retry count. Once the incremented count
/// reaches `max_retries` the event fails permanently with that count (capped
/// at `max_retries`); otherwise it is
/// rescheduled `delay(retry_count)` after `now`. Applying the returned
/// transition never breaks the [`RetryableEvent`] invariants.
pub fn plan_transition(
    event: &RetryableEvent,
    result: &Result<DeliveryOutcome, DeliveryError>,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> RetryTransition {
    let (reason, retryable) = match result {
        Ok(outcome) if outcome.success => {
            return RetryTransition::Processed {
                execution_id: outcome.execution_id.clone(),
            };
        }
        Ok(outcome) => (outcome.describe(), outcome.is_retryable()),
        Err(err) => (err.to_string(), err.is_retryable()),
    };

    if !retryable {
        return RetryTransition::PermanentlyFailed {
            reason,
            retry_count: event.retry_count,
        };
    }

    let retry_count = event.retry_count.saturating_add(1);
    if retry_count >= event.max_retries {
        return RetryTransition::PermanentlyFailed {
            reason: format!("max retries ({}) exceeded: {reason}", event.max_retries),
            retry_count: retry_count.min(event.max_retries.max(event.retry_count)),
        };
    }

    RetryTransition::Reschedule {
        reason,
        retry_count,
        next_retry_at: after(now, delay(retry_count, policy)),
    }
}

/// `now + wait`, saturating at the latest representable time.
pub(crate) fn after(now: DateTime<Utc>, wait: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(wait)
        .ok()
        .and_then(|wait| now.checked_add_signed(wait))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use hookrelay_core::{ExecutionId, FailureKind};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(
            u32::MAX,
            Duration::from_secs(1),
            Duration::from_secs(3600),
            2.0,
            0.0,
        )
        .unwrap()
    }

    fn pending(retry_count: u32, max_retries: u32) -> RetryableEvent {
        let now = Utc::now();
        let mut event = RetryableEvent::new("evt-1", "wh-1", serde_json::json!({}), max_retries, now)
            .into_pending_retry("timeout", now);
        event.retry_count = retry_count;
        event
    }

    fn apply(event: RetryableEvent, transition: &RetryTransition) -> RetryableEvent {
        match transition {
            RetryTransition::Processed { execution_id } => {
                event.into_processed(execution_id.clone(), 10)
            }
            RetryTransition::Reschedule {
                reason,
                retry_count,
                next_retry_at,
            } => {
                let mut event = event;
                event.retry_count = *retry_count;
                event.retry_error = Some(reason.clone());
                event.next_retry_at = Some(*next_retry_at);
                event
            }
            RetryTransition::PermanentlyFailed {
                reason,
                retry_count,
            } => {
                let mut event = event.into_permanently_failed(reason);
                event.retry_count = *retry_count;
                event
            }
        }
    }

    #[test]
    fn success_is_processed() {
        let outcome = DeliveryOutcome::success(200).with_execution_id(ExecutionId::new("exec-9"));
        let transition = plan_transition(&pending(1, 3), &Ok(outcome), &policy(), Utc::now());
        assert_eq!(
            transition,
            RetryTransition::Processed {
                execution_id: Some(ExecutionId::new("exec-9"))
            }
        );
    }

    #[test]
    fn retryable_failure_reschedules_with_backoff() {
        let now = Utc::now();
        let event = pending(0, 3);
        let transition = plan_transition(&event, &Err(DeliveryError::RateLimited), &policy(), now);
        match &transition {
            RetryTransition::Reschedule {
                reason,
                retry_count,
                next_retry_at,
            } => {
                assert_eq!(reason, "rate limited");
                assert_eq!(*retry_count, 1);
                assert_eq!(*next_retry_at, now + chrono::Duration::seconds(2));
            }
            other => panic!("expected reschedule, got {other:?}"),
        }
        assert!(apply(event, &transition).invariant_violation().is_none());
    }

    #[test]
    fn reaching_max_retries_is_permanent() {
        let event = pending(2, 3);
        let transition = plan_transition(
            &event,
            &Err(DeliveryError::Timeout(Duration::from_secs(5))),
            &policy(),
            Utc::now(),
        );
        match &transition {
            RetryTransition::PermanentlyFailed {
                reason,
                retry_count,
            } => {
                assert!(reason.starts_with("max retries (3) exceeded"), "{reason}");
                assert_eq!(*retry_count, 3);
            }
            other => panic!("expected permanent failure, got {other:?}"),
        }
        let applied = apply(event, &transition);
        assert_eq!(applied.retry_count, 3);
        assert!(applied.permanently_failed);
        assert!(applied.next_retry_at.is_none());
        assert!(applied.invariant_violation().is_none());
    }

    #[test]
    fn auth_failure_is_permanent_immediately() {
        let outcome = DeliveryOutcome::failure(401, Some(FailureKind::AuthFailed));
        let transition = plan_transition(&pending(1, 5), &Ok(outcome), &policy(), Utc::now());
        assert!(matches!(
            transition,
            RetryTransition::PermanentlyFailed { retry_count: 1, .. }
        ));
    }

    #[test]
    fn unclassified_server_error_is_retried() {
        let outcome = DeliveryOutcome::failure(503, None).with_body("busy");
        let transition = plan_transition(&pending(0, 5), &Ok(outcome), &policy(), Utc::now());
        match transition {
            RetryTransition::Reschedule { reason, .. } => {
                assert_eq!(reason, "server error (status 503): busy");
            }
            other => panic!("expected reschedule, got {other:?}"),
        }
    }

    #[test]
    fn zero_max_retries_never_reschedules() {
        let event = pending(0, 0);
        let transition = plan_transition(
            &event,
            &Err(DeliveryError::Connection("reset".into())),
            &policy(),
            Utc::now(),
        );
        assert!(matches!(
            transition,
            RetryTransition::PermanentlyFailed { retry_count: 0, .. }
        ));
        assert!(apply(event, &transition).invariant_violation().is_none());
    }

    #[test]
    fn after_saturates() {
        let now = Utc::now();
        assert_eq!(after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(after(now, Duration::from_secs(1)), now + chrono::Duration::seconds(1));
    }
}
