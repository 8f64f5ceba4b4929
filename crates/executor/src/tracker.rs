use chrono::{DateTime, Utc};
use hookrelay_delivery::DeliveryError;

/// Bookkeeping for a single logical operation across its attempts.
///
/// Callers that want to inspect what happened after
/// [`BoundedRetryExecutor::execute_tracked`](crate::BoundedRetryExecutor::execute_tracked)
/// returns pass one of these in.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    attempts: u32,
    last_failure: Option<DeliveryError>,
    next_retry_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            last_failure: None,
            next_retry_at: None,
            created_at: Utc::now(),
        }
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_failure(&self) -> Option<&DeliveryError> {
        self.last_failure.as_ref()
    }

    /// When the next attempt is planned, `None` once the operation settled.
    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.next_retry_at = None;
    }

    pub(crate) fn record_failure(&mut self, err: &DeliveryError) {
        self.last_failure = Some(err.clone());
    }

    pub(crate) fn schedule(&mut self, at: DateTime<Utc>) {
        self.next_retry_at = Some(at);
    }
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let tracker = RetryTracker::new();
        assert_eq!(tracker.attempts(), 0);
        assert!(tracker.last_failure().is_none());
        assert!(tracker.next_retry_at().is_none());
        assert!(tracker.created_at() <= Utc::now());
    }

    #[test]
    fn attempt_clears_schedule() {
        let mut tracker = RetryTracker::new();
        tracker.begin_attempt();
        tracker.record_failure(&DeliveryError::RateLimited);
        tracker.schedule(Utc::now());
        assert!(tracker.next_retry_at().is_some());

        tracker.begin_attempt();
        assert_eq!(tracker.attempts(), 2);
        assert!(tracker.next_retry_at().is_none());
        assert!(matches!(
            tracker.last_failure(),
            Some(DeliveryError::RateLimited)
        ));
    }
}
