use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, ExecutionId, WebhookId};

/// Lifecycle status of a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Accepted, not yet filtered or delivered.
    Received,
    /// Delivered successfully.
    Processed,
    /// Rejected by the webhook's filter rules.
    Filtered,
    /// Delivery failed; see `permanently_failed` for whether it will be retried.
    Failed,
}

/// A webhook event together with its persisted retry bookkeeping.
///
/// Invariants upheld by every constructor and transition in this crate:
/// - `permanently_failed` implies `next_retry_at.is_none()`
/// - `retry_count <= max_retries`
/// - a `Processed` event has no `next_retry_at` and is not permanently failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryableEvent {
    pub id: EventId,
    pub webhook_id: WebhookId,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub retry_error: Option<String>,
    pub permanently_failed: bool,
    #[serde(default)]
    pub execution_id: Option<ExecutionId>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    pub received_at: DateTime<Utc>,
}

impl RetryableEvent {
    /// Create a freshly received event.
    pub fn new(
        id: impl Into<EventId>,
        webhook_id: impl Into<WebhookId>,
        payload: serde_json::Value,
        max_retries: u32,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            webhook_id: webhook_id.into(),
            payload,
            status: EventStatus::Received,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            last_retry_at: None,
            retry_error: None,
            permanently_failed: false,
            execution_id: None,
            elapsed_ms: None,
            received_at,
        }
    }

    /// Turn a received event into a failed one awaiting its first retry.
    #[must_use]
    pub fn into_pending_retry(
        mut self,
        reason: impl Into<String>,
        next_retry_at: DateTime<Utc>,
    ) -> Self {
        self.status = EventStatus::Failed;
        self.retry_count = 0;
        self.retry_error = Some(reason.into());
        self.next_retry_at = Some(next_retry_at);
        self.permanently_failed = false;
        self
    }

    /// Turn an event into a terminally failed one.
    #[must_use]
    pub fn into_permanently_failed(mut self, reason: impl Into<String>) -> Self {
        self.status = EventStatus::Failed;
        self.retry_error = Some(reason.into());
        self.next_retry_at = None;
        self.permanently_failed = true;
        self
    }

    /// Turn an event into a successfully processed one.
    #[must_use]
    pub fn into_processed(mut self, execution_id: Option<ExecutionId>, elapsed_ms: u64) -> Self {
        self.status = EventStatus::Processed;
        self.next_retry_at = None;
        self.retry_error = None;
        self.permanently_failed = false;
        self.execution_id = execution_id;
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    /// Turn an event into one rejected by its filters.
    #[must_use]
    pub fn into_filtered(mut self, reason: impl Into<String>) -> Self {
        self.status = EventStatus::Filtered;
        self.retry_error = Some(reason.into());
        self.next_retry_at = None;
        self
    }

    /// Failed, not permanent, and scheduled for another attempt.
    pub fn is_pending_retry(&self) -> bool {
        self.status == EventStatus::Failed
            && !self.permanently_failed
            && self.next_retry_at.is_some()
    }

    /// Pending and its retry time has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending_retry() && self.next_retry_at.is_some_and(|at| at <= now)
    }

    /// No further automatic processing will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EventStatus::Processed | EventStatus::Filtered)
            || self.permanently_failed
    }

    /// Returns the first violated invariant, if any.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        if self.permanently_failed && self.next_retry_at.is_some() {
            return Some("permanently failed event still has a next retry time");
        }
        if self.retry_count > self.max_retries {
            return Some("retry count exceeds max retries");
        }
        if self.status == EventStatus::Processed
            && (self.next_retry_at.is_some() || self.permanently_failed)
        {
            return Some("processed event still carries retry state");
        }
        None
    }
}
