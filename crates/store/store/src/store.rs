use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hookrelay_core::{EventId, ExecutionId, RetryableEvent, Webhook, WebhookId};
use hookrelay_filter::FilterRule;

use crate::error::StoreError;

/// Persistence for webhook events and their retry state.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Methods that update an existing event return [`StoreError::NotFound`]
/// when the event is unknown.
#[async_trait]
pub trait RetryStore: Send + Sync {
    /// Events pending retry whose `next_retry_at` is at or before `now`,
    /// earliest first, at most `batch_size` of them.
    async fn fetch_due_retries(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<Vec<RetryableEvent>, StoreError>;

    /// Mark an event delivered, clearing its retry schedule and error.
    async fn mark_processed(
        &self,
        event_id: &EventId,
        execution_id: Option<&ExecutionId>,
        elapsed_ms: u64,
    ) -> Result<(), StoreError>;

    /// Mark an event as terminally failed with its final retry count. It will
    /// never be fetched again.
    async fn mark_permanently_failed(
        &self,
        event_id: &EventId,
        reason: &str,
        retry_count: u32,
    ) -> Result<(), StoreError>;

    /// Keep an event pending with an updated count, error, and retry time.
    async fn schedule_retry(
        &self,
        event_id: &EventId,
        reason: &str,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Look up the webhook owning an event. `None` if it no longer exists.
    async fn lookup_webhook(&self, webhook_id: &WebhookId) -> Result<Option<Webhook>, StoreError>;

    /// Persist a freshly received event whose first delivery failed.
    async fn record_failed_delivery(&self, event: RetryableEvent) -> Result<(), StoreError>;

    /// Persist a freshly received event that was delivered.
    async fn record_processed(&self, event: RetryableEvent) -> Result<(), StoreError>;

    /// Persist a freshly received event rejected by its filters.
    async fn record_filtered(&self, event: RetryableEvent) -> Result<(), StoreError>;

    async fn get_event(&self, event_id: &EventId) -> Result<Option<RetryableEvent>, StoreError>;

    /// Claim a due event for processing by pushing its `next_retry_at` to
    /// `lease_until`, but only if it is still pending, due at `now`, and at
    /// `expected_retry_count`. Returns `true` if this caller owns the event.
    ///
    /// Stores without conditional updates keep the default, which always
    /// grants the claim and leaves concurrent workers free to race.
    async fn claim_retry(
        &self,
        _event_id: &EventId,
        _expected_retry_count: u32,
        _now: DateTime<Utc>,
        _lease_until: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// Source of filter rules configured per webhook.
#[async_trait]
pub trait FilterSource: Send + Sync {
    /// All rules for the webhook, enabled or not. Empty if none are configured.
    async fn rules_for_webhook(&self, webhook_id: &WebhookId) -> Result<Vec<FilterRule>, StoreError>;
}
