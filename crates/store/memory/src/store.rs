use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use hookrelay_core::{EventId, ExecutionId, RetryableEvent, Webhook, WebhookId};
use hookrelay_filter::FilterRule;
use hookrelay_store::{FilterSource, RetryStore, StoreError};

/// In-memory [`RetryStore`] and [`FilterSource`] backed by [`DashMap`]s.
///
/// Each event update takes the entry's shard lock, so single-event
/// operations (including [`RetryStore::claim_retry`]) are atomic. Fetching
/// due events scans every entry and is meant for tests and small
/// deployments.
#[derive(Debug, Default)]
pub struct MemoryRetryStore {
    events: DashMap<EventId, RetryableEvent>,
    webhooks: DashMap<WebhookId, Webhook>,
    rules: DashMap<WebhookId, Vec<FilterRule>>,
}

impl MemoryRetryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a webhook.
    pub fn insert_webhook(&self, webhook: Webhook) {
        self.webhooks.insert(webhook.id.clone(), webhook);
    }

    pub fn remove_webhook(&self, webhook_id: &WebhookId) -> Option<Webhook> {
        self.webhooks.remove(webhook_id).map(|(_, webhook)| webhook)
    }

    /// Replace the filter rules of a webhook.
    pub fn set_rules(&self, webhook_id: impl Into<WebhookId>, rules: Vec<FilterRule>) {
        self.rules.insert(webhook_id.into(), rules);
    }

    /// Insert an event as-is, overwriting any previous version.
    pub fn insert_event(&self, event: RetryableEvent) {
        self.events.insert(event.id.clone(), event);
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn update<F>(&self, event_id: &EventId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut RetryableEvent),
    {
        let mut entry = self
            .events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))?;
        apply(entry.value_mut());
        Ok(())
    }
}

#[async_trait]
impl RetryStore for MemoryRetryStore {
    async fn fetch_due_retries(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<Vec<RetryableEvent>, StoreError> {
        let mut due: Vec<RetryableEvent> = self
            .events
            .iter()
            .filter(|entry| entry.value().is_due(now))
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by(|a, b| {
            a.next_retry_at
                .cmp(&b.next_retry_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(batch_size);
        debug!(count = due.len(), batch_size, "fetched due retries");
        Ok(due)
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        execution_id: Option<&ExecutionId>,
        elapsed_ms: u64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        self.update(event_id, |event| {
            *event = event.clone().into_processed(execution_id.cloned(), elapsed_ms);
            event.last_retry_at = Some(now);
        })
    }

    async fn mark_permanently_failed(
        &self,
        event_id: &EventId,
        reason: &str,
        retry_count: u32,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        self.update(event_id, |event| {
            *event = event.clone().into_permanently_failed(reason);
            event.retry_count = retry_count;
            event.last_retry_at = Some(now);
        })
    }

    async fn schedule_retry(
        &self,
        event_id: &EventId,
        reason: &str,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        self.update(event_id, |event| {
            event.retry_count = retry_count;
            event.retry_error = Some(reason.to_owned());
            event.next_retry_at = Some(next_retry_at);
            event.last_retry_at = Some(now);
        })
    }

    async fn lookup_webhook(&self, webhook_id: &WebhookId) -> Result<Option<Webhook>, StoreError> {
        Ok(self.webhooks.get(webhook_id).map(|w| w.value().clone()))
    }

    async fn record_failed_delivery(&self, event: RetryableEvent) -> Result<(), StoreError> {
        self.insert_event(event);
        Ok(())
    }

    async fn record_processed(&self, event: RetryableEvent) -> Result<(), StoreError> {
        self.insert_event(event);
        Ok(())
    }

    async fn record_filtered(&self, event: RetryableEvent) -> Result<(), StoreError> {
        self.insert_event(event);
        Ok(())
    }

    async fn get_event(&self, event_id: &EventId) -> Result<Option<RetryableEvent>, StoreError> {
        Ok(self.events.get(event_id).map(|e| e.value().clone()))
    }

    async fn claim_retry(
        &self,
        event_id: &EventId,
        expected_retry_count: u32,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // The write guard holds the shard lock for the whole check-then-set.
        let Some(mut entry) = self.events.get_mut(event_id) else {
            return Ok(false);
        };
        let event = entry.value_mut();
        if !event.is_due(now) || event.retry_count != expected_retry_count {
            return Ok(false);
        }
        event.next_retry_at = Some(lease_until);
        Ok(true)
    }
}

#[async_trait]
impl FilterSource for MemoryRetryStore {
    async fn rules_for_webhook(&self, webhook_id: &WebhookId) -> Result<Vec<FilterRule>, StoreError> {
        Ok(self
            .rules
            .get(webhook_id)
            .map(|rules| rules.value().clone())
            .unwrap_or_default())
    }
}
