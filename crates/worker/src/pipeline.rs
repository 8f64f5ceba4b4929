use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use hookrelay_core::{DeliveryOutcome, RetryableEvent, Webhook};
use hookrelay_delivery::DynDeliverer;
use hookrelay_executor::{BoundedRetryExecutor, ExecuteError, RetryPolicy, delay};
use hookrelay_filter::{FilterOutcome, evaluate};
use hookrelay_store::{FilterSource, RetryStore};

use crate::config::HookrelayConfig;
use crate::error::WorkerError;
use crate::transition::after;

/// What happened to an event handed to [`DeliveryPipeline::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeResult {
    /// The webhook is disabled; nothing was stored.
    Skipped,
    /// Rejected by the webhook's filter rules.
    Filtered(FilterOutcome),
    /// Delivered within the inline retry budget.
    Delivered(DeliveryOutcome),
    /// Failed with a non-retryable error and stored as permanently failed.
    PermanentlyFailed(String),
    /// Inline retries exhausted; stored for the retry worker.
    Scheduled { next_retry_at: DateTime<Utc> },
}

/// Filters an incoming event, delivers it with bounded inline retries, and
/// persists the result so the [`RetryWorker`](crate::RetryWorker) can pick up
/// what is left.
pub struct DeliveryPipeline {
    store: Arc<dyn RetryStore>,
    filters: Arc<dyn FilterSource>,
    deliverer: Arc<dyn DynDeliverer>,
    executor: BoundedRetryExecutor,
    retry_policy: RetryPolicy,
}

impl DeliveryPipeline {
    pub fn new(
        store: Arc<dyn RetryStore>,
        filters: Arc<dyn FilterSource>,
        deliverer: Arc<dyn DynDeliverer>,
        executor: BoundedRetryExecutor,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            filters,
            deliverer,
            executor,
            retry_policy,
        }
    }

    /// Build a pipeline from the `[inline_retry]` and `[retry]` sections.
    pub fn from_config(
        store: Arc<dyn RetryStore>,
        filters: Arc<dyn FilterSource>,
        deliverer: Arc<dyn DynDeliverer>,
        config: &HookrelayConfig,
    ) -> Result<Self, WorkerError> {
        Ok(Self::new(
            store,
            filters,
            deliverer,
            config.inline_retry.executor()?,
            config.retry.policy()?,
        ))
    }

    /// Handle a freshly received event for `webhook`.
    ///
    /// The event's `max_retries` is taken from the webhook. Filter errors and
    /// store errors are returned; cancellation during delivery returns
    /// [`WorkerError::Cancelled`] without storing anything.
    #[instrument(skip_all, fields(event_id = %event.id, webhook_id = %webhook.id))]
    pub async fn handle(
        &self,
        webhook: &Webhook,
        mut event: RetryableEvent,
        cancel: &CancellationToken,
    ) -> Result<IntakeResult, WorkerError> {
        if !webhook.enabled {
            debug!("webhook disabled, skipping event");
            return Ok(IntakeResult::Skipped);
        }
        event.max_retries = webhook.max_retries;

        let rules = self.filters.rules_for_webhook(&webhook.id).await?;
        let verdict = evaluate(&rules, &event.payload)?;
        if !verdict.passed {
            info!(reason = %verdict.reason, "event filtered");
            self.store
                .record_filtered(event.into_filtered(verdict.reason.clone()))
                .await?;
            return Ok(IntakeResult::Filtered(verdict));
        }
        debug!(reason = %verdict.reason, "filters passed");

        let started = Instant::now();
        let deliverer = self.deliverer.as_ref();
        let pending = &event;
        let result = self
            .executor
            .execute(cancel, || deliverer.deliver(webhook, pending))
            .await;

        match result {
            Ok(outcome) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.store
                    .record_processed(event.into_processed(outcome.execution_id.clone(), elapsed_ms))
                    .await?;
                info!(elapsed_ms, "event delivered");
                Ok(IntakeResult::Delivered(outcome))
            }
            Err(ExecuteError::Cancelled) => Err(WorkerError::Cancelled),
            Err(ExecuteError::Permanent(err)) => {
                let reason = err.to_string();
                self.fail_permanently(event, reason).await
            }
            Err(err @ ExecuteError::MaxAttemptsExceeded { .. }) => {
                let reason = err.to_string();
                if webhook.max_retries == 0 {
                    return self.fail_permanently(event, reason).await;
                }
                let next_retry_at = after(Utc::now(), delay(0, &self.retry_policy));
                self.store
                    .record_failed_delivery(event.into_pending_retry(reason.as_str(), next_retry_at))
                    .await?;
                warn!(error = %reason, next_retry_at = %next_retry_at, "inline retries exhausted, scheduled");
                Ok(IntakeResult::Scheduled { next_retry_at })
            }
        }
    }

    async fn fail_permanently(
        &self,
        event: RetryableEvent,
        reason: String,
    ) -> Result<IntakeResult, WorkerError> {
        self.store
            .record_failed_delivery(event.into_permanently_failed(reason.as_str()))
            .await?;
        warn!(error = %reason, "delivery failed permanently");
        Ok(IntakeResult::PermanentlyFailed(reason))
    }
}
