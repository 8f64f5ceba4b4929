use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use hookrelay_core::RetryableEvent;
use hookrelay_delivery::{DynDeliverer, settle};
use hookrelay_executor::RetryPolicy;
use hookrelay_store::RetryStore;

use crate::config::{HookrelayConfig, WorkerConfig};
use crate::error::WorkerError;
use crate::transition::{RetryTransition, after, plan_transition};

/// Counts from one [`RetryWorker::process_retries`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Due events returned by the store.
    pub fetched: usize,
    /// Delivered on this attempt.
    pub succeeded: usize,
    /// Failed again and scheduled for a later retry.
    pub rescheduled: usize,
    /// Moved to the terminal failed state.
    pub permanently_failed: usize,
    /// Claimed by another worker.
    pub skipped: usize,
    /// Could not be processed because of a store error; left for a later batch.
    pub errors: usize,
}

enum Disposition {
    Succeeded,
    Rescheduled,
    PermanentlyFailed,
    Skipped,
}

/// Background worker that redelivers failed events whose retry time has come.
///
/// Each due event gets exactly one delivery attempt per batch; the persisted
/// schedule is the retry loop. Errors on one event are logged and counted
/// without affecting the rest of the batch.
pub struct RetryWorker {
    store: Arc<dyn RetryStore>,
    deliverer: Arc<dyn DynDeliverer>,
    policy: RetryPolicy,
    batch_size: usize,
    claim_lease: Option<Duration>,
}

impl RetryWorker {
    pub fn new(
        store: Arc<dyn RetryStore>,
        deliverer: Arc<dyn DynDeliverer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            deliverer,
            policy,
            batch_size: 50,
            claim_lease: None,
        }
    }

    /// Build a worker from the `[worker]` and `[retry]` sections.
    pub fn from_config(
        store: Arc<dyn RetryStore>,
        deliverer: Arc<dyn DynDeliverer>,
        config: &HookrelayConfig,
    ) -> Result<Self, WorkerError> {
        let mut worker = Self::new(store, deliverer, config.retry.policy()?)
            .with_batch_size(config.worker.batch_size);
        worker.claim_lease = config.worker.claim_lease();
        Ok(worker)
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Claim each event before delivering it, hiding it from other workers
    /// for `lease`.
    #[must_use]
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = Some(lease);
        self
    }

    /// Process one batch of events due now.
    pub async fn process_retries(&self) -> Result<RetryReport, WorkerError> {
        self.process_retries_at(Utc::now()).await
    }

    /// Process one batch of events due at `now`.
    ///
    /// Only a failure to fetch the batch is returned as an error.
    #[instrument(skip_all, fields(batch_size = self.batch_size, now = %now))]
    pub async fn process_retries_at(&self, now: DateTime<Utc>) -> Result<RetryReport, WorkerError> {
        let due = self.store.fetch_due_retries(now, self.batch_size).await?;
        let mut report = RetryReport {
            fetched: due.len(),
            ..RetryReport::default()
        };

        for event in &due {
            match self.process_event(event, now).await {
                Ok(Disposition::Succeeded) => report.succeeded += 1,
                Ok(Disposition::Rescheduled) => report.rescheduled += 1,
                Ok(Disposition::PermanentlyFailed) => report.permanently_failed += 1,
                Ok(Disposition::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(
                        event_id = %event.id,
                        webhook_id = %event.webhook_id,
                        error = %e,
                        "failed to process retry"
                    );
                    report.errors += 1;
                }
            }
        }

        if report.fetched > 0 {
            info!(
                fetched = report.fetched,
                succeeded = report.succeeded,
                rescheduled = report.rescheduled,
                permanently_failed = report.permanently_failed,
                skipped = report.skipped,
                errors = report.errors,
                "retry batch complete"
            );
        } else {
            debug!("no retries due");
        }
        Ok(report)
    }

    async fn process_event(
        &self,
        event: &RetryableEvent,
        now: DateTime<Utc>,
    ) -> Result<Disposition, WorkerError> {
        if let Some(lease) = self.claim_lease {
            let claimed = self
                .store
                .claim_retry(&event.id, event.retry_count, now, after(now, lease))
                .await?;
            if !claimed {
                debug!(event_id = %event.id, "retry already claimed by another worker");
                return Ok(Disposition::Skipped);
            }
        }

        let webhook = match self.store.lookup_webhook(&event.webhook_id).await? {
            Some(webhook) if webhook.enabled => webhook,
            found => {
                let reason = if found.is_some() {
                    format!("webhook {} is disabled", event.webhook_id)
                } else {
                    format!("webhook {} not found", event.webhook_id)
                };
                warn!(event_id = %event.id, reason = %reason, "abandoning retry");
                self.store
                    .mark_permanently_failed(&event.id, &reason, event.retry_count)
                    .await?;
                return Ok(Disposition::PermanentlyFailed);
            }
        };

        let started = Instant::now();
        let result = settle(self.deliverer.deliver(&webhook, event).await);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match plan_transition(event, &result, &self.policy, now) {
            RetryTransition::Processed { execution_id } => {
                self.store
                    .mark_processed(&event.id, execution_id.as_ref(), elapsed_ms)
                    .await?;
                info!(
                    event_id = %event.id,
                    retry_count = event.retry_count,
                    elapsed_ms,
                    "retry delivered"
                );
                Ok(Disposition::Succeeded)
            }
            RetryTransition::Reschedule {
                reason,
                retry_count,
                next_retry_at,
            } => {
                self.store
                    .schedule_retry(&event.id, &reason, retry_count, next_retry_at)
                    .await?;
                warn!(
                    event_id = %event.id,
                    retry_count,
                    next_retry_at = %next_retry_at,
                    error = %reason,
                    "retry failed, rescheduled"
                );
                Ok(Disposition::Rescheduled)
            }
            RetryTransition::PermanentlyFailed {
                reason,
                retry_count,
            } => {
                self.store
                    .mark_permanently_failed(&event.id, &reason, retry_count)
                    .await?;
                warn!(
                    event_id = %event.id,
                    retry_count,
                    error = %reason,
                    "retry failed permanently"
                );
                Ok(Disposition::PermanentlyFailed)
            }
        }
    }

    /// Run the polling loop as configured by `[worker]`.
    ///
    /// Returns [`WorkerError::Disabled`] straight away when `enabled` is off;
    /// otherwise behaves like [`start`](Self::start) with `poll_interval()`.
    pub async fn run(&self, config: &WorkerConfig, cancel: CancellationToken) -> WorkerError {
        if !config.enabled {
            info!("retry worker disabled, not starting");
            return WorkerError::Disabled;
        }
        self.start(config.poll_interval(), cancel).await
    }

    /// Run [`process_retries`](Self::process_retries) every `interval` until
    /// `cancel` fires. Returns why the loop stopped.
    ///
    /// The first batch runs immediately. A batch in progress finishes before
    /// cancellation is observed.
    pub async fn start(&self, interval: Duration, cancel: CancellationToken) -> WorkerError {
        if interval.is_zero() {
            return WorkerError::Config("poll interval must be greater than 0".into());
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = %interval.as_millis(), batch_size = self.batch_size, "retry worker started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("retry worker stopped");
                    return WorkerError::Cancelled;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.process_retries().await {
                        error!(error = %e, "retry batch failed");
                    }
                }
            }
        }
    }
}
