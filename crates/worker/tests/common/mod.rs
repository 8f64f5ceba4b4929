#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hookrelay_core::{DeliveryOutcome, ExecutionId, RetryableEvent, Webhook};
use hookrelay_delivery::{Deliverer, DeliveryError};
use hookrelay_executor::RetryPolicy;

/// Deliverer that replays a queue of canned results, then succeeds.
pub struct ScriptedDeliverer {
    script: Mutex<VecDeque<Result<DeliveryOutcome, DeliveryError>>>,
    fallback: Option<Result<DeliveryOutcome, DeliveryError>>,
    calls: AtomicU32,
}

impl ScriptedDeliverer {
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Result<DeliveryOutcome, DeliveryError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns `result` on every call.
    pub fn always(result: Result<DeliveryOutcome, DeliveryError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(result),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Deliverer for ScriptedDeliverer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn deliver(
        &self,
        _webhook: &Webhook,
        _event: &RetryableEvent,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => self.fallback.clone().unwrap_or_else(|| {
                Ok(DeliveryOutcome::success(200).with_execution_id(ExecutionId::new("exec-ok")))
            }),
        }
    }
}

/// Persisted-retry policy: 1s, 2s, 4s, ... capped at one hour, no jitter.
pub fn retry_policy() -> RetryPolicy {
    RetryPolicy::new(
        u32::MAX,
        Duration::from_secs(1),
        Duration::from_secs(3600),
        2.0,
        0.0,
    )
    .unwrap()
}

/// A failed event that became due one second before `now`.
pub fn due_event(
    id: &str,
    webhook_id: &str,
    retry_count: u32,
    max_retries: u32,
    now: DateTime<Utc>,
) -> RetryableEvent {
    let mut event = RetryableEvent::new(
        id,
        webhook_id,
        serde_json::json!({"type": "order.created", "id": id}),
        max_retries,
        now - chrono::Duration::minutes(5),
    )
    .into_pending_retry("connection refused", now - chrono::Duration::seconds(1));
    event.retry_count = retry_count;
    event
}
