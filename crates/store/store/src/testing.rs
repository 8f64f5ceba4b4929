use chrono::{DateTime, Duration, Utc};
use hookrelay_core::{EventId, EventStatus, ExecutionId, RetryableEvent, WebhookId};

use crate::error::StoreError;
use crate::store::RetryStore;

/// Fixed point in the past that nothing else in a shared store schedules near.
fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(946_684_800, 0).expect("2000-01-01 is a valid timestamp")
}

fn test_event(id: &str) -> RetryableEvent {
    RetryableEvent::new(
        id,
        "conformance-webhook",
        serde_json::json!({"id": id}),
        3,
        epoch(),
    )
}

fn pending(id: &str, next_retry_at: DateTime<Utc>) -> RetryableEvent {
    test_event(id).into_pending_retry("connection refused", next_retry_at)
}

/// Run the full retry store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any store operation fails unexpectedly.
pub async fn run_store_conformance_tests(store: &dyn RetryStore) -> Result<(), StoreError> {
    test_get_missing(store).await?;
    test_record_and_get(store).await?;
    test_fetch_due_ordering(store).await?;
    test_mark_processed(store).await?;
    test_mark_permanently_failed(store).await?;
    test_schedule_retry(store).await?;
    test_unknown_event(store).await?;
    test_lookup_missing_webhook(store).await?;
    Ok(())
}

/// Conformance tests for stores that implement [`RetryStore::claim_retry`]
/// as a real conditional update.
///
/// # Errors
///
/// Returns an error if any store operation fails unexpectedly.
pub async fn run_claim_conformance_tests(store: &dyn RetryStore) -> Result<(), StoreError> {
    test_claim_once(store).await?;
    test_claim_stale_count(store).await?;
    test_claim_not_due(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn RetryStore) -> Result<(), StoreError> {
    let found = store.get_event(&EventId::new("conf-missing")).await?;
    assert!(found.is_none(), "get on missing event should return None");
    Ok(())
}

async fn test_record_and_get(store: &dyn RetryStore) -> Result<(), StoreError> {
    let failed = pending("conf-record-failed", Utc::now());
    store.record_failed_delivery(failed.clone()).await?;
    let got = store.get_event(&failed.id).await?;
    assert_eq!(got.as_ref(), Some(&failed));

    let processed = test_event("conf-record-processed").into_processed(None, 12);
    store.record_processed(processed.clone()).await?;
    let got = store.get_event(&processed.id).await?;
    assert_eq!(got.map(|e| e.status), Some(EventStatus::Processed));

    let filtered = test_event("conf-record-filtered").into_filtered("no filter group passed");
    store.record_filtered(filtered.clone()).await?;
    let got = store.get_event(&filtered.id).await?;
    assert_eq!(got.map(|e| e.status), Some(EventStatus::Filtered));
    Ok(())
}

async fn test_fetch_due_ordering(store: &dyn RetryStore) -> Result<(), StoreError> {
    let t0 = epoch();
    store
        .record_failed_delivery(pending("conf-due-a", t0 + Duration::seconds(3)))
        .await?;
    store
        .record_failed_delivery(pending("conf-due-b", t0 + Duration::seconds(1)))
        .await?;
    store
        .record_failed_delivery(pending("conf-due-c", t0 + Duration::seconds(2)))
        .await?;
    store
        .record_failed_delivery(pending("conf-due-later", t0 + Duration::seconds(100)))
        .await?;
    store
        .record_failed_delivery(test_event("conf-due-dead").into_permanently_failed("gone"))
        .await?;

    let now = t0 + Duration::seconds(10);
    let due = store.fetch_due_retries(now, 10).await?;
    let ids: Vec<&str> = due.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["conf-due-b", "conf-due-c", "conf-due-a"],
        "due events should be returned earliest first"
    );

    let limited = store.fetch_due_retries(now, 2).await?;
    assert_eq!(limited.len(), 2, "batch size should bound the result");

    for id in ["conf-due-a", "conf-due-b", "conf-due-c", "conf-due-later"] {
        store.mark_processed(&EventId::new(id), None, 0).await?;
    }
    let due = store.fetch_due_retries(now + Duration::seconds(1000), 10).await?;
    assert!(
        due.iter().all(|e| !e.id.as_str().starts_with("conf-due-")),
        "processed events should no longer be due"
    );
    Ok(())
}

async fn test_mark_processed(store: &dyn RetryStore) -> Result<(), StoreError> {
    let event = pending("conf-processed", Utc::now() - Duration::seconds(1));
    let id = event.id.clone();
    store.record_failed_delivery(event).await?;

    let execution = ExecutionId::new("exec-1");
    store.mark_processed(&id, Some(&execution), 42).await?;

    let got = store
        .get_event(&id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    assert_eq!(got.status, EventStatus::Processed);
    assert!(got.next_retry_at.is_none());
    assert!(got.retry_error.is_none());
    assert_eq!(got.execution_id, Some(execution));
    assert_eq!(got.elapsed_ms, Some(42));
    assert!(got.last_retry_at.is_some(), "attempt time should be recorded");
    assert!(got.invariant_violation().is_none());
    Ok(())
}

async fn test_mark_permanently_failed(store: &dyn RetryStore) -> Result<(), StoreError> {
    let event = pending("conf-permanent", Utc::now() - Duration::seconds(1));
    let id = event.id.clone();
    store.record_failed_delivery(event).await?;

    store
        .mark_permanently_failed(&id, "max retries (3) exceeded: timeout", 3)
        .await?;

    let got = store
        .get_event(&id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    assert!(got.permanently_failed);
    assert!(got.next_retry_at.is_none());
    assert_eq!(
        got.retry_error.as_deref(),
        Some("max retries (3) exceeded: timeout")
    );
    assert_eq!(got.retry_count, 3);
    assert!(got.invariant_violation().is_none());

    let due = store.fetch_due_retries(Utc::now(), 1000).await?;
    assert!(
        due.iter().all(|e| e.id != id),
        "permanently failed events are never due"
    );
    Ok(())
}

async fn test_schedule_retry(store: &dyn RetryStore) -> Result<(), StoreError> {
    let event = pending("conf-schedule", Utc::now() - Duration::seconds(1));
    let id = event.id.clone();
    store.record_failed_delivery(event).await?;

    let next = Utc::now() + Duration::hours(1);
    store.schedule_retry(&id, "rate_limited (status 429)", 2, next).await?;

    let got = store
        .get_event(&id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    assert_eq!(got.retry_count, 2);
    assert_eq!(got.next_retry_at, Some(next));
    assert_eq!(got.retry_error.as_deref(), Some("rate_limited (status 429)"));
    assert!(!got.permanently_failed);
    assert!(got.last_retry_at.is_some());

    let due = store.fetch_due_retries(Utc::now(), 1000).await?;
    assert!(
        due.iter().all(|e| e.id != id),
        "rescheduled event should not be due before its time"
    );
    Ok(())
}

async fn test_unknown_event(store: &dyn RetryStore) -> Result<(), StoreError> {
    let id = EventId::new("conf-unknown");
    assert!(matches!(
        store.mark_processed(&id, None, 0).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.mark_permanently_failed(&id, "x", 0).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.schedule_retry(&id, "x", 1, Utc::now()).await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

async fn test_lookup_missing_webhook(store: &dyn RetryStore) -> Result<(), StoreError> {
    let found = store
        .lookup_webhook(&WebhookId::new("conf-no-such-webhook"))
        .await?;
    assert!(found.is_none(), "lookup of unknown webhook should return None");
    Ok(())
}

async fn test_claim_once(store: &dyn RetryStore) -> Result<(), StoreError> {
    let now = Utc::now();
    let event = pending("conf-claim-once", now - Duration::seconds(1));
    let id = event.id.clone();
    store.record_failed_delivery(event).await?;

    let lease = now + Duration::seconds(60);
    assert!(store.claim_retry(&id, 0, now, lease).await?, "first claim wins");
    assert!(
        !store.claim_retry(&id, 0, now, lease).await?,
        "second claim for the same due time loses"
    );

    let got = store
        .get_event(&id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    assert_eq!(got.next_retry_at, Some(lease));
    Ok(())
}

async fn test_claim_stale_count(store: &dyn RetryStore) -> Result<(), StoreError> {
    let now = Utc::now();
    let event = pending("conf-claim-stale", now - Duration::seconds(1));
    let id = event.id.clone();
    store.record_failed_delivery(event).await?;

    let lease = now + Duration::seconds(60);
    assert!(
        !store.claim_retry(&id, 1, now, lease).await?,
        "claim with a stale retry count must fail"
    );
    assert!(
        !store
            .claim_retry(&EventId::new("conf-claim-missing"), 0, now, lease)
            .await?,
        "claim on an unknown event must fail"
    );
    Ok(())
}

async fn test_claim_not_due(store: &dyn RetryStore) -> Result<(), StoreError> {
    let now = Utc::now();
    let event = test_event("conf-claim-dead").into_permanently_failed("gone");
    let id = event.id.clone();
    store.record_failed_delivery(event).await?;
    assert!(
        !store
            .claim_retry(&id, 0, now, now + Duration::seconds(60))
            .await?,
        "terminal events cannot be claimed"
    );
    Ok(())
}
