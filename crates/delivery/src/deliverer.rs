use async_trait::async_trait;
use hookrelay_core::{DeliveryOutcome, RetryableEvent, Webhook};

use crate::error::DeliveryError;

/// Strongly-typed deliverer trait with native `async fn`.
///
/// This trait is **not** object-safe. If you need dynamic dispatch, use
/// [`DynDeliverer`] instead -- every `Deliverer` automatically implements
/// `DynDeliverer` via a blanket implementation.
pub trait Deliverer: Send + Sync {
    /// Returns the name of this deliverer, used in logs.
    fn name(&self) -> &str;

    /// Deliver `event` to `webhook`'s target.
    ///
    /// Implementations may either return an error or an unsuccessful
    /// [`DeliveryOutcome`]; both are treated as a failed attempt.
    fn deliver(
        &self,
        webhook: &Webhook,
        event: &RetryableEvent,
    ) -> impl std::future::Future<Output = Result<DeliveryOutcome, DeliveryError>> + Send;
}

/// Object-safe deliverer trait for use behind `Arc<dyn DynDeliverer>`.
///
/// You generally should not implement this trait directly -- instead
/// implement [`Deliverer`] and rely on the blanket implementation.
#[async_trait]
pub trait DynDeliverer: Send + Sync {
    /// Returns the name of this deliverer, used in logs.
    fn name(&self) -> &str;

    /// Deliver `event` to `webhook`'s target.
    async fn deliver(
        &self,
        webhook: &Webhook,
        event: &RetryableEvent,
    ) -> Result<DeliveryOutcome, DeliveryError>;
}

#[async_trait]
impl<T: Deliverer + Sync> DynDeliverer for T {
    fn name(&self) -> &str {
        Deliverer::name(self)
    }

    async fn deliver(
        &self,
        webhook: &Webhook,
        event: &RetryableEvent,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        Deliverer::deliver(self, webhook, event).await
    }
}

/// Fold an unsuccessful outcome into the error path.
///
/// After this, `Ok` always means the delivery succeeded.
pub fn settle(
    result: Result<DeliveryOutcome, DeliveryError>,
) -> Result<DeliveryOutcome, DeliveryError> {
    match result {
        Ok(outcome) if !outcome.success => Err(DeliveryError::Unsuccessful(outcome)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use hookrelay_core::FailureKind;

    use super::*;

    struct MockDeliverer {
        should_fail: bool,
    }

    impl Deliverer for MockDeliverer {
        fn name(&self) -> &str {
            "mock"
        }

        async fn deliver(
            &self,
            _webhook: &Webhook,
            _event: &RetryableEvent,
        ) -> Result<DeliveryOutcome, DeliveryError> {
            if self.should_fail {
                return Err(DeliveryError::Connection("mock failure".into()));
            }
            Ok(DeliveryOutcome::success(200))
        }
    }

    fn fixtures() -> (Webhook, RetryableEvent) {
        let hook = Webhook::new("wh-1", "wf://orders");
        let event = RetryableEvent::new("evt-1", "wh-1", serde_json::Value::Null, 3, Utc::now());
        (hook, event)
    }

    #[tokio::test]
    async fn deliverer_success() {
        let (hook, event) = fixtures();
        let deliverer = MockDeliverer { should_fail: false };
        let outcome = Deliverer::deliver(&deliverer, &hook, &event).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn blanket_dyn_deliverer_impl() {
        let (hook, event) = fixtures();
        let deliverer: Arc<dyn DynDeliverer> = Arc::new(MockDeliverer { should_fail: true });
        assert_eq!(deliverer.name(), "mock");
        let err = deliverer.deliver(&hook, &event).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Connection(_)));
    }

    #[test]
    fn settle_turns_unsuccessful_outcomes_into_errors() {
        let ok = settle(Ok(DeliveryOutcome::success(201))).unwrap();
        assert_eq!(ok.status_code, 201);

        let err = settle(Ok(DeliveryOutcome::failure(
            429,
            Some(FailureKind::RateLimited),
        )))
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::RateLimited);

        let err = settle(Err(DeliveryError::RateLimited)).unwrap_err();
        assert!(matches!(err, DeliveryError::RateLimited));
    }
}
