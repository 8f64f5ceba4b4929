use hookrelay_core::{DeliveryOutcome, ExecutionId, RetryableEvent, Webhook};
use tracing::info;

use crate::deliverer::Deliverer;
use crate::error::DeliveryError;

/// A deliverer that logs the event and reports success without performing
/// any external I/O.
///
/// Useful for dry runs and local development where no real delivery target
/// is available.
pub struct LogDeliverer {
    name: String,
}

impl LogDeliverer {
    /// Create a new `LogDeliverer` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Deliverer for LogDeliverer {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::unused_async)]
    async fn deliver(
        &self,
        webhook: &Webhook,
        event: &RetryableEvent,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        info!(
            deliverer = %self.name,
            event_id = %event.id,
            webhook_id = %webhook.id,
            target = %webhook.delivery_target,
            retry_count = event.retry_count,
            "log deliverer accepted event"
        );
        Ok(DeliveryOutcome::success(200)
            .with_body(serde_json::json!({"logged": true}).to_string())
            .with_execution_id(ExecutionId::generate()))
    }
}
