use serde::{Deserialize, Serialize};

use crate::types::WebhookId;

/// A configured webhook, as resolved from the persistence layer.
///
/// Only the fields the reliability layer needs are modelled here; signing
/// secrets, ownership and the request template stay with the owning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    /// Unique webhook identifier.
    pub id: WebhookId,
    /// Disabled webhooks never receive deliveries.
    pub enabled: bool,
    /// Where deliveries for this webhook are sent (URL or workflow handle).
    pub delivery_target: String,
    /// Retry budget applied to events created for this webhook.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    5
}

impl Webhook {
    /// Create an enabled webhook with the default retry budget.
    #[must_use]
    pub fn new(id: impl Into<WebhookId>, delivery_target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            delivery_target: delivery_target.into(),
            max_retries: default_max_retries(),
        }
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Mark the webhook as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_webhook_is_enabled() {
        let hook = Webhook::new("wh-1", "https://example.com/hook");
        assert!(hook.enabled);
        assert_eq!(hook.max_retries, 5);
        assert_eq!(hook.delivery_target, "https://example.com/hook");
    }

    #[test]
    fn builder_overrides() {
        let hook = Webhook::new("wh-1", "t").with_max_retries(2).disabled();
        assert!(!hook.enabled);
        assert_eq!(hook.max_retries, 2);
    }

    #[test]
    fn deserialize_defaults_max_retries() {
        let hook: Webhook = serde_json::from_str(
            r#"{"id":"wh-9","enabled":true,"delivery_target":"wf://orders"}"#,
        )
        .unwrap();
        assert_eq!(hook.id.as_str(), "wh-9");
        assert_eq!(hook.max_retries, 5);
    }
}
