pub mod event;
pub mod failure;
pub mod outcome;
pub mod types;
pub mod webhook;

pub use event::{EventStatus, RetryableEvent};
pub use failure::{FailureKind, classify};
pub use outcome::DeliveryOutcome;
pub use types::{EventId, ExecutionId, WebhookId};
pub use webhook::Webhook;
