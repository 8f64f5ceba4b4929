pub mod config;
pub mod error;
pub mod pipeline;
pub mod transition;
pub mod worker;

pub use config::{HookrelayConfig, InlineRetryConfig, RetryConfig, WorkerConfig};
pub use error::WorkerError;
pub use pipeline::{DeliveryPipeline, IntakeResult};
pub use transition::{RetryTransition, plan_transition};
pub use worker::{RetryReport, RetryWorker};
