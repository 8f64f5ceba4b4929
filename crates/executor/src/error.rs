use hookrelay_delivery::DeliveryError;
use thiserror::Error;

/// Errors returned by [`BoundedRetryExecutor`](crate::BoundedRetryExecutor).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The caller cancelled before or between attempts.
    #[error("operation cancelled")]
    Cancelled,

    /// A non-retryable failure, returned as-is.
    #[error(transparent)]
    Permanent(DeliveryError),

    /// Every attempt failed with a retryable error.
    #[error("max attempts ({attempts}) exceeded: {last}")]
    MaxAttemptsExceeded {
        attempts: u32,
        #[source]
        last: DeliveryError,
    },
}

impl ExecuteError {
    /// The last delivery failure observed, if any attempt was made.
    pub fn last_failure(&self) -> Option<&DeliveryError> {
        match self {
            Self::Cancelled => None,
            Self::Permanent(err) | Self::MaxAttemptsExceeded { last: err, .. } => Some(err),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A [`RetryPolicy`](crate::RetryPolicy) was constructed with out-of-range values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("multiplier must be a finite number greater than 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("jitter_fraction must be within 0.0..=1.0, got {0}")]
    InvalidJitter(f64),
}
