use std::time::Duration;

use hookrelay_core::{DeliveryOutcome, FailureKind, classify};
use thiserror::Error;

/// Errors that can occur while delivering an event.
///
/// Every variant maps onto a [`FailureKind`] and a status code so that the
/// retry layers can classify it without inspecting messages.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The remote side did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The remote side rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote side answered with a server error.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// The remote side rejected the request as invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The remote side rejected our credentials.
    #[error("unauthorized (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Any other failure, classified by its status code.
    #[error("delivery failed (status {status}): {message}")]
    Failed { status: u16, message: String },

    /// The deliverer returned an outcome that was not successful.
    #[error("unsuccessful delivery: {}", .0.describe())]
    Unsuccessful(DeliveryOutcome),
}

impl DeliveryError {
    /// The failure kind this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::RateLimited => FailureKind::RateLimited,
            Self::Connection(_) => FailureKind::ConnectionFailed,
            Self::Server { .. } => FailureKind::ServerError,
            Self::Validation(_) => FailureKind::ValidationFailed,
            Self::Unauthorized { .. } => FailureKind::AuthFailed,
            Self::Failed { .. } => FailureKind::Other,
            Self::Unsuccessful(outcome) => outcome.failure.unwrap_or(FailureKind::Other),
        }
    }

    /// Status code associated with the failure, `0` if none was received.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Timeout(_) | Self::Connection(_) => 0,
            Self::RateLimited => 429,
            Self::Validation(_) => 400,
            Self::Server { status, .. }
            | Self::Unauthorized { status, .. }
            | Self::Failed { status, .. } => *status,
            Self::Unsuccessful(outcome) => outcome.status_code,
        }
    }

    /// The failure kind as reported, `None` when an outcome carried none.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Unsuccessful(outcome) => outcome.failure,
            other => Some(other.kind()),
        }
    }

    /// Returns `true` if the delivery may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        classify(self.failure(), self.status_code())
    }
}

impl From<DeliveryOutcome> for DeliveryError {
    fn from(outcome: DeliveryOutcome) -> Self {
        Self::Unsuccessful(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(DeliveryError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(DeliveryError::Connection("reset".into()).is_retryable());
        assert!(DeliveryError::RateLimited.is_retryable());
        assert!(
            DeliveryError::Server {
                status: 502,
                message: "bad gateway".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn non_retryable_errors() {
        assert!(!DeliveryError::Validation("missing field".into()).is_retryable());
        assert!(
            !DeliveryError::Unauthorized {
                status: 401,
                message: "bad signature".into()
            }
            .is_retryable()
        );
        assert!(
            !DeliveryError::Failed {
                status: 404,
                message: "gone".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn generic_failure_uses_status_code() {
        let err = DeliveryError::Failed {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.kind(), FailureKind::Other);
        assert!(err.is_retryable());
    }

    #[test]
    fn unsuccessful_outcome_is_classified_by_its_contents() {
        let err = DeliveryError::from(DeliveryOutcome::failure(500, None));
        assert_eq!(err.failure(), None);
        assert_eq!(err.kind(), FailureKind::Other);
        assert_eq!(err.status_code(), 500);
        assert!(err.is_retryable());

        let err = DeliveryError::from(DeliveryOutcome::failure(
            200,
            Some(FailureKind::ValidationFailed),
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = DeliveryError::Timeout(Duration::from_millis(500));
        assert_eq!(err.to_string(), "timeout after 500ms");

        let err = DeliveryError::RateLimited;
        assert_eq!(err.to_string(), "rate limited");

        let err = DeliveryError::from(DeliveryOutcome::failure(503, None).with_body("busy"));
        assert_eq!(
            err.to_string(),
            "unsuccessful delivery: server error (status 503): busy"
        );
    }
}
