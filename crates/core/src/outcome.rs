use serde::{Deserialize, Serialize};

use crate::failure::{FailureKind, classify};
use crate::types::ExecutionId;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Whether the remote side accepted the delivery.
    pub success: bool,
    /// Transport status code, `0` when no response was received.
    pub status_code: u16,
    /// Response body, if the deliverer captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    /// Failure classification for unsuccessful attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Workflow execution started by a successful delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
}

impl DeliveryOutcome {
    /// Create a successful outcome with the given status code.
    #[must_use]
    pub fn success(status_code: u16) -> Self {
        Self {
            success: true,
            status_code,
            response_body: None,
            failure: None,
            execution_id: None,
        }
    }

    /// Create an unsuccessful outcome.
    #[must_use]
    pub fn failure(status_code: u16, failure: Option<FailureKind>) -> Self {
        Self {
            success: false,
            status_code,
            response_body: None,
            failure,
            execution_id: None,
        }
    }

    /// Attach a response body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// Attach the id of the workflow execution that was started.
    #[must_use]
    pub fn with_execution_id(mut self, id: impl Into<ExecutionId>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    /// Whether this (unsuccessful) outcome is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !self.success && classify(self.failure, self.status_code)
    }

    /// Human-readable summary used for `retry_error` bookkeeping.
    pub fn describe(&self) -> String {
        let kind = self
            .failure
            .unwrap_or_else(|| FailureKind::from_status(self.status_code));
        match &self.response_body {
            Some(body) if !body.is_empty() => {
                format!("{kind} (status {}): {body}", self.status_code)
            }
            _ => format!("{kind} (status {})", self.status_code),
        }
    }
}
