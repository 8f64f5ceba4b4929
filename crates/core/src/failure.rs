use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a delivery attempt failed, independent of the transport status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The remote side did not answer in time.
    Timeout,
    /// The remote side asked us to slow down.
    RateLimited,
    /// No connection could be established or it was reset.
    ConnectionFailed,
    /// The remote side reported an internal error.
    ServerError,
    /// The request was rejected as malformed.
    ValidationFailed,
    /// The request was rejected for missing or bad credentials.
    AuthFailed,
    /// Any other failure. Classification falls back to the status code.
    Other,
}

impl FailureKind {
    /// Returns `true` if a failure of this kind may succeed on retry.
    ///
    /// `Other` carries no information of its own and is not retryable here;
    /// [`classify`] consults the status code for it instead.
    pub fn is_retryable(self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited | Self::ConnectionFailed | Self::ServerError => true,
            Self::ValidationFailed | Self::AuthFailed | Self::Other => false,
        }
    }

    /// Short machine-readable code, stable across releases.
    pub fn code(self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ServerError => "SERVER_ERROR",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::AuthFailed => "AUTH_FAILED",
            Self::Other => "OTHER",
        }
    }

    /// Best-effort kind for a bare HTTP status code.
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            429 => Self::RateLimited,
            401 | 403 => Self::AuthFailed,
            400 | 422 => Self::ValidationFailed,
            408 | 504 => Self::Timeout,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::ConnectionFailed => "connection failed",
            Self::ServerError => "server error",
            Self::ValidationFailed => "validation failed",
            Self::AuthFailed => "authentication failed",
            Self::Other => "delivery failed",
        };
        f.write_str(name)
    }
}

/// Decide whether a delivery result warrants another attempt.
///
/// A 2xx without a failure is never retried. A named failure kind decides on
/// its own. Otherwise the status code decides: 5xx and 429 are retryable,
/// other 4xx are not. A failure without any status code (0) never reached the
/// remote application and is treated as a transport failure.
pub fn classify(failure: Option<FailureKind>, status_code: u16) -> bool {
    match failure {
        None if (200..300).contains(&status_code) => false,
        Some(kind) if kind != FailureKind::Other => kind.is_retryable(),
        _ => match status_code {
            429 | 500..=599 => true,
            400..=499 => false,
            0 => failure.is_some(),
            _ => false,
        },
    }
}
