use hookrelay_executor::{ExecuteError, PolicyError};
use hookrelay_filter::FilterError;
use hookrelay_store::StoreError;
use thiserror::Error;

/// Errors from the retry worker and the delivery pipeline.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("execution error: {0}")]
    Execute(ExecuteError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker cancelled")]
    Cancelled,

    #[error("retry worker disabled by configuration")]
    Disabled,
}

impl From<ExecuteError> for WorkerError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::Cancelled => Self::Cancelled,
            other => Self::Execute(other),
        }
    }
}

impl From<PolicyError> for WorkerError {
    fn from(err: PolicyError) -> Self {
        Self::Config(err.to_string())
    }
}
