use std::path::Path;
use std::time::Duration;

use hookrelay_executor::{BoundedRetryExecutor, RetryPolicy};
use serde::Deserialize;

use crate::error::WorkerError;

/// Top-level hookrelay configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct HookrelayConfig {
    /// Background retry worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Delays between persisted retries.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Bounded retries performed within a single intake request.
    #[serde(default)]
    pub inline_retry: InlineRetryConfig,
}

impl HookrelayConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, WorkerError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| WorkerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check every section, including that both retry policies can be built.
    pub fn validate(&self) -> Result<(), WorkerError> {
        self.worker.validate()?;
        self.retry.policy()?;
        self.inline_retry.policy()?;
        Ok(())
    }
}

/// Configuration for the background retry worker.
#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    /// Whether the background worker should run.
    #[serde(default = "default_worker_enabled")]
    pub enabled: bool,
    /// How often to poll for due retries (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Maximum number of events fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How long a claimed event is hidden from other workers (seconds).
    /// `0` disables claiming.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_seconds: u64,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn claim_lease(&self) -> Option<Duration> {
        (self.claim_lease_seconds > 0).then(|| Duration::from_secs(self.claim_lease_seconds))
    }

    fn validate(&self) -> Result<(), WorkerError> {
        if self.poll_interval_seconds == 0 {
            return Err(WorkerError::Config(
                "worker.poll_interval_seconds must be greater than 0".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(WorkerError::Config(
                "worker.batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_worker_enabled(),
            poll_interval_seconds: default_poll_interval(),
            batch_size: default_batch_size(),
            claim_lease_seconds: default_claim_lease(),
        }
    }
}

/// Backoff parameters for persisted retries.
///
/// How many persisted retries an event gets is decided by its
/// `max_retries`, so the resulting policy carries no attempt bound.
#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, WorkerError> {
        Ok(RetryPolicy::new(
            u32::MAX,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.multiplier,
            0.0,
        )?)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Policy for the bounded executor used at intake.
#[derive(Debug, Deserialize)]
pub struct InlineRetryConfig {
    #[serde(default = "default_inline_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_inline_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_inline_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_inline_jitter_fraction")]
    pub jitter_fraction: f64,
    /// Upper bound on a single delivery attempt, unbounded when absent.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
}

impl InlineRetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, WorkerError> {
        Ok(RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.multiplier,
            self.jitter_fraction,
        )?)
    }

    pub fn executor(&self) -> Result<BoundedRetryExecutor, WorkerError> {
        let executor = BoundedRetryExecutor::new(self.policy()?);
        Ok(match self.attempt_timeout_ms {
            Some(ms) => executor.with_attempt_timeout(Duration::from_millis(ms)),
            None => executor,
        })
    }
}

impl Default for InlineRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_inline_max_attempts(),
            base_delay_ms: default_inline_base_delay_ms(),
            max_delay_ms: default_inline_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_fraction: default_inline_jitter_fraction(),
            attempt_timeout_ms: None,
        }
    }
}

fn default_worker_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_claim_lease() -> u64 {
    60
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    3_600_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_inline_max_attempts() -> u32 {
    3
}

fn default_inline_base_delay_ms() -> u64 {
    200
}

fn default_inline_max_delay_ms() -> u64 {
    5000
}

fn default_inline_jitter_fraction() -> f64 {
    0.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = HookrelayConfig::from_toml_str("").unwrap();
        assert!(config.worker.enabled);
        assert_eq!(config.worker.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.worker.batch_size, 50);
        assert_eq!(config.worker.claim_lease(), Some(Duration::from_secs(60)));

        let retry = config.retry.policy().unwrap();
        assert_eq!(retry.base_delay(), Duration::from_secs(1));
        assert_eq!(retry.max_delay(), Duration::from_secs(3600));

        let inline = config.inline_retry.policy().unwrap();
        assert_eq!(inline.max_attempts(), 3);
        assert_eq!(inline.base_delay(), Duration::from_millis(200));
        assert!((inline.jitter_fraction() - 0.2).abs() < f64::EPSILON);
        assert!(config.inline_retry.attempt_timeout_ms.is_none());
    }

    #[test]
    fn partial_sections_override_defaults() {
        let toml = r"
            [worker]
            poll_interval_seconds = 5
            claim_lease_seconds = 0

            [retry]
            base_delay_ms = 500

            [inline_retry]
            max_attempts = 1
            attempt_timeout_ms = 2500
        ";
        let config = HookrelayConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.worker.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.worker.batch_size, 50);
        assert!(config.worker.claim_lease().is_none());
        assert_eq!(
            config.retry.policy().unwrap().base_delay(),
            Duration::from_millis(500)
        );
        assert_eq!(config.inline_retry.max_attempts, 1);
        assert_eq!(config.inline_retry.attempt_timeout_ms, Some(2500));
        config.inline_retry.executor().unwrap();
    }

    #[test]
    fn rejects_invalid_policy() {
        let err = HookrelayConfig::from_toml_str("[inline_retry]\nmax_attempts = 0").unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));

        let err = HookrelayConfig::from_toml_str("[retry]\nmultiplier = 1.0").unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
    }

    #[test]
    fn rejects_zero_interval_and_batch() {
        let err =
            HookrelayConfig::from_toml_str("[worker]\npoll_interval_seconds = 0").unwrap_err();
        assert!(err.to_string().contains("poll_interval_seconds"));

        let err = HookrelayConfig::from_toml_str("[worker]\nbatch_size = 0").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = HookrelayConfig::from_toml_str("[worker\nenabled = ").unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = HookrelayConfig::load("/nonexistent/hookrelay.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
