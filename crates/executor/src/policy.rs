use std::time::Duration;

use crate::error::PolicyError;

/// Parameters controlling how often and how far apart retries happen.
///
/// A policy is validated once at construction and immutable afterwards, so
/// it can be shared freely between the inline executor and the background
/// worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_fraction: f64,
}

impl RetryPolicy {
    /// Build a policy, rejecting values the backoff math cannot honour.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_fraction: f64,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(PolicyError::InvalidMultiplier(multiplier));
        }
        if !(0.0..=1.0).contains(&jitter_fraction) {
            return Err(PolicyError::InvalidJitter(jitter_fraction));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            multiplier,
            jitter_fraction,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}
