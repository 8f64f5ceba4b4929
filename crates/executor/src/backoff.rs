use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::policy::RetryPolicy;

/// Source of uniform samples in `[0, 1)` used to spread retries.
///
/// Injected so tests can make jittered delays reproducible.
pub trait JitterSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Jitter drawn from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Jitter drawn from a seeded RNG, reproducible across runs.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn sample(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.r#gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().r#gen::<f64>(),
        }
    }
}

/// Always returns the same sample. `0.0` yields the shortest jittered delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

/// Un-jittered delay before the retry following zero-based `attempt`:
/// `min(base_delay * multiplier^attempt, max_delay)`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hookrelay_executor::{RetryPolicy, delay};
///
/// let policy = RetryPolicy::default();
/// assert_eq!(delay(0, &policy), Duration::from_secs(1));
/// assert_eq!(delay(3, &policy), Duration::from_secs(8));
/// assert_eq!(delay(10, &policy), Duration::from_secs(30));
/// ```
pub fn delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let max = policy.max_delay();
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = policy.base_delay().as_secs_f64() * policy.multiplier().powi(exponent);

    if !raw.is_finite() || raw >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(raw).min(max)
}

/// [`delay`] perturbed by up to `jitter_fraction` of itself in either
/// direction. Never negative; a jittered value below zero falls back to the
/// plain delay.
pub fn delay_with_jitter(attempt: u32, policy: &RetryPolicy, jitter: &dyn JitterSource) -> Duration {
    let plain = delay(attempt, policy);
    let fraction = policy.jitter_fraction();
    if fraction <= 0.0 || plain.is_zero() {
        return plain;
    }

    let secs = plain.as_secs_f64();
    let offset = (jitter.sample() * 2.0 - 1.0) * fraction * secs;
    let jittered = secs + offset;
    if !jittered.is_finite() || jittered < 0.0 {
        return plain;
    }
    Duration::from_secs_f64(jittered)
}
