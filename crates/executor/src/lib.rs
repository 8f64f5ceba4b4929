pub mod backoff;
pub mod error;
pub mod executor;
pub mod policy;
pub mod tracker;

pub use backoff::{FixedJitter, JitterSource, SeededJitter, ThreadRngJitter, delay, delay_with_jitter};
pub use error::{ExecuteError, PolicyError};
pub use executor::BoundedRetryExecutor;
pub use policy::RetryPolicy;
pub use tracker::RetryTracker;
