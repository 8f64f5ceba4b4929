pub mod error;
pub mod evaluator;
pub mod ops;
pub mod path;
pub mod rule;
pub mod validate;
pub mod value;

pub use error::FilterError;
pub use evaluator::{FilterOutcome, evaluate, evaluate_single};
pub use path::{Lookup, lookup};
pub use rule::{FilterOperator, FilterRule};
pub use validate::validate_rule;
