use thiserror::Error;

/// Errors raised while parsing or evaluating filter rules.
///
/// These are never folded into a "rule did not match" result: a malformed
/// rule is reported to the caller.
#[derive(Debug, Error)]
pub enum FilterError {
    /// An operand had the wrong type for the operator.
    #[error("type error: {0}")]
    TypeError(String),

    /// A `regex` rule carried a pattern that does not compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    /// The operator name is not one of the supported operators.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// The rule is structurally invalid (e.g. empty field path).
    #[error("invalid rule: {0}")]
    InvalidRule(String),
}
