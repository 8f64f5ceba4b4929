use regex::Regex;
use serde_json::Value;

use crate::error::FilterError;
use crate::path::Lookup;
use crate::rule::FilterOperator;
use crate::value::{as_number, type_name, values_equal};

/// Apply `operator` to an extracted field and the rule's comparison value.
///
/// Presence operators look only at whether the field was found. Every other
/// operator yields `false` for a missing field and may fail on operand types.
pub fn apply(
    operator: FilterOperator,
    field: Lookup<'_>,
    expected: &Value,
) -> Result<bool, FilterError> {
    let actual = match (operator, field) {
        (FilterOperator::Exists, lookup) => return Ok(lookup.is_found()),
        (FilterOperator::NotExists, lookup) => return Ok(!lookup.is_found()),
        (_, Lookup::Missing) => return Ok(false),
        (_, Lookup::Found(value)) => value,
    };

    match operator {
        FilterOperator::Equals => Ok(values_equal(actual, expected)),
        FilterOperator::NotEquals => Ok(!values_equal(actual, expected)),
        FilterOperator::Contains => eval_contains(actual, expected),
        FilterOperator::NotContains => eval_contains(actual, expected).map(|found| !found),
        FilterOperator::StartsWith => {
            let (s, prefix) = both_strings("starts_with", actual, expected)?;
            Ok(s.starts_with(prefix))
        }
        FilterOperator::EndsWith => {
            let (s, suffix) = both_strings("ends_with", actual, expected)?;
            Ok(s.ends_with(suffix))
        }
        FilterOperator::Regex => eval_regex(actual, expected),
        FilterOperator::Gt => eval_compare("gt", actual, expected, |a, b| a > b),
        FilterOperator::Lt => eval_compare("lt", actual, expected, |a, b| a < b),
        FilterOperator::In => eval_in("in", actual, expected),
        FilterOperator::NotIn => eval_in("not_in", actual, expected).map(|member| !member),
        FilterOperator::Exists | FilterOperator::NotExists => unreachable!(),
    }
}

fn both_strings<'v>(
    op: &str,
    actual: &'v Value,
    expected: &'v Value,
) -> Result<(&'v str, &'v str), FilterError> {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Ok((a, b)),
        _ => Err(FilterError::TypeError(format!(
            "{op}: expected string operands, got {} and {}",
            type_name(actual),
            type_name(expected)
        ))),
    }
}

/// Case-sensitive substring check.
fn eval_contains(actual: &Value, expected: &Value) -> Result<bool, FilterError> {
    let (haystack, needle) = both_strings("contains", actual, expected)?;
    Ok(haystack.contains(needle))
}

/// Regex match of the field against the rule's pattern.
fn eval_regex(actual: &Value, expected: &Value) -> Result<bool, FilterError> {
    let Value::String(pattern) = expected else {
        return Err(FilterError::TypeError(format!(
            "regex: pattern must be a string, got {}",
            type_name(expected)
        )));
    };
    let re = Regex::new(pattern).map_err(|e| FilterError::InvalidRegex(e.to_string()))?;
    match actual {
        Value::String(s) => Ok(re.is_match(s)),
        _ => Err(FilterError::TypeError(format!(
            "regex: field must be a string, got {}",
            type_name(actual)
        ))),
    }
}

/// Strict numeric comparison. Numeric strings count as numbers.
fn eval_compare(
    op: &str,
    actual: &Value,
    expected: &Value,
    predicate: fn(f64, f64) -> bool,
) -> Result<bool, FilterError> {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => Ok(predicate(a, b)),
        _ => Err(FilterError::TypeError(format!(
            "{op}: expected numeric operands, got {} and {}",
            type_name(actual),
            type_name(expected)
        ))),
    }
}

/// Membership test using `equals` semantics.
fn eval_in(op: &str, actual: &Value, expected: &Value) -> Result<bool, FilterError> {
    match expected {
        Value::Array(candidates) => Ok(candidates.iter().any(|c| values_equal(actual, c))),
        _ => Err(FilterError::TypeError(format!(
            "{op}: comparison value must be an array, got {}",
            type_name(expected)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn found(value: &Value) -> Lookup<'_> {
        Lookup::Found(value)
    }

    #[test]
    fn presence_operators_ignore_value() {
        let v = json!(null);
        assert!(apply(FilterOperator::Exists, found(&v), &json!("ignored")).unwrap());
        assert!(!apply(FilterOperator::NotExists, found(&v), &json!(1)).unwrap());
        assert!(!apply(FilterOperator::Exists, Lookup::Missing, &json!(null)).unwrap());
        assert!(apply(FilterOperator::NotExists, Lookup::Missing, &json!(null)).unwrap());
    }

    #[test]
    fn missing_field_fails_without_error() {
        for op in FilterOperator::ALL {
            if op.is_presence_check() {
                continue;
            }
            // Even operands that would be type errors are never inspected.
            let result = apply(op, Lookup::Missing, &json!({"bogus": true}));
            assert!(!result.unwrap(), "{op} should fail on missing field");
        }
    }

    #[test]
    fn equals_and_not_equals() {
        let v = json!(10);
        assert!(apply(FilterOperator::Equals, found(&v), &json!(10.0)).unwrap());
        assert!(apply(FilterOperator::NotEquals, found(&v), &json!(11)).unwrap());
        let b = json!(true);
        assert!(apply(FilterOperator::Equals, found(&b), &json!("true")).unwrap());
    }

    #[test]
    fn contains_is_case_sensitive() {
        let v = json!("an error occurred");
        assert!(!apply(FilterOperator::Contains, found(&v), &json!("Error")).unwrap());
        assert!(apply(FilterOperator::Contains, found(&v), &json!("error")).unwrap());
        assert!(apply(FilterOperator::NotContains, found(&v), &json!("Error")).unwrap());
    }

    #[test]
    fn string_operators_reject_non_strings() {
        let v = json!(42);
        let err = apply(FilterOperator::Contains, found(&v), &json!("4")).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
        let s = json!("abc");
        let err = apply(FilterOperator::StartsWith, found(&s), &json!(1)).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
        let err = apply(FilterOperator::NotContains, found(&v), &json!("x")).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
    }

    #[test]
    fn prefix_and_suffix() {
        let v = json!("order.created");
        assert!(apply(FilterOperator::StartsWith, found(&v), &json!("order.")).unwrap());
        assert!(apply(FilterOperator::EndsWith, found(&v), &json!(".created")).unwrap());
        assert!(!apply(FilterOperator::EndsWith, found(&v), &json!(".Created")).unwrap());
    }

    #[test]
    fn regex_matching() {
        let v = json!("INV-2024-0042");
        assert!(apply(FilterOperator::Regex, found(&v), &json!(r"^INV-\d{4}-\d+$")).unwrap());
        assert!(!apply(FilterOperator::Regex, found(&v), &json!(r"^PO-")).unwrap());
    }

    #[test]
    fn regex_errors() {
        let v = json!("abc");
        let err = apply(FilterOperator::Regex, found(&v), &json!("(unclosed")).unwrap_err();
        assert!(matches!(err, FilterError::InvalidRegex(_)));
        let n = json!(5);
        let err = apply(FilterOperator::Regex, found(&n), &json!("5")).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
        let err = apply(FilterOperator::Regex, found(&v), &json!(5)).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
    }

    #[test]
    fn numeric_comparisons_are_strict() {
        let expected = json!(10.0);
        assert!(apply(FilterOperator::Gt, found(&json!(15)), &expected).unwrap());
        assert!(!apply(FilterOperator::Gt, found(&json!(5)), &expected).unwrap());
        assert!(!apply(FilterOperator::Gt, found(&json!(10)), &expected).unwrap());
        assert!(apply(FilterOperator::Lt, found(&json!(9.5)), &expected).unwrap());
        assert!(!apply(FilterOperator::Lt, found(&json!(10)), &expected).unwrap());
    }

    #[test]
    fn numeric_strings_are_coerced_for_comparison() {
        assert!(apply(FilterOperator::Gt, found(&json!("15")), &json!(10)).unwrap());
        assert!(apply(FilterOperator::Lt, found(&json!(2)), &json!(" 2.5 ")).unwrap());
        assert!(!apply(FilterOperator::Gt, found(&json!("9")), &json!(10)).unwrap());
        let err = apply(FilterOperator::Gt, found(&json!("NaN")), &json!(1)).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
    }

    #[test]
    fn numeric_comparison_errors() {
        let v = json!("many");
        let err = apply(FilterOperator::Gt, found(&v), &json!(1)).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
        let err = apply(FilterOperator::Lt, found(&json!(1)), &json!(true)).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
    }

    #[test]
    fn membership() {
        let v = json!("EU");
        let regions = json!(["US", "EU"]);
        assert!(apply(FilterOperator::In, found(&v), &regions).unwrap());
        assert!(!apply(FilterOperator::NotIn, found(&v), &regions).unwrap());
        let n = json!(3);
        assert!(apply(FilterOperator::In, found(&n), &json!([1, 2, 3.0])).unwrap());
    }

    #[test]
    fn membership_in_empty_array() {
        let v = json!("x");
        assert!(!apply(FilterOperator::In, found(&v), &json!([])).unwrap());
        assert!(apply(FilterOperator::NotIn, found(&v), &json!([])).unwrap());
    }

    #[test]
    fn membership_requires_array() {
        let v = json!("x");
        let err = apply(FilterOperator::In, found(&v), &json!("xyz")).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
        let err = apply(FilterOperator::NotIn, found(&v), &json!({"x": 1})).unwrap_err();
        assert!(matches!(err, FilterError::TypeError(_)));
    }
}
