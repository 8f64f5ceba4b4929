use regex::Regex;
use serde_json::Value;

use crate::error::FilterError;
use crate::rule::{FilterOperator, FilterRule};
use crate::value::{as_number, type_name};

/// Check a rule for mistakes that would otherwise only surface as an
/// evaluation error on the first matching payload.
pub fn validate_rule(rule: &FilterRule) -> Result<(), FilterError> {
    let path = rule.field.trim();
    if path.is_empty() && !rule.operator.is_presence_check() {
        return Err(FilterError::InvalidRule(format!(
            "{} requires a field path",
            rule.operator
        )));
    }

    match rule.operator {
        FilterOperator::Contains
        | FilterOperator::NotContains
        | FilterOperator::StartsWith
        | FilterOperator::EndsWith => expect_string(rule.operator, &rule.value).map(|_| ()),
        FilterOperator::Regex => {
            let pattern = expect_string(rule.operator, &rule.value)?;
            Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| FilterError::InvalidRegex(e.to_string()))
        }
        FilterOperator::Gt | FilterOperator::Lt => {
            if as_number(&rule.value).is_some() {
                Ok(())
            } else {
                Err(FilterError::InvalidRule(format!(
                    "{} requires a numeric value, got {}",
                    rule.operator,
                    type_name(&rule.value)
                )))
            }
        }
        FilterOperator::In | FilterOperator::NotIn => match rule.value {
            Value::Array(_) => Ok(()),
            _ => Err(FilterError::InvalidRule(format!(
                "{} requires an array value, got {}",
                rule.operator,
                type_name(&rule.value)
            ))),
        },
        FilterOperator::Equals
        | FilterOperator::NotEquals
        | FilterOperator::Exists
        | FilterOperator::NotExists => Ok(()),
    }
}

fn expect_string(op: FilterOperator, value: &Value) -> Result<&str, FilterError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(FilterError::InvalidRule(format!(
            "{op} requires a string value, got {}",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_well_formed_rules() {
        let rules = [
            FilterRule::new("$.a", FilterOperator::Equals, json!(null)),
            FilterRule::new("$.a", FilterOperator::Contains, json!("x")),
            FilterRule::new("$.a", FilterOperator::Regex, json!("^a+$")),
            FilterRule::new("$.a", FilterOperator::Gt, json!("3.5")),
            FilterRule::new("$.a", FilterOperator::In, json!([])),
            FilterRule::new("", FilterOperator::Exists, Value::Null),
        ];
        for rule in &rules {
            validate_rule(rule).unwrap();
        }
    }

    #[test]
    fn rejects_empty_path_for_value_operators() {
        let rule = FilterRule::new("  ", FilterOperator::Equals, json!(1));
        assert!(matches!(
            validate_rule(&rule),
            Err(FilterError::InvalidRule(_))
        ));
    }

    #[test]
    fn rejects_bad_regex() {
        let rule = FilterRule::new("$.a", FilterOperator::Regex, json!("[z-a]"));
        assert!(matches!(
            validate_rule(&rule),
            Err(FilterError::InvalidRegex(_))
        ));
    }

    #[test]
    fn rejects_mistyped_values() {
        let cases = [
            FilterRule::new("$.a", FilterOperator::StartsWith, json!(1)),
            FilterRule::new("$.a", FilterOperator::Lt, json!("soon")),
            FilterRule::new("$.a", FilterOperator::NotIn, json!("a,b")),
        ];
        for rule in &cases {
            assert!(
                matches!(validate_rule(rule), Err(FilterError::InvalidRule(_))),
                "{} should be rejected",
                rule.operator
            );
        }
    }
}
