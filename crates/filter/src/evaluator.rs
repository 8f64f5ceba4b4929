use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::FilterError;
use crate::ops::apply;
use crate::path::{Lookup, lookup};
use crate::rule::FilterRule;

/// Result of evaluating a webhook's filter rules against a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// Whether the event may proceed.
    pub passed: bool,
    /// Human-readable summary of the decision.
    pub reason: String,
    /// Diagnostics: the matching group, or the failures of every group.
    pub details: BTreeMap<String, Value>,
}

impl FilterOutcome {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
            details: BTreeMap::new(),
        }
    }
}

/// Evaluate a single rule. Disabled rules always pass.
pub fn evaluate_single(rule: &FilterRule, payload: &Value) -> Result<bool, FilterError> {
    if !rule.enabled {
        return Ok(true);
    }
    apply(rule.operator, lookup(payload, &rule.field), &rule.value)
}

/// Evaluate all rules: AND within a logic group, OR across groups.
///
/// Groups are visited in ascending id order and evaluation stops at the first
/// group that passes, so the reported group is deterministic.
#[instrument(skip_all, fields(rules_count = rules.len()))]
pub fn evaluate(rules: &[FilterRule], payload: &Value) -> Result<FilterOutcome, FilterError> {
    if rules.is_empty() {
        return Ok(FilterOutcome::pass("no filters configured"));
    }

    let mut groups: BTreeMap<i32, Vec<&FilterRule>> = BTreeMap::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        groups.entry(rule.logic_group).or_default().push(rule);
    }
    if groups.is_empty() {
        return Ok(FilterOutcome::pass("all filters disabled"));
    }

    let mut failed_groups = Vec::with_capacity(groups.len());
    for (group, group_rules) in &groups {
        let failures = group_failures(group_rules, payload)?;
        match failures.first() {
            None => {
                debug!(group, "filter group passed");
                let mut outcome = FilterOutcome::pass(format!("filter group {group} passed"));
                outcome
                    .details
                    .insert("matched_group".to_owned(), json!(group));
                outcome
                    .details
                    .insert("groups_evaluated".to_owned(), json!(failed_groups.len() + 1));
                return Ok(outcome);
            }
            Some(first) => {
                debug!(
                    group,
                    field = %first["field"],
                    failed = failures.len(),
                    "filter group failed"
                );
                failed_groups.push(json!({
                    "group": group,
                    "failed_rules": failures,
                }));
            }
        }
    }

    let mut details = BTreeMap::new();
    details.insert("groups_evaluated".to_owned(), json!(groups.len()));
    details.insert("failed_groups".to_owned(), Value::Array(failed_groups));
    Ok(FilterOutcome {
        passed: false,
        reason: "no filter group passed".to_owned(),
        details,
    })
}

/// Evaluate every rule in a group, describing each one that fails. The group
/// passes only if the result is empty.
fn group_failures(rules: &[&FilterRule], payload: &Value) -> Result<Vec<Value>, FilterError> {
    let mut failures = Vec::new();
    for rule in rules {
        let field = lookup(payload, &rule.field);
        if !apply(rule.operator, field, &rule.value)? {
            let actual = match field {
                Lookup::Found(value) => value.clone(),
                Lookup::Missing => Value::String("<missing>".to_owned()),
            };
            failures.push(json!({
                "field": rule.field,
                "operator": rule.operator.as_str(),
                "expected": rule.value,
                "actual": actual,
            }));
        }
    }
    Ok(failures)
}
