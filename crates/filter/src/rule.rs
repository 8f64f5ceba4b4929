use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Comparison performed by a [`FilterRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    Gt,
    Lt,
    Exists,
    NotExists,
    In,
    NotIn,
}

impl FilterOperator {
    /// Every supported operator, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Equals,
        Self::NotEquals,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Regex,
        Self::Gt,
        Self::Lt,
        Self::Exists,
        Self::NotExists,
        Self::In,
        Self::NotIn,
    ];

    /// The wire name of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::In => "in",
            Self::NotIn => "not_in",
        }
    }

    /// Whether the operator only looks at field presence.
    pub fn is_presence_check(self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| FilterError::UnknownOperator(s.to_owned()))
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_owned()
    }
}

/// A single declarative condition on a webhook payload.
///
/// Rules sharing a `logic_group` are AND-ed together; distinct groups are
/// OR-ed. A disabled rule always passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Path into the payload, e.g. `$.data.items[0].name`.
    pub field: String,
    /// Comparison to perform.
    pub operator: FilterOperator,
    /// Value to compare against. Ignored by `exists` / `not_exists`.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Group this rule belongs to.
    #[serde(default)]
    pub logic_group: i32,
    /// Disabled rules are skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FilterRule {
    /// Create an enabled rule in logic group 0.
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            logic_group: 0,
            enabled: true,
        }
    }

    /// Build a rule from untyped parts, as they come out of storage.
    pub fn parse(
        field: impl Into<String>,
        operator: &str,
        value: serde_json::Value,
        logic_group: i32,
        enabled: bool,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            field: field.into(),
            operator: operator.parse()?,
            value,
            logic_group,
            enabled,
        })
    }

    /// Move the rule into another logic group.
    #[must_use]
    pub fn in_group(mut self, logic_group: i32) -> Self {
        self.logic_group = logic_group;
        self
    }

    /// Mark the rule as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
