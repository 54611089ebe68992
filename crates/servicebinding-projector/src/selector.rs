//! Label selector matching for workload selection
//!
//! Converts a Kubernetes `LabelSelector` into a validated [`LabelMatcher`].
//! Conversion fails on unknown operators or malformed value lists; callers
//! deciding whether to project treat such a selector as matching nothing.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use thiserror::Error;

/// Operator of a label selector requirement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelSelectorOperator {
    /// Label value must be in the specified set
    In,
    /// Label value must not be in the specified set
    NotIn,
    /// Label must exist (value ignored)
    Exists,
    /// Label must not exist (value ignored)
    DoesNotExist,
}

impl LabelSelectorOperator {
    fn parse(operator: &str) -> Result<Self, SelectorError> {
        match operator {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            other => Err(SelectorError(format!("unknown operator '{}'", other))),
        }
    }

    /// Check if a label value matches this requirement
    ///
    /// - `label_value`: The actual label value (None if label doesn't exist)
    /// - `values`: The values specified in the requirement
    pub fn matches(&self, label_value: Option<&str>, values: &[String]) -> bool {
        match self {
            Self::In => label_value.is_some_and(|v| values.iter().any(|req| req == v)),
            Self::NotIn => {
                label_value.is_none() || !values.iter().any(|req| Some(req.as_str()) == label_value)
            }
            Self::Exists => label_value.is_some(),
            Self::DoesNotExist => label_value.is_none(),
        }
    }
}

/// A selector that failed validation
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid label selector: {0}")]
pub struct SelectorError(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
struct Requirement {
    key: String,
    operator: LabelSelectorOperator,
    values: Vec<String>,
}

/// Validated label selector
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelMatcher {
    match_labels: BTreeMap<String, String>,
    requirements: Vec<Requirement>,
}

impl LabelMatcher {
    /// Validate and convert a Kubernetes label selector
    ///
    /// An empty selector matches every label set.
    pub fn from_selector(selector: &LabelSelector) -> Result<Self, SelectorError> {
        let match_labels = selector.match_labels.clone().unwrap_or_default();
        let mut requirements = Vec::new();
        for expr in selector.match_expressions.iter().flatten() {
            if expr.key.is_empty() {
                return Err(SelectorError("requirement with empty key".to_string()));
            }
            let operator = LabelSelectorOperator::parse(&expr.operator)?;
            let values = expr.values.clone().unwrap_or_default();
            match operator {
                LabelSelectorOperator::In | LabelSelectorOperator::NotIn if values.is_empty() => {
                    return Err(SelectorError(format!(
                        "operator {} on key '{}' requires values",
                        expr.operator, expr.key
                    )));
                }
                LabelSelectorOperator::Exists | LabelSelectorOperator::DoesNotExist
                    if !values.is_empty() =>
                {
                    return Err(SelectorError(format!(
                        "operator {} on key '{}' takes no values",
                        expr.operator, expr.key
                    )));
                }
                _ => {}
            }
            requirements.push(Requirement {
                key: expr.key.clone(),
                operator,
                values,
            });
        }
        Ok(Self {
            match_labels,
            requirements,
        })
    }

    /// Check if a label set satisfies every label and requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let labels_match = self
            .match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value));
        labels_match
            && self.requirements.iter().all(|req| {
                req.operator
                    .matches(labels.get(&req.key).map(String::as_str), &req.values)
            })
    }
}
