use crate::{Rule, RuleValue};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use watchdesk_common::types::{RuleField, RuleOperator};

/// Rule as authored by the user: three raw strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    pub field: String,
    pub operator: String,
    pub value: String,
}

/// Validation failure for a single raw rule, surfaced to the API caller
/// with field-level detail.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown rule field '{0}'")]
    UnknownField(String),

    #[error("unknown rule operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{operator}' is not allowed for field '{field}'")]
    OperatorNotAllowed {
        field: RuleField,
        operator: RuleOperator,
    },

    #[error("field '{field}' requires a numeric value, got '{value}'")]
    NotNumeric { field: RuleField, value: String },

    #[error("list value must contain at least one non-empty entry")]
    EmptyList,

    #[error("invalid regex pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Split a comma-separated raw value into trimmed, non-empty tokens.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate one raw rule into its canonical typed form.
///
/// Field and operator must be in the enumerated sets; `price` accepts only
/// numeric operators and a parseable numeric value; list operators require
/// a non-empty set after trimming and dropping empty tokens.
pub fn normalize(raw: &RawRule) -> Result<Rule, ValidationError> {
    let field = RuleField::from_str(&raw.field)
        .map_err(|_| ValidationError::UnknownField(raw.field.clone()))?;
    let operator = RuleOperator::from_str(&raw.operator)
        .map_err(|_| ValidationError::UnknownOperator(raw.operator.clone()))?;

    if field.is_numeric() && !operator.is_numeric_compatible() {
        return Err(ValidationError::OperatorNotAllowed { field, operator });
    }

    let value = match operator {
        RuleOperator::InList | RuleOperator::NotInList => {
            let items = split_list(&raw.value);
            if items.is_empty() {
                return Err(ValidationError::EmptyList);
            }
            RuleValue::List(items)
        }
        RuleOperator::RegexMatch => {
            let pattern = raw.value.trim();
            let re = Regex::new(pattern).map_err(|source| ValidationError::BadPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            RuleValue::Pattern(re)
        }
        RuleOperator::LessOrEqual | RuleOperator::GreaterOrEqual => {
            let n = parse_number(field, raw.value.trim())?;
            RuleValue::Number(n)
        }
        RuleOperator::Equals | RuleOperator::NotEquals | RuleOperator::Contains => {
            if field.is_numeric() {
                RuleValue::Number(parse_number(field, raw.value.trim())?)
            } else {
                RuleValue::Text(raw.value.trim().to_string())
            }
        }
    };

    Ok(Rule {
        field,
        operator,
        value,
    })
}

/// Normalize a full rule set, failing on the first invalid rule.
pub fn normalize_rules(raw: &[RawRule]) -> Result<Vec<Rule>, ValidationError> {
    raw.iter().map(normalize).collect()
}

fn parse_number(field: RuleField, raw: &str) -> Result<f64, ValidationError> {
    raw.parse::<f64>().map_err(|_| ValidationError::NotNumeric {
        field,
        value: raw.to_string(),
    })
}
