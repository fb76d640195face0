//! Alert rule model, normalizer, match engine, and throttle gate.
//!
//! User-authored rules arrive as raw strings ([`normalize::RawRule`]), are
//! validated into the typed [`Rule`] form, and evaluated against listing
//! events by [`engine`]. An [`Alert`] is a conjunction: every rule must
//! match, and an alert with no rules never matches. The per-alert daily
//! fire limit is enforced by [`throttle::ThrottleGate`].

pub mod engine;
pub mod normalize;
pub mod throttle;

#[cfg(test)]
mod tests;

use regex::Regex;
use watchdesk_common::types::{ChannelFlags, RuleField, RuleOperator};

/// Normalized rule value. Built by [`normalize::normalize`], never
/// constructed from raw user input directly.
#[derive(Debug, Clone)]
pub enum RuleValue {
    /// Single trimmed string (all text operators)
    Text(String),
    /// Parsed number (price operators)
    Number(f64),
    /// Non-empty membership set (in_list / not_in_list)
    List(Vec<String>),
    /// Compiled pattern (regex_match)
    Pattern(Regex),
}

/// One validated rule: `field operator value`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub field: RuleField,
    pub operator: RuleOperator,
    pub value: RuleValue,
}

impl Rule {
    /// Short human-readable form, used to build match reasons.
    pub fn describe(&self) -> String {
        let value = match &self.value {
            RuleValue::Text(s) => s.clone(),
            RuleValue::Number(n) => format!("{n}"),
            RuleValue::List(items) => items.join(","),
            RuleValue::Pattern(re) => re.as_str().to_string(),
        };
        format!("{} {} {}", self.field, self.operator, value)
    }
}

/// Tenant-scoped alert definition with its normalized rule set.
///
/// Instances are immutable snapshots: an alert edit produces a fresh set
/// of `Alert` values rather than mutating one shared by in-flight
/// evaluations.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub enabled: bool,
    /// Conjunctive rule list; empty means the alert never matches
    pub rules: Vec<Rule>,
    pub channels: ChannelFlags,
    /// Max fires per calendar day; 0 disables throttling
    pub max_per_day: u32,
}
