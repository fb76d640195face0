use crate::{Alert, Rule, RuleValue};
use watchdesk_common::types::{ListingEvent, MatchResult, RuleOperator};

/// Evaluate one rule against one listing.
///
/// A listing field that is missing entirely never matches, regardless of
/// operator. Numeric comparisons against an unparseable listing value do
/// not match (they never error).
pub fn rule_matches(listing: &ListingEvent, rule: &Rule) -> bool {
    let Some(observed) = listing.field(rule.field) else {
        return false;
    };

    match (&rule.operator, &rule.value) {
        (RuleOperator::Equals, RuleValue::Text(expected)) => observed == expected,
        (RuleOperator::NotEquals, RuleValue::Text(expected)) => observed != expected,
        (RuleOperator::Equals, RuleValue::Number(expected)) => {
            parse_observed(observed).is_some_and(|v| v == *expected)
        }
        (RuleOperator::NotEquals, RuleValue::Number(expected)) => {
            parse_observed(observed).is_some_and(|v| v != *expected)
        }
        (RuleOperator::Contains, RuleValue::Text(expected)) => observed
            .to_lowercase()
            .contains(&expected.to_lowercase()),
        (RuleOperator::LessOrEqual, RuleValue::Number(limit)) => {
            parse_observed(observed).is_some_and(|v| v <= *limit)
        }
        (RuleOperator::GreaterOrEqual, RuleValue::Number(limit)) => {
            parse_observed(observed).is_some_and(|v| v >= *limit)
        }
        (RuleOperator::InList, RuleValue::List(items)) => {
            items.iter().any(|item| item == observed)
        }
        (RuleOperator::NotInList, RuleValue::List(items)) => {
            !items.iter().any(|item| item == observed)
        }
        (RuleOperator::RegexMatch, RuleValue::Pattern(re)) => re.is_match(observed),
        // Operator/value shape mismatches cannot be produced by the
        // normalizer; treat them as non-matching rather than panicking.
        _ => false,
    }
}

/// Listing prices arrive as raw source strings; tolerate thousands
/// separators like `8'500` or `8,500` before parsing.
fn parse_observed(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok()
}

/// True iff every rule of the alert matches (conjunction). An alert with
/// zero rules never matches.
pub fn alert_matches(listing: &ListingEvent, alert: &Alert) -> bool {
    if alert.rules.is_empty() {
        return false;
    }
    alert.rules.iter().all(|rule| rule_matches(listing, rule))
}

/// Evaluate one listing against a tenant's alert set.
///
/// Hot path: read-only over its inputs, safe to call concurrently from
/// many ingestion workers as long as callers pass an immutable snapshot
/// of the alert list.
pub fn evaluate_tenant(listing: &ListingEvent, alerts: &[Alert]) -> Vec<MatchResult> {
    let mut results = Vec::new();
    for alert in alerts {
        if !alert.enabled {
            continue;
        }
        if alert_matches(listing, alert) {
            let reason = alert
                .rules
                .iter()
                .map(Rule::describe)
                .collect::<Vec<_>>()
                .join(", ");
            tracing::debug!(
                alert_id = %alert.id,
                listing_id = %listing.id,
                %reason,
                "Alert matched listing"
            );
            results.push(MatchResult {
                alert_id: alert.id.clone(),
                alert_name: alert.name.clone(),
                reason,
            });
        }
    }
    results
}
