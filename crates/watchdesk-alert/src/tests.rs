use crate::engine::{alert_matches, evaluate_tenant, rule_matches};
use crate::normalize::{normalize, normalize_rules, RawRule, ValidationError};
use crate::throttle::ThrottleGate;
use crate::{Alert, RuleValue};
use chrono::{TimeZone, Utc};
use watchdesk_common::types::{ChannelFlags, ListingEvent, RuleField, RuleOperator};

fn raw(field: &str, operator: &str, value: &str) -> RawRule {
    RawRule {
        field: field.to_string(),
        operator: operator.to_string(),
        value: value.to_string(),
    }
}

fn listing(brand: Option<&str>, price: Option<&str>) -> ListingEvent {
    ListingEvent {
        id: "listing-1".into(),
        tenant_id: "tenant-1".into(),
        group_id: None,
        brand: brand.map(str::to_string),
        model: None,
        reference: None,
        price: price.map(str::to_string),
        country: None,
        condition: None,
        seller: None,
        currency: None,
        observed_at: Utc::now(),
    }
}

fn alert(name: &str, raws: &[RawRule], max_per_day: u32) -> Alert {
    Alert {
        id: format!("alert-{name}"),
        tenant_id: "tenant-1".into(),
        name: name.to_string(),
        enabled: true,
        rules: normalize_rules(raws).unwrap(),
        channels: ChannelFlags::default(),
        max_per_day,
    }
}

// ---- Normalizer ----

#[test]
fn list_value_is_trimmed_and_empty_tokens_dropped() {
    let rule = normalize(&raw("brand", "in_list", "a, b ,, c")).unwrap();
    match rule.value {
        RuleValue::List(items) => assert_eq!(items, vec!["a", "b", "c"]),
        other => panic!("expected list value, got {other:?}"),
    }
}

#[test]
fn list_of_only_separators_is_rejected() {
    let err = normalize(&raw("brand", "in_list", ",")).unwrap_err();
    assert!(matches!(err, ValidationError::EmptyList));
}

#[test]
fn unknown_field_and_operator_are_rejected() {
    assert!(matches!(
        normalize(&raw("weight", "equals", "x")).unwrap_err(),
        ValidationError::UnknownField(_)
    ));
    assert!(matches!(
        normalize(&raw("brand", "matches", "x")).unwrap_err(),
        ValidationError::UnknownOperator(_)
    ));
}

#[test]
fn text_operators_are_rejected_for_price() {
    let err = normalize(&raw("price", "contains", "900")).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::OperatorNotAllowed {
            field: RuleField::Price,
            operator: RuleOperator::Contains,
        }
    ));
    assert!(normalize(&raw("price", "regex_match", "9.*")).is_err());
}

#[test]
fn non_numeric_price_value_is_rejected() {
    let err = normalize(&raw("price", "less_or_equal", "cheap")).unwrap_err();
    assert!(matches!(err, ValidationError::NotNumeric { .. }));
}

#[test]
fn bad_regex_pattern_is_rejected() {
    let err = normalize(&raw("model", "regex_match", "(unclosed")).unwrap_err();
    assert!(matches!(err, ValidationError::BadPattern { .. }));
}

// ---- Match engine ----

#[test]
fn alert_with_no_rules_never_matches() {
    let empty = alert("empty", &[], 0);
    assert!(!alert_matches(&listing(Some("Rolex"), Some("100")), &empty));
}

#[test]
fn equals_is_case_sensitive_and_contains_is_not() {
    let eq = normalize(&raw("brand", "equals", "Rolex")).unwrap();
    assert!(rule_matches(&listing(Some("Rolex"), None), &eq));
    assert!(!rule_matches(&listing(Some("rolex"), None), &eq));

    let contains = normalize(&raw("brand", "contains", "ROLEX")).unwrap();
    assert!(rule_matches(&listing(Some("Rolex Daytona"), None), &contains));
}

#[test]
fn numeric_comparison_against_non_numeric_listing_value_does_not_match() {
    let lte = normalize(&raw("price", "less_or_equal", "9000")).unwrap();
    assert!(!rule_matches(&listing(None, Some("POA")), &lte));
    assert!(!rule_matches(&listing(None, None), &lte));
    assert!(rule_matches(&listing(None, Some("8500")), &lte));
}

#[test]
fn numeric_comparison_tolerates_thousands_separators() {
    let lte = normalize(&raw("price", "less_or_equal", "9000")).unwrap();
    assert!(rule_matches(&listing(None, Some("8'500")), &lte));
    assert!(rule_matches(&listing(None, Some("8,500")), &lte));
}

#[test]
fn list_membership_and_negation() {
    let in_list = normalize(&raw("brand", "in_list", "Rolex, Omega")).unwrap();
    assert!(rule_matches(&listing(Some("Omega"), None), &in_list));
    assert!(!rule_matches(&listing(Some("Tudor"), None), &in_list));

    let not_in = normalize(&raw("brand", "not_in_list", "Rolex, Omega")).unwrap();
    assert!(rule_matches(&listing(Some("Tudor"), None), &not_in));
    assert!(!rule_matches(&listing(Some("Rolex"), None), &not_in));
}

#[test]
fn regex_does_not_match_when_field_is_missing() {
    let re = normalize(&raw("reference", "regex_match", "^116[0-9]{3}$")).unwrap();
    assert!(!rule_matches(&listing(Some("Rolex"), None), &re));

    let mut with_ref = listing(Some("Rolex"), None);
    with_ref.reference = Some("116500".into());
    assert!(rule_matches(&with_ref, &re));
}

#[test]
fn conjunction_requires_all_rules() {
    let a = alert(
        "rolex-under-9000",
        &[
            raw("brand", "equals", "Rolex"),
            raw("price", "less_or_equal", "9000"),
        ],
        0,
    );
    assert!(alert_matches(&listing(Some("Rolex"), Some("8500")), &a));
    assert!(!alert_matches(&listing(Some("Rolex"), Some("9500")), &a));
    assert!(!alert_matches(&listing(Some("Omega"), Some("8500")), &a));
}

#[test]
fn evaluate_tenant_skips_disabled_alerts_and_reports_reasons() {
    let mut disabled = alert("disabled", &[raw("brand", "equals", "Rolex")], 0);
    disabled.enabled = false;
    let enabled = alert("enabled", &[raw("brand", "equals", "Rolex")], 0);

    let results = evaluate_tenant(
        &listing(Some("Rolex"), Some("8500")),
        &[disabled, enabled],
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].alert_name, "enabled");
    assert!(results[0].reason.contains("brand equals Rolex"));
}

// ---- Throttle gate ----

#[test]
fn throttle_allows_exactly_the_daily_limit() {
    let gate = ThrottleGate::new(chrono_tz::Europe::Zurich);
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    for _ in 0..3 {
        assert!(gate.allow("alert-1", 3, now));
    }
    assert!(!gate.allow("alert-1", 3, now));
    // Other alerts are unaffected
    assert!(gate.allow("alert-2", 3, now));
}

#[test]
fn throttle_resets_at_local_midnight() {
    let gate = ThrottleGate::new(chrono_tz::Europe::Zurich);
    // 22:30 UTC on May 10 is 00:30 local on May 11 (CEST), so these two
    // instants land in different local days despite being 90 minutes apart.
    let evening = Utc.with_ymd_and_hms(2024, 5, 10, 21, 0, 0).unwrap();
    let past_midnight = Utc.with_ymd_and_hms(2024, 5, 10, 22, 30, 0).unwrap();

    assert!(gate.allow("alert-1", 1, evening));
    assert!(!gate.allow("alert-1", 1, evening));
    assert!(gate.allow("alert-1", 1, past_midnight));
}

#[test]
fn throttle_limit_zero_means_unlimited() {
    let gate = ThrottleGate::new(chrono_tz::UTC);
    let now = Utc::now();
    for _ in 0..100 {
        assert!(gate.allow("alert-1", 0, now));
    }
}

// ---- End to end ----

#[test]
fn rolex_under_9000_fires_once_per_day() {
    let a = alert(
        "rolex-deal",
        &[
            raw("brand", "equals", "Rolex"),
            raw("price", "less_or_equal", "9000"),
        ],
        1,
    );
    let gate = ThrottleGate::new(chrono_tz::UTC);
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
    let event = listing(Some("Rolex"), Some("8500"));

    let first = evaluate_tenant(&event, std::slice::from_ref(&a));
    assert_eq!(first.len(), 1);
    assert!(gate.allow(&a.id, a.max_per_day, now));

    let second = evaluate_tenant(&event, std::slice::from_ref(&a));
    assert_eq!(second.len(), 1, "matching is unaffected by throttling");
    assert!(!gate.allow(&a.id, a.max_per_day, now));
}
