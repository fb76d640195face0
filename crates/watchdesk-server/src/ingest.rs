//! Listing ingestion pipeline: group gate, rule evaluation, throttling
//! and notification fan-out, in that order.

use crate::state::AppState;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use watchdesk_alert::engine::evaluate_tenant;
use watchdesk_common::types::ListingEvent;

/// What happened to one ingested listing.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct IngestOutcome {
    /// Alerts whose rules all matched
    pub matched: usize,
    /// Matches that were dispatched to their channels
    pub delivered: usize,
    /// Matches suppressed by the daily limit
    pub throttled: usize,
    /// True when the listing's source group is not opted in
    pub skipped_group: bool,
}

/// Run one listing through the tenant's alert set.
///
/// Listings from a known group that is not opted in are dropped before
/// evaluation. Throttling is checked per matched alert, after evaluation,
/// so one capped alert never shadows another.
pub async fn process_listing(state: &AppState, listing: &ListingEvent) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();

    if let Some(group_id) = &listing.group_id {
        let included = state.store.list_included_group_ids(&listing.tenant_id).await?;
        if !included.iter().any(|id| id == group_id) {
            tracing::debug!(
                tenant_id = %listing.tenant_id,
                group_id = %group_id,
                listing_id = %listing.id,
                "Listing dropped: source group not opted in"
            );
            outcome.skipped_group = true;
            return Ok(outcome);
        }
    }

    let alerts = state.alerts.tenant_alerts(&listing.tenant_id).await?;
    let matches = evaluate_tenant(listing, &alerts);
    outcome.matched = matches.len();

    for result in &matches {
        // The snapshot that produced the match still holds the alert.
        let Some(alert) = alerts.iter().find(|a| a.id == result.alert_id) else {
            continue;
        };

        if !state
            .throttle
            .allow(&alert.id, alert.max_per_day, Utc::now())
        {
            outcome.throttled += 1;
            continue;
        }

        state.dispatcher.dispatch(alert, listing, result).await;
        outcome.delivered += 1;
    }

    if outcome.matched > 0 {
        tracing::info!(
            tenant_id = %listing.tenant_id,
            listing_id = %listing.id,
            matched = outcome.matched,
            delivered = outcome.delivered,
            throttled = outcome.throttled,
            "Listing evaluated"
        );
    }

    Ok(outcome)
}
