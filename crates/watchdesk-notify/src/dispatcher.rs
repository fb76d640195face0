use crate::NotificationChannel;
use chrono::Utc;
use std::sync::Arc;
use watchdesk_alert::Alert;
use watchdesk_common::types::{AlertEvent, ListingEvent, MatchResult};
use watchdesk_storage::OpsStore;

/// Fans one fired alert out to the event log and the opted-in sinks.
pub struct Dispatcher {
    store: Arc<OpsStore>,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new(store: Arc<OpsStore>, channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { store, channels }
    }

    /// Record the fired alert and deliver it.
    ///
    /// The event-log append always happens, before any sink runs, so the
    /// history is complete even when every delivery fails. Sink errors
    /// are logged per channel and never stop the remaining channels.
    pub async fn dispatch(
        &self,
        alert: &Alert,
        listing: &ListingEvent,
        result: &MatchResult,
    ) -> AlertEvent {
        let event = AlertEvent {
            id: watchdesk_common::id::next_id(),
            tenant_id: listing.tenant_id.clone(),
            alert_id: result.alert_id.clone(),
            alert_name: result.alert_name.clone(),
            listing_id: listing.id.clone(),
            reason: result.reason.clone(),
            fired_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_alert_event(&event).await {
            tracing::error!(
                alert_id = %event.alert_id,
                error = %e,
                "Failed to append alert event to the log"
            );
        }

        for channel in &self.channels {
            if !channel.wants(&alert.channels) {
                continue;
            }
            if let Err(e) = channel.deliver(&event, listing).await {
                tracing::error!(
                    channel = channel.name(),
                    alert_id = %event.alert_id,
                    error = %e,
                    "Notification delivery failed"
                );
            } else {
                tracing::info!(
                    channel = channel.name(),
                    alert_id = %event.alert_id,
                    listing_id = %event.listing_id,
                    "Notification delivered"
                );
            }
        }

        event
    }
}
