//! Notification fan-out for fired alerts.
//!
//! The [`dispatcher::Dispatcher`] is the single entry point: it appends
//! the fired alert to the event log first, then delivers to each channel
//! the alert opted into. Channel failures are isolated; one sink being
//! down never blocks the log append or the other sinks.

pub mod channels;
pub mod dispatcher;
pub mod error;

use async_trait::async_trait;
use error::NotifyError;
use watchdesk_common::types::{AlertEvent, ChannelFlags, ListingEvent};

/// One delivery sink (in-app mailbox, email, outbound chat message).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel name, used in logs.
    fn name(&self) -> &'static str;

    /// Whether an alert with these channel flags wants this sink.
    fn wants(&self, flags: &ChannelFlags) -> bool;

    /// Deliver one fired alert. Implementations retry internally where it
    /// makes sense; a returned error means the delivery is lost.
    async fn deliver(&self, event: &AlertEvent, listing: &ListingEvent)
        -> Result<(), NotifyError>;
}

/// Plain-text summary shared by every sink.
pub(crate) fn format_body(event: &AlertEvent, listing: &ListingEvent) -> String {
    let mut lines = vec![
        format!("Alert: {}", event.alert_name),
        format!("Matched: {}", event.reason),
        format!("Listing: {}", event.listing_id),
    ];
    if let Some(brand) = &listing.brand {
        lines.push(format!("Brand: {brand}"));
    }
    if let Some(model) = &listing.model {
        lines.push(format!("Model: {model}"));
    }
    if let Some(reference) = &listing.reference {
        lines.push(format!("Reference: {reference}"));
    }
    if let Some(price) = &listing.price {
        let currency = listing.currency.as_deref().unwrap_or("");
        lines.push(format!("Price: {price} {currency}").trim_end().to_string());
    }
    if let Some(seller) = &listing.seller {
        lines.push(format!("Seller: {seller}"));
    }
    lines.push(format!("Seen: {}", listing.observed_at.format("%Y-%m-%d %H:%M:%S UTC")));
    lines.join("\n")
}
