use crate::error::NotifyError;
use crate::{format_body, NotificationChannel};
use async_trait::async_trait;
use std::sync::Arc;
use watchdesk_common::types::{AlertEvent, ChannelFlags, ListingEvent};
use watchdesk_session::manager::SessionManager;

/// Sends fired alerts as a chat message through the tenant's own linked
/// messaging account. Delivery requires the session to be `ready`; when
/// it is not, the error propagates and the dispatcher logs it without
/// touching the other sinks.
pub struct WhatsappChannel {
    sessions: Arc<SessionManager>,
    recipient: String,
}

impl WhatsappChannel {
    /// `recipient` is the chat id (contact or group) alerts are sent to.
    pub fn new(sessions: Arc<SessionManager>, recipient: &str) -> Self {
        Self {
            sessions,
            recipient: recipient.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WhatsappChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn wants(&self, flags: &ChannelFlags) -> bool {
        flags.whatsapp
    }

    async fn deliver(
        &self,
        event: &AlertEvent,
        listing: &ListingEvent,
    ) -> Result<(), NotifyError> {
        let body = format_body(event, listing);
        self.sessions
            .send_text(&event.tenant_id, &self.recipient, &body)
            .await?;
        Ok(())
    }
}
