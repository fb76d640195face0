use crate::error::NotifyError;
use crate::{format_body, NotificationChannel};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use watchdesk_common::types::{AlertEvent, ChannelFlags, ListingEvent};
use watchdesk_storage::{MailboxRow, OpsStore};

/// Writes fired alerts into the tenant's dashboard mailbox.
pub struct InAppChannel {
    store: Arc<OpsStore>,
}

impl InAppChannel {
    pub fn new(store: Arc<OpsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationChannel for InAppChannel {
    fn name(&self) -> &'static str {
        "in_app"
    }

    fn wants(&self, flags: &ChannelFlags) -> bool {
        flags.in_app
    }

    async fn deliver(
        &self,
        event: &AlertEvent,
        listing: &ListingEvent,
    ) -> Result<(), NotifyError> {
        self.store
            .insert_mailbox_message(&MailboxRow {
                id: watchdesk_common::id::next_id(),
                tenant_id: event.tenant_id.clone(),
                title: format!("Alert fired: {}", event.alert_name),
                body: format_body(event, listing),
                is_read: false,
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
