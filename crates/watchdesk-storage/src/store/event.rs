use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use watchdesk_common::types::AlertEvent;

use crate::entities::alert_event::{self, Column, Entity};
use crate::store::OpsStore;

fn to_event(m: alert_event::Model) -> AlertEvent {
    AlertEvent {
        id: m.id,
        tenant_id: m.tenant_id,
        alert_id: m.alert_id,
        alert_name: m.alert_name,
        listing_id: m.listing_id,
        reason: m.reason,
        fired_at: m.fired_at.with_timezone(&Utc),
    }
}

impl OpsStore {
    /// Append one fired-alert record. The event log is append-only; there
    /// is deliberately no update or delete counterpart.
    pub async fn insert_alert_event(&self, event: &AlertEvent) -> Result<()> {
        let am = alert_event::ActiveModel {
            id: Set(event.id.clone()),
            tenant_id: Set(event.tenant_id.clone()),
            alert_id: Set(event.alert_id.clone()),
            alert_name: Set(event.alert_name.clone()),
            listing_id: Set(event.listing_id.clone()),
            reason: Set(event.reason.clone()),
            fired_at: Set(event.fired_at.fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    /// Event history, newest first, optionally narrowed to one alert.
    pub async fn list_alert_events(
        &self,
        tenant_id: &str,
        alert_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlertEvent>> {
        let mut q = Entity::find().filter(Column::TenantId.eq(tenant_id));
        if let Some(alert_id) = alert_id {
            q = q.filter(Column::AlertId.eq(alert_id));
        }
        let rows = q
            .order_by(Column::FiredAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_event).collect())
    }

    pub async fn count_alert_events(
        &self,
        tenant_id: &str,
        alert_id: Option<&str>,
    ) -> Result<u64> {
        let mut q = Entity::find().filter(Column::TenantId.eq(tenant_id));
        if let Some(alert_id) = alert_id {
            q = q.filter(Column::AlertId.eq(alert_id));
        }
        Ok(q.count(self.db()).await?)
    }
}
