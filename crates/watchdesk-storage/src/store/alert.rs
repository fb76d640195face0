use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use watchdesk_common::types::ChannelFlags;

use crate::entities::alert::{self, Column, Entity};
use crate::store::OpsStore;

/// Alert definition row (alerts table). Rules are stored as the raw
/// user-authored JSON and re-normalized on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub enabled: bool,
    pub rules_json: String,
    pub channels: ChannelFlags,
    pub max_per_day: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: alert::Model) -> AlertRow {
    AlertRow {
        id: m.id,
        tenant_id: m.tenant_id,
        name: m.name,
        enabled: m.enabled,
        rules_json: m.rules_json,
        channels: ChannelFlags {
            in_app: m.notify_in_app,
            email: m.notify_email,
            whatsapp: m.notify_whatsapp,
        },
        max_per_day: m.max_per_day,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl OpsStore {
    pub async fn insert_alert(&self, row: &AlertRow) -> Result<AlertRow> {
        let now = Utc::now().fixed_offset();
        let am = alert::ActiveModel {
            id: Set(row.id.clone()),
            tenant_id: Set(row.tenant_id.clone()),
            name: Set(row.name.clone()),
            enabled: Set(row.enabled),
            rules_json: Set(row.rules_json.clone()),
            notify_in_app: Set(row.channels.in_app),
            notify_email: Set(row.channels.email),
            notify_whatsapp: Set(row.channels.whatsapp),
            max_per_day: Set(row.max_per_day),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_alert(&self, tenant_id: &str, id: &str) -> Result<Option<AlertRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_alerts(
        &self,
        tenant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlertRow>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_alerts(&self, tenant_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .count(self.db())
            .await?)
    }

    pub async fn update_alert(
        &self,
        tenant_id: &str,
        id: &str,
        row: &AlertRow,
    ) -> Result<Option<AlertRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db())
            .await?;
        if let Some(m) = model {
            let mut am: alert::ActiveModel = m.into();
            am.name = Set(row.name.clone());
            am.enabled = Set(row.enabled);
            am.rules_json = Set(row.rules_json.clone());
            am.notify_in_app = Set(row.channels.in_app);
            am.notify_email = Set(row.channels.email);
            am.notify_whatsapp = Set(row.channels.whatsapp);
            am.max_per_day = Set(row.max_per_day);
            am.updated_at = Set(Utc::now().fixed_offset());
            let updated = am.update(self.db()).await?;
            Ok(Some(to_row(updated)))
        } else {
            Ok(None)
        }
    }

    pub async fn delete_alert(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let res = Entity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::TenantId.eq(tenant_id))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn set_alert_enabled(
        &self,
        tenant_id: &str,
        id: &str,
        enabled: bool,
    ) -> Result<Option<AlertRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db())
            .await?;
        if let Some(m) = model {
            let mut am: alert::ActiveModel = m.into();
            am.enabled = Set(enabled);
            am.updated_at = Set(Utc::now().fixed_offset());
            let updated = am.update(self.db()).await?;
            Ok(Some(to_row(updated)))
        } else {
            Ok(None)
        }
    }

    /// All of a tenant's alerts in creation order, for cache (re)builds.
    pub async fn list_all_alerts(&self, tenant_id: &str) -> Result<Vec<AlertRow>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }
}
