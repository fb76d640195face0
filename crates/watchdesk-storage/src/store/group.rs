use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use watchdesk_common::types::GroupInfo;

use crate::entities::chat_group::{self, Column, Entity};
use crate::store::OpsStore;

/// Chat-group registry row (chat_groups table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: String,
    pub tenant_id: String,
    pub external_id: String,
    pub name: String,
    pub included: bool,
    pub present: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: chat_group::Model) -> GroupRow {
    GroupRow {
        id: m.id,
        tenant_id: m.tenant_id,
        external_id: m.external_id,
        name: m.name,
        included: m.included,
        present: m.present,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl GroupRow {
    pub fn to_info(&self) -> GroupInfo {
        GroupInfo {
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            included: self.included,
            present: self.present,
        }
    }
}

// Deterministic per-tenant key keeps discovery idempotent.
fn row_id(tenant_id: &str, external_id: &str) -> String {
    format!("{tenant_id}:{external_id}")
}

impl OpsStore {
    /// Replace the tenant's registry with a merged discovery result.
    /// Callers merge first (inclusion flags survive there); this write is
    /// a plain swap inside one transaction.
    pub async fn replace_groups(&self, tenant_id: &str, groups: &[GroupInfo]) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let txn = self.db().begin().await?;

        Entity::delete_many()
            .filter(Column::TenantId.eq(tenant_id))
            .exec(&txn)
            .await?;

        for group in groups {
            let am = chat_group::ActiveModel {
                id: Set(row_id(tenant_id, &group.external_id)),
                tenant_id: Set(tenant_id.to_string()),
                external_id: Set(group.external_id.clone()),
                name: Set(group.name.clone()),
                included: Set(group.included),
                present: Set(group.present),
                created_at: Set(now),
                updated_at: Set(now),
            };
            am.insert(&txn).await?;
        }

        txn.commit().await?;
        tracing::debug!(tenant_id, count = groups.len(), "Replaced group registry");
        Ok(())
    }

    pub async fn list_groups(&self, tenant_id: &str) -> Result<Vec<GroupInfo>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| to_row(m).to_info()).collect())
    }

    /// Flip the tenant's ingestion opt-in for one group. Returns false
    /// when the group is unknown.
    pub async fn set_group_included(
        &self,
        tenant_id: &str,
        external_id: &str,
        included: bool,
    ) -> Result<bool> {
        let model = Entity::find_by_id(row_id(tenant_id, external_id))
            .one(self.db())
            .await?;
        if let Some(m) = model {
            let mut am: chat_group::ActiveModel = m.into();
            am.included = Set(included);
            am.updated_at = Set(Utc::now().fixed_offset());
            am.update(self.db()).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Mark every group absent, keeping inclusion flags. Used on logout:
    /// discovery state is gone with the session, the tenant's choices stay.
    pub async fn mark_groups_absent(&self, tenant_id: &str) -> Result<()> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Present.eq(true))
            .all(self.db())
            .await?;
        for m in rows {
            let mut am: chat_group::ActiveModel = m.into();
            am.present = Set(false);
            am.updated_at = Set(Utc::now().fixed_offset());
            am.update(self.db()).await?;
        }
        Ok(())
    }

    /// External ids of groups currently opted in to ingestion.
    pub async fn list_included_group_ids(&self, tenant_id: &str) -> Result<Vec<String>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Included.eq(true))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| m.external_id).collect())
    }
}
