use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::mailbox_message::{self, Column, Entity};
use crate::store::OpsStore;

/// In-app notification row (mailbox_messages table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxRow {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: mailbox_message::Model) -> MailboxRow {
    MailboxRow {
        id: m.id,
        tenant_id: m.tenant_id,
        title: m.title,
        body: m.body,
        is_read: m.is_read,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl OpsStore {
    pub async fn insert_mailbox_message(&self, row: &MailboxRow) -> Result<MailboxRow> {
        let am = mailbox_message::ActiveModel {
            id: Set(row.id.clone()),
            tenant_id: Set(row.tenant_id.clone()),
            title: Set(row.title.clone()),
            body: Set(row.body.clone()),
            is_read: Set(false),
            created_at: Set(row.created_at.fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn list_mailbox_messages(
        &self,
        tenant_id: &str,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MailboxRow>> {
        let mut q = Entity::find().filter(Column::TenantId.eq(tenant_id));
        if unread_only {
            q = q.filter(Column::IsRead.eq(false));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_mailbox_messages(&self, tenant_id: &str, unread_only: bool) -> Result<u64> {
        let mut q = Entity::find().filter(Column::TenantId.eq(tenant_id));
        if unread_only {
            q = q.filter(Column::IsRead.eq(false));
        }
        Ok(q.count(self.db()).await?)
    }

    pub async fn mark_mailbox_read(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let model = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db())
            .await?;
        if let Some(m) = model {
            let mut am: mailbox_message::ActiveModel = m.into();
            am.is_read = Set(true);
            am.update(self.db()).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
