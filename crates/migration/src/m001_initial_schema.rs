use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    rules_json TEXT NOT NULL,
    notify_in_app INTEGER NOT NULL DEFAULT 0,
    notify_email INTEGER NOT NULL DEFAULT 0,
    notify_whatsapp INTEGER NOT NULL DEFAULT 0,
    max_per_day INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(tenant_id, name)
);
CREATE INDEX IF NOT EXISTS idx_alerts_tenant ON alerts(tenant_id);
CREATE INDEX IF NOT EXISTS idx_alerts_tenant_enabled ON alerts(tenant_id, enabled);

CREATE TABLE IF NOT EXISTS alert_events (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    alert_id TEXT NOT NULL,
    alert_name TEXT NOT NULL,
    listing_id TEXT NOT NULL,
    reason TEXT NOT NULL,
    fired_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_events_tenant_fired
    ON alert_events(tenant_id, fired_at DESC);
CREATE INDEX IF NOT EXISTS idx_alert_events_alert ON alert_events(alert_id);

CREATE TABLE IF NOT EXISTS chat_groups (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    external_id TEXT NOT NULL,
    name TEXT NOT NULL,
    included INTEGER NOT NULL DEFAULT 0,
    present INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(tenant_id, external_id)
);
CREATE INDEX IF NOT EXISTS idx_chat_groups_tenant ON chat_groups(tenant_id);

CREATE TABLE IF NOT EXISTS mailbox_messages (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_mailbox_tenant_created
    ON mailbox_messages(tenant_id, created_at DESC);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS mailbox_messages;
DROP TABLE IF EXISTS chat_groups;
DROP TABLE IF EXISTS alert_events;
DROP TABLE IF EXISTS alerts;
";
