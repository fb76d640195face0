use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

pub mod alert;
pub mod event;
pub mod group;
pub mod mailbox;

pub use alert::AlertRow;
pub use group::GroupRow;
pub use mailbox::MailboxRow;

/// Unified access layer for the operations database.
///
/// All methods are `async fn` over SeaORM + SQLite, and every query is
/// scoped by `tenant_id`; nothing in this store can read across tenants.
pub struct OpsStore {
    pub(crate) db: DatabaseConnection,
}

impl OpsStore {
    /// Connect and initialize the operations database.
    ///
    /// `db_url` is a full connection URL, e.g.
    /// `sqlite:///data/watchdesk.db?mode=rwc` or `sqlite::memory:`.
    /// Pending `sea-orm-migration` migrations run automatically.
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL mode only applies to file-backed SQLite
        if db_url.starts_with("sqlite://") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized operations store");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
