//! Persistence layer for the operations database.
//!
//! A single SQLite database (WAL mode) holds alert definitions, the
//! append-only alert event log, the per-tenant chat-group registry, and
//! the in-app mailbox. All access goes through [`store::OpsStore`]; the
//! SeaORM entities never leak past this crate, callers see plain `Row`
//! types.

pub mod entities;
pub mod store;


pub use store::{AlertRow, GroupRow, MailboxRow, OpsStore};
