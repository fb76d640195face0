//! Messaging-session lifecycle and group registry.
//!
//! Each tenant owns at most one session against the external messaging
//! bridge. All session state lives in a per-tenant worker task; callers
//! interact through [`manager::SessionManager`], which forwards commands
//! over a channel and republishes every state change on a watch channel.
//! Consumers either poll the latest [`SessionSnapshot`] or subscribe to
//! the stream of changes.
//!
//! [`SessionSnapshot`]: watchdesk_common::types::SessionSnapshot

pub mod manager;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Session-layer failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The bridge rejected or failed a request.
    #[error("bridge request failed: {0}")]
    Bridge(String),

    /// Operation requires a linked session.
    #[error("session is not linked")]
    NotLinked,

    /// The per-tenant worker task is no longer running.
    #[error("session worker is gone")]
    WorkerGone,
}

/// Result of asking the bridge to start a link handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTicket {
    /// QR code payload, when the bridge returns one synchronously.
    /// Otherwise the code arrives later as a [`SessionPush::Qr`].
    pub qr_code: Option<String>,
}

/// One chat group as reported by the bridge during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorGroup {
    pub external_id: String,
    pub name: String,
}

/// Event pushed by the bridge about one tenant's session.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionPush {
    /// A fresh (or renewed) QR code for the pending handshake.
    Qr { code: String },
    /// The handshake completed; the account is linked.
    Connected {
        identity: watchdesk_common::types::SessionIdentity,
    },
    /// The bridge lost or closed the connection.
    Disconnected { reason: Option<String> },
    /// A bridge-side failure worth surfacing to the tenant.
    Error { message: String },
}

/// Client side of the external messaging bridge.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// concurrently for different tenants.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Ask the bridge to start a link handshake for the tenant.
    async fn begin_link(&self, tenant_id: &str) -> Result<LinkTicket, SessionError>;

    /// Tear down the tenant's link on the bridge side.
    async fn logout(&self, tenant_id: &str) -> Result<(), SessionError>;

    /// Cheap health probe for an established session.
    async fn is_alive(&self, tenant_id: &str) -> bool;

    /// Enumerate the chat groups currently visible to the linked account.
    async fn list_groups(&self, tenant_id: &str) -> Result<Vec<ConnectorGroup>, SessionError>;

    /// Send a text message through the linked account.
    async fn send_text(
        &self,
        tenant_id: &str,
        recipient: &str,
        body: &str,
    ) -> Result<(), SessionError>;
}
