//! Per-tenant session workers and their front door.
//!
//! A worker task owns the whole session state for one tenant; everything
//! else talks to it over an mpsc command channel, so there is exactly one
//! writer per tenant and no lock is ever held across a bridge call. Every
//! state change is published on a watch channel with a bumped `seq`, which
//! feeds both the polling endpoint and the server-sent event stream.

use crate::{Connector, SessionError, SessionPush};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use watchdesk_common::types::{SessionSnapshot, SessionStatus};

const COMMAND_BUFFER: usize = 32;

enum Command {
    StartLink {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Logout {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Push(SessionPush),
}

#[derive(Clone)]
struct TenantHandle {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

/// Front door to all tenant sessions. Cheap to share behind an `Arc`.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    liveness_interval: Duration,
    tenants: Mutex<HashMap<String, TenantHandle>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, liveness_interval: Duration) -> Self {
        Self {
            connector,
            liveness_interval,
            tenants: Mutex::new(HashMap::new()),
        }
    }

    /// Begin (or resume) the link handshake for a tenant. Idempotent: a
    /// session that is already `ready` is left untouched.
    pub async fn start_link(&self, tenant_id: &str) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(tenant_id);
        let (reply, rx) = oneshot::channel();
        handle
            .cmd_tx
            .send(Command::StartLink { reply })
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        rx.await.map_err(|_| SessionError::WorkerGone)??;
        let snapshot = handle.snapshot_rx.borrow().clone();
        Ok(snapshot)
    }

    /// Unlink the tenant's session. Local state is cleared even when the
    /// bridge-side teardown fails.
    pub async fn logout(&self, tenant_id: &str) -> Result<(), SessionError> {
        let handle = self.handle(tenant_id);
        let (reply, rx) = oneshot::channel();
        handle
            .cmd_tx
            .send(Command::Logout { reply })
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        rx.await.map_err(|_| SessionError::WorkerGone)?
    }

    /// Apply a push event from the bridge to the tenant's session.
    pub async fn push(&self, tenant_id: &str, event: SessionPush) -> Result<(), SessionError> {
        self.handle(tenant_id)
            .cmd_tx
            .send(Command::Push(event))
            .await
            .map_err(|_| SessionError::WorkerGone)
    }

    /// Latest snapshot for the tenant; `disconnected` if it never linked.
    pub fn snapshot(&self, tenant_id: &str) -> SessionSnapshot {
        self.handle(tenant_id).snapshot_rx.borrow().clone()
    }

    /// Subscribe to the tenant's snapshot stream. The receiver observes
    /// the latest value on every change; intermediate states may coalesce.
    pub fn subscribe(&self, tenant_id: &str) -> watch::Receiver<SessionSnapshot> {
        self.handle(tenant_id).snapshot_rx.clone()
    }

    /// Discover the chat groups visible to the tenant's linked account.
    pub async fn list_groups(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<crate::ConnectorGroup>, SessionError> {
        if self.snapshot(tenant_id).status != SessionStatus::Ready {
            return Err(SessionError::NotLinked);
        }
        self.connector.list_groups(tenant_id).await
    }

    /// Send a text message through the tenant's linked account.
    pub async fn send_text(
        &self,
        tenant_id: &str,
        recipient: &str,
        body: &str,
    ) -> Result<(), SessionError> {
        if self.snapshot(tenant_id).status != SessionStatus::Ready {
            return Err(SessionError::NotLinked);
        }
        self.connector.send_text(tenant_id, recipient, body).await
    }

    fn handle(&self, tenant_id: &str) -> TenantHandle {
        let mut tenants = self.tenants.lock().unwrap_or_else(|p| p.into_inner());
        tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| {
                let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
                let (snapshot_tx, snapshot_rx) =
                    watch::channel(SessionSnapshot::initial(tenant_id));
                let worker = SessionWorker {
                    connector: Arc::clone(&self.connector),
                    state: SessionSnapshot::initial(tenant_id),
                    publisher: snapshot_tx,
                };
                tokio::spawn(worker.run(cmd_rx, self.liveness_interval));
                tracing::debug!(tenant_id, "Spawned session worker");
                TenantHandle {
                    cmd_tx,
                    snapshot_rx,
                }
            })
            .clone()
    }
}

/// Owns one tenant's session state. Single writer by construction.
struct SessionWorker {
    connector: Arc<dyn Connector>,
    state: SessionSnapshot,
    publisher: watch::Sender<SessionSnapshot>,
}

impl SessionWorker {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, liveness: Duration) {
        let mut ticker = tokio::time::interval(liveness);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval fires immediately once; harmless before any link
        ticker.tick().await;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle(cmd).await;
                }
                _ = ticker.tick() => self.on_tick().await,
            }
        }
        tracing::debug!(tenant_id = %self.state.tenant_id, "Session worker stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::StartLink { reply } => {
                let _ = reply.send(self.start_link().await);
            }
            Command::Logout { reply } => {
                let _ = reply.send(self.logout().await);
            }
            Command::Push(event) => self.apply_push(event),
        }
    }

    async fn start_link(&mut self) -> Result<(), SessionError> {
        if self.state.status == SessionStatus::Ready {
            return Ok(());
        }
        self.state.status = SessionStatus::Connecting;
        self.state.qr_code = None;
        self.state.identity = None;
        self.state.last_error = None;
        self.publish();

        match self.connector.begin_link(&self.state.tenant_id).await {
            Ok(ticket) => {
                if let Some(code) = ticket.qr_code {
                    self.state.status = SessionStatus::QrPending;
                    self.state.qr_code = Some(code);
                    self.publish();
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    tenant_id = %self.state.tenant_id,
                    error = %err,
                    "Link handshake failed to start"
                );
                self.state.status = SessionStatus::Error;
                self.state.last_error = Some(err.to_string());
                self.publish();
                Err(err)
            }
        }
    }

    async fn logout(&mut self) -> Result<(), SessionError> {
        let result = self.connector.logout(&self.state.tenant_id).await;
        if let Err(err) = &result {
            tracing::warn!(
                tenant_id = %self.state.tenant_id,
                error = %err,
                "Bridge logout failed; clearing local session anyway"
            );
        }
        self.state.status = SessionStatus::Disconnected;
        self.state.qr_code = None;
        self.state.identity = None;
        self.state.last_error = None;
        self.publish();
        result
    }

    fn apply_push(&mut self, event: SessionPush) {
        match event {
            SessionPush::Qr { code } => {
                // A QR after the handshake completed is stale noise.
                if self.state.status == SessionStatus::Ready {
                    return;
                }
                self.state.status = SessionStatus::QrPending;
                self.state.qr_code = Some(code);
            }
            SessionPush::Connected { identity } => {
                tracing::info!(
                    tenant_id = %self.state.tenant_id,
                    display_name = %identity.display_name,
                    "Session linked"
                );
                self.state.status = SessionStatus::Ready;
                self.state.identity = Some(identity);
                self.state.qr_code = None;
                self.state.last_error = None;
            }
            SessionPush::Disconnected { reason } => {
                self.state.status = SessionStatus::Disconnected;
                self.state.identity = None;
                self.state.qr_code = None;
                self.state.last_error = reason;
            }
            SessionPush::Error { message } => {
                tracing::warn!(
                    tenant_id = %self.state.tenant_id,
                    error = %message,
                    "Bridge reported session error"
                );
                self.state.status = SessionStatus::Error;
                self.state.qr_code = None;
                self.state.last_error = Some(message);
            }
        }
        self.publish();
    }

    /// Polling fallback for tenants whose bridge never pushes: a `ready`
    /// session that stops answering the health probe is demoted, and a
    /// lingering `error` settles into `disconnected` with the message kept.
    async fn on_tick(&mut self) {
        match self.state.status {
            SessionStatus::Ready => {
                if !self.connector.is_alive(&self.state.tenant_id).await {
                    tracing::warn!(
                        tenant_id = %self.state.tenant_id,
                        "Linked session stopped answering liveness probe"
                    );
                    self.state.status = SessionStatus::Disconnected;
                    self.state.identity = None;
                    self.state.qr_code = None;
                    self.state.last_error = Some("connection lost".to_string());
                    self.publish();
                }
            }
            SessionStatus::Error => {
                self.state.status = SessionStatus::Disconnected;
                self.publish();
            }
            _ => {}
        }
    }

    fn publish(&mut self) {
        self.state.seq += 1;
        self.state.updated_at = Utc::now();
        let _ = self.publisher.send(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectorGroup, LinkTicket};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use watchdesk_common::types::SessionIdentity;

    struct MockConnector {
        qr_on_link: Option<String>,
        fail_link: bool,
        alive: AtomicBool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Default for MockConnector {
        fn default() -> Self {
            Self {
                qr_on_link: Some("qr-1".to_string()),
                fail_link: false,
                alive: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn begin_link(&self, _tenant_id: &str) -> Result<LinkTicket, SessionError> {
            if self.fail_link {
                return Err(SessionError::Bridge("boom".to_string()));
            }
            Ok(LinkTicket {
                qr_code: self.qr_on_link.clone(),
            })
        }

        async fn logout(&self, _tenant_id: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn is_alive(&self, _tenant_id: &str) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn list_groups(&self, _tenant_id: &str) -> Result<Vec<ConnectorGroup>, SessionError> {
            Ok(Vec::new())
        }

        async fn send_text(
            &self,
            _tenant_id: &str,
            recipient: &str,
            body: &str,
        ) -> Result<(), SessionError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn manager(connector: MockConnector) -> SessionManager {
        SessionManager::new(Arc::new(connector), Duration::from_secs(30))
    }

    fn identity() -> SessionIdentity {
        SessionIdentity {
            display_name: "Dealer Desk".to_string(),
            connection_id: "41790000000".to_string(),
            device_label: Some("workstation".to_string()),
        }
    }

    #[tokio::test]
    async fn link_flow_reaches_ready() {
        let mgr = manager(MockConnector::default());

        let snap = mgr.start_link("t1").await.unwrap();
        assert_eq!(snap.status, SessionStatus::QrPending);
        assert_eq!(snap.qr_code.as_deref(), Some("qr-1"));

        mgr.push("t1", SessionPush::Connected { identity: identity() })
            .await
            .unwrap();
        let mut rx = mgr.subscribe("t1");
        rx.wait_for(|s| s.status == SessionStatus::Ready)
            .await
            .unwrap();

        let snap = mgr.snapshot("t1");
        assert_eq!(snap.status, SessionStatus::Ready);
        assert_eq!(snap.identity.unwrap().display_name, "Dealer Desk");
        assert!(snap.qr_code.is_none());
        assert!(snap.seq > 0);
    }

    #[tokio::test]
    async fn start_link_is_idempotent_when_ready() {
        let mgr = manager(MockConnector::default());
        mgr.start_link("t1").await.unwrap();
        mgr.push("t1", SessionPush::Connected { identity: identity() })
            .await
            .unwrap();
        let mut rx = mgr.subscribe("t1");
        rx.wait_for(|s| s.status == SessionStatus::Ready)
            .await
            .unwrap();
        let seq_before = mgr.snapshot("t1").seq;

        let snap = mgr.start_link("t1").await.unwrap();
        assert_eq!(snap.status, SessionStatus::Ready);
        assert_eq!(snap.seq, seq_before, "no state change on re-link");
    }

    #[tokio::test]
    async fn failed_link_surfaces_error_state() {
        let mgr = manager(MockConnector {
            fail_link: true,
            ..MockConnector::default()
        });

        let err = mgr.start_link("t1").await.unwrap_err();
        assert!(matches!(err, SessionError::Bridge(_)));

        let snap = mgr.snapshot("t1");
        assert_eq!(snap.status, SessionStatus::Error);
        assert!(snap.last_error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn logout_clears_identity_and_qr() {
        let mgr = manager(MockConnector::default());
        mgr.start_link("t1").await.unwrap();
        mgr.push("t1", SessionPush::Connected { identity: identity() })
            .await
            .unwrap();
        let mut rx = mgr.subscribe("t1");
        rx.wait_for(|s| s.status == SessionStatus::Ready)
            .await
            .unwrap();

        mgr.logout("t1").await.unwrap();
        let snap = rx
            .wait_for(|s| s.status == SessionStatus::Disconnected)
            .await
            .unwrap()
            .clone();
        assert!(snap.identity.is_none());
        assert!(snap.qr_code.is_none());
    }

    #[tokio::test]
    async fn qr_push_after_ready_is_ignored() {
        let mgr = manager(MockConnector::default());
        mgr.start_link("t1").await.unwrap();
        mgr.push("t1", SessionPush::Connected { identity: identity() })
            .await
            .unwrap();
        let mut rx = mgr.subscribe("t1");
        rx.wait_for(|s| s.status == SessionStatus::Ready)
            .await
            .unwrap();
        let seq_before = mgr.snapshot("t1").seq;

        mgr.push(
            "t1",
            SessionPush::Qr {
                code: "stale".to_string(),
            },
        )
        .await
        .unwrap();
        // Drain the command queue with an unrelated no-op round trip.
        mgr.start_link("t1").await.unwrap();

        let snap = mgr.snapshot("t1");
        assert_eq!(snap.status, SessionStatus::Ready);
        assert_eq!(snap.seq, seq_before);
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_tick_demotes_stale_ready_session() {
        let connector = MockConnector::default();
        connector.alive.store(false, Ordering::SeqCst);
        let mgr = SessionManager::new(Arc::new(connector), Duration::from_secs(30));

        mgr.start_link("t1").await.unwrap();
        mgr.push("t1", SessionPush::Connected { identity: identity() })
            .await
            .unwrap();
        let mut rx = mgr.subscribe("t1");
        rx.wait_for(|s| s.status == SessionStatus::Ready)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let snap = rx
            .wait_for(|s| s.status == SessionStatus::Disconnected)
            .await
            .unwrap()
            .clone();
        assert_eq!(snap.last_error.as_deref(), Some("connection lost"));
        assert!(snap.identity.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn error_state_settles_into_disconnected() {
        let mgr = manager(MockConnector::default());
        mgr.push(
            "t1",
            SessionPush::Error {
                message: "stream torn down".to_string(),
            },
        )
        .await
        .unwrap();
        let mut rx = mgr.subscribe("t1");
        rx.wait_for(|s| s.status == SessionStatus::Error)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let snap = rx
            .wait_for(|s| s.status == SessionStatus::Disconnected)
            .await
            .unwrap()
            .clone();
        assert_eq!(snap.last_error.as_deref(), Some("stream torn down"));
    }

    #[tokio::test]
    async fn send_text_requires_linked_session() {
        let mgr = manager(MockConnector::default());
        let err = mgr.send_text("t1", "group-1", "hello").await.unwrap_err();
        assert!(matches!(err, SessionError::NotLinked));
    }
}
