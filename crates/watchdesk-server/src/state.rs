use crate::alert_cache::AlertCache;
use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use watchdesk_alert::throttle::ThrottleGate;
use watchdesk_notify::dispatcher::Dispatcher;
use watchdesk_session::manager::SessionManager;
use watchdesk_storage::OpsStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<OpsStore>,
    pub sessions: Arc<SessionManager>,
    pub alerts: Arc<AlertCache>,
    pub throttle: Arc<ThrottleGate>,
    pub dispatcher: Arc<Dispatcher>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
