use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use watchdesk_alert::throttle::ThrottleGate;
use watchdesk_notify::channels::email::EmailChannel;
use watchdesk_notify::channels::inapp::InAppChannel;
use watchdesk_notify::channels::whatsapp::WhatsappChannel;
use watchdesk_notify::dispatcher::Dispatcher;
use watchdesk_notify::NotificationChannel;
use watchdesk_server::alert_cache::AlertCache;
use watchdesk_server::app::build_http_app;
use watchdesk_server::config::ServerConfig;
use watchdesk_server::connector::BridgeConnector;
use watchdesk_server::state::AppState;
use watchdesk_session::manager::SessionManager;
use watchdesk_storage::OpsStore;

const DEFAULT_CONFIG_PATH: &str = "config/watchdesk.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("watchdesk=info,tower_http=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match ServerConfig::load(&config_path) {
        Ok(config) => {
            tracing::info!(path = %config_path, "Loaded configuration");
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_path, error = %e, "Config not loaded; using defaults");
            ServerConfig::default()
        }
    };

    watchdesk_common::id::init(1, 1);
    ensure_sqlite_dir(&config.db_url)?;

    let tz: Tz = config
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("invalid timezone in config")?;

    let store = Arc::new(OpsStore::new(&config.db_url).await?);
    let connector = Arc::new(BridgeConnector::new(&config.bridge)?);
    let sessions = Arc::new(SessionManager::new(
        connector,
        Duration::from_secs(config.bridge.liveness_interval_secs),
    ));

    let mut channels: Vec<Box<dyn NotificationChannel>> =
        vec![Box::new(InAppChannel::new(Arc::clone(&store)))];
    if let Some(email) = &config.notify.email {
        match EmailChannel::new(
            &email.smtp_host,
            email.smtp_port,
            email.smtp_username.as_deref(),
            email.smtp_password.as_deref(),
            &email.from,
            email.recipients.clone(),
        ) {
            Ok(channel) => {
                tracing::info!(host = %email.smtp_host, "Email channel enabled");
                channels.push(Box::new(channel));
            }
            Err(e) => tracing::error!(error = %e, "Email channel disabled: bad SMTP config"),
        }
    }
    if let Some(recipient) = &config.notify.whatsapp_recipient {
        tracing::info!(recipient = %recipient, "WhatsApp channel enabled");
        channels.push(Box::new(WhatsappChannel::new(
            Arc::clone(&sessions),
            recipient,
        )));
    }

    let http_port = config.http_port;
    let state = AppState {
        alerts: Arc::new(AlertCache::new(Arc::clone(&store))),
        throttle: Arc::new(ThrottleGate::new(tz)),
        dispatcher: Arc::new(Dispatcher::new(Arc::clone(&store), channels)),
        store,
        sessions,
        start_time: Utc::now(),
        config: Arc::new(config),
    };

    let app = build_http_app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// SQLite refuses to create missing parent directories itself.
fn ensure_sqlite_dir(db_url: &str) -> anyhow::Result<()> {
    if let Some(rest) = db_url.strip_prefix("sqlite://") {
        let path = rest.split('?').next().unwrap_or(rest);
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
