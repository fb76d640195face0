use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Full database connection URL, e.g. `sqlite://data/watchdesk.db?mode=rwc`
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// IANA time zone used for the daily alert throttle window
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub tenancy: TenancyConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            db_url: default_db_url(),
            timezone: default_timezone(),
            bridge: BridgeConfig::default(),
            tenancy: TenancyConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

/// External messaging bridge the session layer talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub base_url: String,
    /// Optional bearer token sent with every bridge request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Liveness probe interval for linked sessions
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            api_key: None,
            liveness_interval_secs: default_liveness_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Whether to require the x-tenant-id header (default: true)
    #[serde(default = "default_require_tenant")]
    pub require_tenant_header: bool,
    /// Allowed tenant ids; empty accepts any non-empty value
    #[serde(default)]
    pub allowed_tenants: Vec<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            require_tenant_header: default_require_tenant(),
            allowed_tenants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// SMTP sink; absent disables the email channel entirely
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// Chat id (contact or group) the whatsapp channel sends alerts to;
    /// absent disables the channel
    #[serde(default)]
    pub whatsapp_recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    pub from: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_db_url() -> String {
    "sqlite://data/watchdesk.db?mode=rwc".to_string()
}

fn default_timezone() -> String {
    "Europe/Zurich".to_string()
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_liveness_interval_secs() -> u64 {
    30
}

fn default_require_tenant() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
