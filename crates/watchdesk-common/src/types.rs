use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing attribute a rule can test, fixed enumerated set.
///
/// # Examples
///
/// ```
/// use watchdesk_common::types::RuleField;
///
/// let f: RuleField = "price".parse().unwrap();
/// assert_eq!(f, RuleField::Price);
/// assert_eq!(f.to_string(), "price");
/// assert!(RuleField::Price.is_numeric());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Brand,
    Model,
    Reference,
    Price,
    Country,
    Condition,
    Seller,
    Currency,
}

impl RuleField {
    /// Price carries a numeric value; every other field is textual.
    pub fn is_numeric(&self) -> bool {
        matches!(self, RuleField::Price)
    }
}

impl std::fmt::Display for RuleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleField::Brand => "brand",
            RuleField::Model => "model",
            RuleField::Reference => "reference",
            RuleField::Price => "price",
            RuleField::Country => "country",
            RuleField::Condition => "condition",
            RuleField::Seller => "seller",
            RuleField::Currency => "currency",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RuleField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "brand" => Ok(RuleField::Brand),
            "model" => Ok(RuleField::Model),
            "reference" => Ok(RuleField::Reference),
            "price" => Ok(RuleField::Price),
            "country" => Ok(RuleField::Country),
            "condition" => Ok(RuleField::Condition),
            "seller" => Ok(RuleField::Seller),
            "currency" => Ok(RuleField::Currency),
            _ => Err(format!("unknown rule field: {s}")),
        }
    }
}

/// Comparison operator applied by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Contains,
    LessOrEqual,
    GreaterOrEqual,
    InList,
    NotInList,
    RegexMatch,
}

impl RuleOperator {
    /// Operators valid for the numeric `price` field.
    pub fn is_numeric_compatible(&self) -> bool {
        matches!(
            self,
            RuleOperator::Equals
                | RuleOperator::NotEquals
                | RuleOperator::LessOrEqual
                | RuleOperator::GreaterOrEqual
        )
    }
}

impl std::fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleOperator::Equals => "equals",
            RuleOperator::NotEquals => "not_equals",
            RuleOperator::Contains => "contains",
            RuleOperator::LessOrEqual => "less_or_equal",
            RuleOperator::GreaterOrEqual => "greater_or_equal",
            RuleOperator::InList => "in_list",
            RuleOperator::NotInList => "not_in_list",
            RuleOperator::RegexMatch => "regex_match",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RuleOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equals" | "eq" => Ok(RuleOperator::Equals),
            "not_equals" | "neq" => Ok(RuleOperator::NotEquals),
            "contains" => Ok(RuleOperator::Contains),
            "less_or_equal" | "lte" => Ok(RuleOperator::LessOrEqual),
            "greater_or_equal" | "gte" => Ok(RuleOperator::GreaterOrEqual),
            "in_list" | "in" => Ok(RuleOperator::InList),
            "not_in_list" | "not_in" => Ok(RuleOperator::NotInList),
            "regex_match" | "regex" => Ok(RuleOperator::RegexMatch),
            _ => Err(format!("unknown rule operator: {s}")),
        }
    }
}

/// One normalized listing observed by the ingestion collaborator.
///
/// The engine treats listings as immutable facts: every field is the raw
/// string form delivered by ingestion (prices included, since sources emit
/// values like `"POA"` or `"8'500"` that only sometimes parse as numbers).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ListingEvent {
    /// Listing unique identifier (assigned by ingestion)
    pub id: String,
    /// Tenant this listing was observed for
    pub tenant_id: String,
    /// Source chat group the listing was seen in, if any
    pub group_id: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub reference: Option<String>,
    pub price: Option<String>,
    pub country: Option<String>,
    pub condition: Option<String>,
    pub seller: Option<String>,
    pub currency: Option<String>,
    /// When ingestion observed the listing
    pub observed_at: DateTime<Utc>,
}

impl ListingEvent {
    /// Raw string value for one rule field, `None` when the listing does not
    /// carry it.
    pub fn field(&self, field: RuleField) -> Option<&str> {
        match field {
            RuleField::Brand => self.brand.as_deref(),
            RuleField::Model => self.model.as_deref(),
            RuleField::Reference => self.reference.as_deref(),
            RuleField::Price => self.price.as_deref(),
            RuleField::Country => self.country.as_deref(),
            RuleField::Condition => self.condition.as_deref(),
            RuleField::Seller => self.seller.as_deref(),
            RuleField::Currency => self.currency.as_deref(),
        }
    }
}

/// One alert that matched one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub alert_id: String,
    pub alert_name: String,
    /// Human-readable match summary (e.g. `"brand equals Rolex, price <= 9000"`)
    pub reason: String,
}

/// Append-only record of a fired alert. Never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertEvent {
    pub id: String,
    pub tenant_id: String,
    pub alert_id: String,
    /// Alert name denormalized at fire time for display
    pub alert_name: String,
    pub listing_id: String,
    pub reason: String,
    pub fired_at: DateTime<Utc>,
}

/// Messaging-session lifecycle state.
///
/// `Error` is transient: it is surfaced to subscribers once, then the
/// machine settles in `Disconnected` with `last_error` retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    QrPending,
    Ready,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::QrPending => "qr_pending",
            SessionStatus::Ready => "ready",
            SessionStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Identity metadata of a connected messaging account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionIdentity {
    pub display_name: String,
    pub connection_id: String,
    pub device_label: Option<String>,
}

/// Point-in-time view of one tenant's session, published on every change.
///
/// `seq` increases monotonically per tenant; consumers of the snapshot
/// stream de-duplicate on it (delivery is at-least-once).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionSnapshot {
    pub tenant_id: String,
    pub seq: u64,
    pub status: SessionStatus,
    /// Renewable one-time code while the handshake is pending
    pub qr_code: Option<String>,
    pub identity: Option<SessionIdentity>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Snapshot for a tenant that has never linked.
    pub fn initial(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            seq: 0,
            status: SessionStatus::Disconnected,
            qr_code: None,
            identity: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Notification channels an alert fans out to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChannelFlags {
    #[serde(default)]
    pub in_app: bool,
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub whatsapp: bool,
}

/// One external chat group known for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GroupInfo {
    /// External group identifier (stable across syncs)
    pub external_id: String,
    pub name: String,
    /// Tenant's explicit ingestion opt-in; survives rediscovery
    pub included: bool,
    /// False when the last sync no longer saw this group (kept, not dropped)
    pub present: bool,
}
