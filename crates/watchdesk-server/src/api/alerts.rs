use crate::api::pagination::{self, PaginationParams};
use crate::api::{error_response, success_paginated_response, success_response, ApiError};
use crate::logging::TraceId;
use crate::middleware::TenantId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use watchdesk_alert::normalize::{normalize_rules, RawRule};
use watchdesk_common::types::{AlertEvent, ChannelFlags};
use watchdesk_storage::AlertRow;

/// One rule as authored in the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuleDto {
    /// Listing field (brand, model, reference, price, country, condition, seller, currency)
    pub field: String,
    /// Operator (equals, not_equals, contains, less_or_equal, greater_or_equal, in_list, not_in_list, regex_match)
    pub operator: String,
    /// Raw value; comma-separated for list operators
    pub value: String,
}

impl RuleDto {
    fn to_raw(&self) -> RawRule {
        RawRule {
            field: self.field.clone(),
            operator: self.operator.clone(),
            value: self.value.clone(),
        }
    }
}

/// Alert create/update request
#[derive(Debug, Deserialize, ToSchema)]
pub struct AlertRequest {
    /// Display name, unique per tenant
    pub name: String,
    /// Whether the alert participates in matching (default true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Conjunctive rule list; an empty list never matches
    #[serde(default)]
    pub rules: Vec<RuleDto>,
    /// Delivery channels
    #[serde(default)]
    pub channels: ChannelFlags,
    /// Max fires per calendar day; 0 disables throttling
    #[serde(default)]
    pub max_per_day: u32,
}

fn default_enabled() -> bool {
    true
}

/// Alert as returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertResponse {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub rules: Vec<RuleDto>,
    pub channels: ChannelFlags,
    pub max_per_day: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_response(row: AlertRow) -> AlertResponse {
    let rules: Vec<RuleDto> = serde_json::from_str(&row.rules_json).unwrap_or_default();
    AlertResponse {
        id: row.id,
        name: row.name,
        enabled: row.enabled,
        rules,
        channels: row.channels,
        max_per_day: row.max_per_day.max(0) as u32,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Validate the request's rules through the normalizer, returning the
/// canonical JSON to store. Errors carry field-level detail for the UI.
fn validated_rules_json(rules: &[RuleDto]) -> Result<String, String> {
    let raw: Vec<RawRule> = rules.iter().map(RuleDto::to_raw).collect();
    normalize_rules(&raw).map_err(|e| e.to_string())?;
    serde_json::to_string(&raw).map_err(|e| e.to_string())
}

async fn reload_cache(state: &AppState, tenant_id: &str) {
    if let Err(e) = state.alerts.reload(tenant_id).await {
        tracing::error!(tenant_id, error = %e, "Failed to reload alert cache");
    }
}

/// List the tenant's alerts, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts",
    tag = "Alerts",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated alert list", body = Vec<AlertResponse>),
        (status = 403, description = "Missing or invalid x-tenant-id", body = ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    let limit = pagination.limit();
    let offset = pagination.offset();

    let total = match state.store.count_alerts(&tenant).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count alerts");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    match state.store.list_alerts(&tenant, limit, offset).await {
        Ok(rows) => {
            let items: Vec<AlertResponse> = rows.into_iter().map(to_response).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list alerts");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Create an alert. Rules are validated before anything is stored.
#[utoipa::path(
    post,
    path = "/v1/alerts",
    tag = "Alerts",
    request_body = AlertRequest,
    responses(
        (status = 201, description = "Alert created", body = AlertResponse),
        (status = 400, description = "Invalid rules", body = ApiError),
        (status = 409, description = "Duplicate alert name", body = ApiError)
    )
)]
async fn create_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Json(req): Json<AlertRequest>,
) -> impl IntoResponse {
    let rules_json = match validated_rules_json(&req.rules) {
        Ok(v) => v,
        Err(msg) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "validation_error", &msg)
        }
    };

    let row = AlertRow {
        id: watchdesk_common::id::next_id(),
        tenant_id: tenant.0.clone(),
        name: req.name,
        enabled: req.enabled,
        rules_json,
        channels: req.channels,
        max_per_day: req.max_per_day as i64,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    match state.store.insert_alert(&row).await {
        Ok(inserted) => {
            reload_cache(&state, &tenant).await;
            success_response(StatusCode::CREATED, &trace_id, to_response(inserted))
        }
        Err(e) if e.to_string().contains("UNIQUE") => error_response(
            StatusCode::CONFLICT,
            &trace_id,
            "conflict",
            "An alert with this name already exists",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Get one alert by id.
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert detail", body = AlertResponse),
        (status = 404, description = "Alert not found", body = ApiError)
    )
)]
async fn get_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_alert(&tenant, &id).await {
        Ok(Some(row)) => success_response(StatusCode::OK, &trace_id, to_response(row)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Alert '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to query alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Replace an alert's definition.
#[utoipa::path(
    put,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert ID")),
    request_body = AlertRequest,
    responses(
        (status = 200, description = "Alert updated", body = AlertResponse),
        (status = 400, description = "Invalid rules", body = ApiError),
        (status = 404, description = "Alert not found", body = ApiError)
    )
)]
async fn update_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AlertRequest>,
) -> impl IntoResponse {
    let rules_json = match validated_rules_json(&req.rules) {
        Ok(v) => v,
        Err(msg) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "validation_error", &msg)
        }
    };

    let row = AlertRow {
        id: id.clone(),
        tenant_id: tenant.0.clone(),
        name: req.name,
        enabled: req.enabled,
        rules_json,
        channels: req.channels,
        max_per_day: req.max_per_day as i64,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    match state.store.update_alert(&tenant, &id, &row).await {
        Ok(Some(updated)) => {
            reload_cache(&state, &tenant).await;
            success_response(StatusCode::OK, &trace_id, to_response(updated))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Alert '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Delete an alert. Its throttle counter is dropped with it; the event
/// log keeps the alert's history.
#[utoipa::path(
    delete,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert deleted"),
        (status = 404, description = "Alert not found", body = ApiError)
    )
)]
async fn delete_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_alert(&tenant, &id).await {
        Ok(true) => {
            state.throttle.forget(&id);
            reload_cache(&state, &tenant).await;
            crate::api::success_empty_response(StatusCode::OK, &trace_id, "deleted")
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Alert '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
struct EnableRequest {
    enabled: bool,
}

/// Enable or disable an alert without touching its rules.
#[utoipa::path(
    put,
    path = "/v1/alerts/{id}/enable",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert ID")),
    request_body = EnableRequest,
    responses(
        (status = 200, description = "Alert toggled", body = AlertResponse),
        (status = 404, description = "Alert not found", body = ApiError)
    )
)]
async fn set_alert_enabled(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EnableRequest>,
) -> impl IntoResponse {
    match state.store.set_alert_enabled(&tenant, &id, req.enabled).await {
        Ok(Some(row)) => {
            reload_cache(&state, &tenant).await;
            success_response(StatusCode::OK, &trace_id, to_response(row))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Alert '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to toggle alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct EventQueryParams {
    /// Alert ID exact match (optional)
    #[param(required = false)]
    #[serde(rename = "alert_id__eq")]
    alert_id_eq: Option<String>,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(default, deserialize_with = "pagination::deserialize_optional_u64")]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "pagination::deserialize_optional_u64")]
    offset: Option<u64>,
}

/// Fired-alert history, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts/events",
    tag = "Events",
    params(EventQueryParams),
    responses(
        (status = 200, description = "Paginated event log", body = Vec<AlertEvent>),
        (status = 403, description = "Missing or invalid x-tenant-id", body = ApiError)
    )
)]
async fn list_alert_events(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Query(params): Query<EventQueryParams>,
) -> impl IntoResponse {
    let limit = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (limit.limit(), limit.offset());

    let total = match state
        .store
        .count_alert_events(&tenant, params.alert_id_eq.as_deref())
        .await
    {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count alert events");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    match state
        .store
        .list_alert_events(&tenant, params.alert_id_eq.as_deref(), limit, offset)
        .await
    {
        Ok(events) => {
            success_paginated_response(StatusCode::OK, &trace_id, events, total, limit, offset)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list alert events");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts, create_alert))
        .routes(routes!(get_alert, update_alert, delete_alert))
        .routes(routes!(set_alert_enabled))
        .routes(routes!(list_alert_events))
}
