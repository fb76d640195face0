use crate::api::{error_response, success_empty_response, success_response, ApiError};
use crate::logging::TraceId;
use crate::middleware::TenantId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use watchdesk_common::types::{GroupInfo, SessionSnapshot};
use watchdesk_session::registry::merge_groups;
use watchdesk_session::{SessionError, SessionPush};

fn session_error_response(trace_id: &str, err: &SessionError) -> axum::response::Response {
    match err {
        SessionError::NotLinked => error_response(
            StatusCode::CONFLICT,
            trace_id,
            "session_not_ready",
            "Session is not linked",
        ),
        SessionError::Bridge(msg) => error_response(
            StatusCode::BAD_GATEWAY,
            trace_id,
            "bridge_error",
            &format!("Bridge request failed: {msg}"),
        ),
        SessionError::WorkerGone => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            trace_id,
            "internal_error",
            "Session worker is unavailable",
        ),
    }
}

/// Start (or resume) the link handshake. Safe to call repeatedly; a
/// session that is already linked is left untouched.
#[utoipa::path(
    post,
    path = "/v1/whatsapp/start",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "Current session snapshot", body = SessionSnapshot),
        (status = 502, description = "Bridge failure", body = ApiError)
    )
)]
async fn start_session(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.sessions.start_link(&tenant).await {
        Ok(snapshot) => success_response(StatusCode::OK, &trace_id, snapshot),
        Err(e) => session_error_response(&trace_id, &e),
    }
}

/// Latest session snapshot (polling fallback for clients without SSE).
#[utoipa::path(
    get,
    path = "/v1/whatsapp/status",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "Current session snapshot", body = SessionSnapshot)
    )
)]
async fn session_status(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    success_response(StatusCode::OK, &trace_id, state.sessions.snapshot(&tenant))
}

/// Server-sent stream of session snapshots.
///
/// The first event is the current state; every subsequent state change
/// (fresh QR code included) arrives as an `session` event. Intermediate
/// states may coalesce under load; clients key off `seq` and must treat
/// a jump in `seq` as states having been skipped.
#[utoipa::path(
    get,
    path = "/v1/whatsapp/qr/stream",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "text/event-stream of session snapshots")
    )
)]
async fn qr_stream(
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.sessions.subscribe(&tenant);
    let stream = WatchStream::new(rx)
        .map(|snapshot| Event::default().event("session").json_data(&snapshot));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Unlink the session. Local state is cleared even when the bridge-side
/// teardown fails. Group discovery state goes with the session; the
/// tenant's inclusion flags stay for the next link.
#[utoipa::path(
    post,
    path = "/v1/whatsapp/logout",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "Session unlinked"),
        (status = 502, description = "Bridge failure", body = ApiError)
    )
)]
async fn logout_session(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.sessions.logout(&tenant).await {
        Ok(()) => {
            if let Err(e) = state.store.mark_groups_absent(&tenant).await {
                tracing::error!(error = %e, "Failed to mark groups absent after logout");
            }
            success_empty_response(StatusCode::OK, &trace_id, "logged out")
        }
        Err(e) => session_error_response(&trace_id, &e),
    }
}

/// Webhook for bridge push events (QR renewals, connect, disconnect).
#[utoipa::path(
    post,
    path = "/v1/whatsapp/events",
    tag = "WhatsApp",
    request_body = SessionPush,
    responses(
        (status = 200, description = "Event accepted")
    )
)]
async fn push_event(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Json(event): Json<SessionPush>,
) -> impl IntoResponse {
    match state.sessions.push(&tenant, event).await {
        Ok(()) => success_empty_response(StatusCode::OK, &trace_id, "accepted"),
        Err(e) => session_error_response(&trace_id, &e),
    }
}

/// Known chat groups with their inclusion flags, as of the last sync.
#[utoipa::path(
    get,
    path = "/v1/whatsapp/groups",
    tag = "Groups",
    responses(
        (status = 200, description = "Group registry", body = Vec<GroupInfo>)
    )
)]
async fn list_groups(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_groups(&tenant).await {
        Ok(groups) => success_response(StatusCode::OK, &trace_id, groups),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list groups");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Re-discover groups from the linked account and merge them into the
/// registry. Inclusion flags survive the merge; groups no longer visible
/// are kept and marked absent.
#[utoipa::path(
    post,
    path = "/v1/whatsapp/groups/sync",
    tag = "Groups",
    responses(
        (status = 200, description = "Merged group registry", body = Vec<GroupInfo>),
        (status = 409, description = "Session not linked", body = ApiError),
        (status = 502, description = "Bridge failure", body = ApiError)
    )
)]
async fn sync_groups(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let discovered = match state.sessions.list_groups(&tenant).await {
        Ok(groups) => groups,
        Err(e) => return session_error_response(&trace_id, &e),
    };

    let existing = match state.store.list_groups(&tenant).await {
        Ok(groups) => groups,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load group registry");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let merged = merge_groups(&existing, &discovered);
    if let Err(e) = state.store.replace_groups(&tenant, &merged).await {
        tracing::error!(error = %e, "Failed to persist group registry");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "storage_error",
            "Database error",
        );
    }

    tracing::info!(
        tenant_id = %tenant.0,
        discovered = discovered.len(),
        total = merged.len(),
        "Group registry synced"
    );
    success_response(StatusCode::OK, &trace_id, merged)
}

#[derive(Deserialize, ToSchema)]
struct IncludeRequest {
    /// Whether listings from this group feed the alert engine
    included: bool,
}

/// Opt a group in or out of ingestion.
#[utoipa::path(
    put,
    path = "/v1/whatsapp/groups/{external_id}",
    tag = "Groups",
    params(("external_id" = String, Path, description = "External group ID")),
    request_body = IncludeRequest,
    responses(
        (status = 200, description = "Flag updated"),
        (status = 404, description = "Group not known", body = ApiError)
    )
)]
async fn set_group_included(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    Json(req): Json<IncludeRequest>,
) -> impl IntoResponse {
    match state
        .store
        .set_group_included(&tenant, &external_id, req.included)
        .await
    {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "updated"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "unknown_group",
            &format!("Group '{external_id}' is not in the registry"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update group flag");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn whatsapp_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(start_session))
        .routes(routes!(session_status))
        .routes(routes!(qr_stream))
        .routes(routes!(logout_session))
        .routes(routes!(push_event))
        .routes(routes!(list_groups))
        .routes(routes!(sync_groups))
        .routes(routes!(set_group_included))
}
