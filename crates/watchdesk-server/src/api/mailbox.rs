use crate::api::pagination::{self, PaginationParams};
use crate::api::{error_response, success_empty_response, success_paginated_response, ApiError};
use crate::logging::TraceId;
use crate::middleware::TenantId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use watchdesk_storage::MailboxRow;

/// One in-app notification
#[derive(Serialize, ToSchema)]
struct MailboxResponse {
    id: String,
    title: String,
    body: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

fn to_response(row: MailboxRow) -> MailboxResponse {
    MailboxResponse {
        id: row.id,
        title: row.title,
        body: row.body,
        is_read: row.is_read,
        created_at: row.created_at,
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct MailboxQueryParams {
    /// Only unread messages (default false)
    #[param(required = false)]
    #[serde(default)]
    unread_only: bool,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(default, deserialize_with = "pagination::deserialize_optional_u64")]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "pagination::deserialize_optional_u64")]
    offset: Option<u64>,
}

/// In-app notifications, newest first.
#[utoipa::path(
    get,
    path = "/v1/mailbox",
    tag = "Mailbox",
    params(MailboxQueryParams),
    responses(
        (status = 200, description = "Paginated mailbox", body = Vec<MailboxResponse>),
        (status = 403, description = "Missing or invalid x-tenant-id", body = ApiError)
    )
)]
async fn list_mailbox(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Query(params): Query<MailboxQueryParams>,
) -> impl IntoResponse {
    let pagination = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (pagination.limit(), pagination.offset());

    let total = match state
        .store
        .count_mailbox_messages(&tenant, params.unread_only)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count mailbox messages");
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
        .list_mailbox_messages(&tenant, params.unread_only, limit, offset)
        .await
    {
        Ok(rows) => {
            let items: Vec<MailboxResponse> = rows.into_iter().map(to_response).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list mailbox messages");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Mark one notification as read.
#[utoipa::path(
    put,
    path = "/v1/mailbox/{id}/read",
    tag = "Mailbox",
    params(("id" = String, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Marked read"),
        (status = 404, description = "Message not found", body = ApiError)
    )
)]
async fn mark_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.mark_mailbox_read(&tenant, &id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "read"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Message '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to mark message read");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn mailbox_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_mailbox))
        .routes(routes!(mark_read))
}
