use crate::api::{error_response, success_response, ApiError};
use crate::ingest::{process_listing, IngestOutcome};
use crate::logging::TraceId;
use crate::middleware::TenantId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use watchdesk_common::types::ListingEvent;

/// One observed listing, as delivered by the ingestion collaborator.
/// All attribute fields are optional raw strings; absent fields simply
/// never match a rule.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListingRequest {
    /// Caller-assigned id; generated when absent
    pub id: Option<String>,
    /// Source chat group, checked against the registry opt-ins
    pub group_id: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub reference: Option<String>,
    pub price: Option<String>,
    pub country: Option<String>,
    pub condition: Option<String>,
    pub seller: Option<String>,
    pub currency: Option<String>,
    /// Observation time; defaults to now
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
struct IngestResponse {
    listing_id: String,
    #[serde(flatten)]
    outcome: IngestOutcome,
}

/// Ingest one listing and run it through the tenant's alerts.
#[utoipa::path(
    post,
    path = "/v1/listings/ingest",
    tag = "Ingest",
    request_body = ListingRequest,
    responses(
        (status = 200, description = "Evaluation outcome", body = IngestResponse),
        (status = 403, description = "Missing or invalid x-tenant-id", body = ApiError)
    )
)]
async fn ingest_listing(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Json(req): Json<ListingRequest>,
) -> impl IntoResponse {
    let listing = ListingEvent {
        id: req.id.unwrap_or_else(watchdesk_common::id::next_id),
        tenant_id: tenant.0.clone(),
        group_id: req.group_id,
        brand: req.brand,
        model: req.model,
        reference: req.reference,
        price: req.price,
        country: req.country,
        condition: req.condition,
        seller: req.seller,
        currency: req.currency,
        observed_at: req.observed_at.unwrap_or_else(Utc::now),
    };

    match process_listing(&state, &listing).await {
        Ok(outcome) => success_response(
            StatusCode::OK,
            &trace_id,
            IngestResponse {
                listing_id: listing.id,
                outcome,
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, listing_id = %listing.id, "Listing ingestion failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "internal_error",
                "Failed to process listing",
            )
        }
    }
}

pub fn ingest_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(ingest_listing))
}
