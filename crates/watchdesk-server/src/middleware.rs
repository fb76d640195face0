use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error_response;
use crate::logging::TraceId;
use crate::state::AppState;

/// Header carrying the dealer tenant every request acts for.
static TENANT_HEADER: HeaderName = HeaderName::from_static("x-tenant-id");

/// Tenant scope stored in request extensions after validation.
#[derive(Clone)]
pub struct TenantId(pub String);

impl std::ops::Deref for TenantId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// Middleware that validates the `x-tenant-id` request header.
///
/// When `require_tenant_header` is `true` in config, requests without a
/// valid header are rejected with 403 Forbidden. When `false`, requests
/// fall back to the `default` tenant (single-dealer deployments).
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let tenant = req
        .headers()
        .get(&TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !state.config.tenancy.require_tenant_header {
        let tenant = tenant.filter(|t| !t.is_empty()).unwrap_or_else(|| "default".to_string());
        req.extensions_mut().insert(TenantId(tenant));
        return next.run(req).await;
    }

    match tenant.as_deref() {
        None => {
            tracing::warn!(
                trace_id = %trace_id,
                "Request rejected: missing x-tenant-id header"
            );
            error_response(
                StatusCode::FORBIDDEN,
                &trace_id,
                "tenant_missing",
                "missing x-tenant-id header",
            )
        }
        Some("") => {
            tracing::warn!(
                trace_id = %trace_id,
                "Request rejected: empty x-tenant-id header"
            );
            error_response(
                StatusCode::FORBIDDEN,
                &trace_id,
                "tenant_missing",
                "x-tenant-id header cannot be empty",
            )
        }
        Some(id) => {
            // Empty allow-list accepts any non-empty tenant
            if !state.config.tenancy.allowed_tenants.is_empty()
                && !state.config.tenancy.allowed_tenants.iter().any(|t| t == id)
            {
                tracing::warn!(
                    trace_id = %trace_id,
                    tenant = %id,
                    "Request rejected: unknown tenant"
                );
                return error_response(
                    StatusCode::FORBIDDEN,
                    &trace_id,
                    "tenant_invalid",
                    "unknown tenant",
                );
            }

            let id = id.to_string();
            req.extensions_mut().insert(TenantId(id));
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_cache::AlertCache;
    use crate::config::{ServerConfig, TenancyConfig};
    use crate::state::AppState;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::extract::Extension;
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use watchdesk_alert::throttle::ThrottleGate;
    use watchdesk_notify::dispatcher::Dispatcher;
    use watchdesk_session::manager::SessionManager;
    use watchdesk_session::{Connector, ConnectorGroup, LinkTicket, SessionError};
    use watchdesk_storage::OpsStore;

    struct StubConnector;

    #[async_trait]
    impl Connector for StubConnector {
        async fn begin_link(&self, _tenant_id: &str) -> Result<LinkTicket, SessionError> {
            Ok(LinkTicket { qr_code: None })
        }
        async fn logout(&self, _tenant_id: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn is_alive(&self, _tenant_id: &str) -> bool {
            true
        }
        async fn list_groups(&self, _tenant_id: &str) -> Result<Vec<ConnectorGroup>, SessionError> {
            Ok(Vec::new())
        }
        async fn send_text(
            &self,
            _tenant_id: &str,
            _recipient: &str,
            _body: &str,
        ) -> Result<(), SessionError> {
            Ok(())
        }
    }

    async fn build_mock_state(tenancy: TenancyConfig) -> AppState {
        let store = Arc::new(OpsStore::new("sqlite::memory:").await.unwrap());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(StubConnector),
            Duration::from_secs(30),
        ));
        let config = ServerConfig {
            tenancy,
            ..ServerConfig::default()
        };
        AppState {
            alerts: Arc::new(AlertCache::new(Arc::clone(&store))),
            throttle: Arc::new(ThrottleGate::new(chrono_tz::UTC)),
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&store), Vec::new())),
            store,
            sessions,
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }

    async fn echo_tenant(Extension(tenant): Extension<TenantId>) -> String {
        tenant.0
    }

    fn build_test_app(state: AppState) -> Router {
        Router::new()
            .route("/test", get(echo_tenant))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                tenant_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn header_not_required_falls_back_to_default_tenant() {
        let state = build_mock_state(TenancyConfig {
            require_tenant_header: false,
            allowed_tenants: vec![],
        })
        .await;
        let app = build_test_app(state);

        let req = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"default");
    }

    #[tokio::test]
    async fn missing_header_returns_403() {
        let state = build_mock_state(TenancyConfig {
            require_tenant_header: true,
            allowed_tenants: vec![],
        })
        .await;
        let app = build_test_app(state);

        let req = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["err_code"], 1008);
    }

    #[tokio::test]
    async fn any_tenant_passes_with_empty_allow_list() {
        let state = build_mock_state(TenancyConfig {
            require_tenant_header: true,
            allowed_tenants: vec![],
        })
        .await;
        let app = build_test_app(state);

        let req = Request::builder()
            .uri("/test")
            .header("x-tenant-id", "dealer-42")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"dealer-42");
    }

    #[tokio::test]
    async fn unknown_tenant_rejected_when_allow_list_set() {
        let state = build_mock_state(TenancyConfig {
            require_tenant_header: true,
            allowed_tenants: vec!["dealer-1".to_string()],
        })
        .await;
        let app = build_test_app(state);

        let req = Request::builder()
            .uri("/test")
            .header("x-tenant-id", "dealer-2")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["err_code"], 1009);
    }
}
