use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use watchdesk_alert::throttle::ThrottleGate;
use watchdesk_notify::channels::inapp::InAppChannel;
use watchdesk_notify::dispatcher::Dispatcher;
use watchdesk_notify::NotificationChannel;
use watchdesk_server::alert_cache::AlertCache;
use watchdesk_server::app::build_http_app;
use watchdesk_server::config::ServerConfig;
use watchdesk_server::state::AppState;
use watchdesk_session::manager::SessionManager;
use watchdesk_session::{Connector, ConnectorGroup, LinkTicket, SessionError};
use watchdesk_storage::OpsStore;

struct StubConnector;

#[async_trait]
impl Connector for StubConnector {
    async fn begin_link(&self, _tenant_id: &str) -> Result<LinkTicket, SessionError> {
        Ok(LinkTicket {
            qr_code: Some("qr-test".to_string()),
        })
    }

    async fn logout(&self, _tenant_id: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn is_alive(&self, _tenant_id: &str) -> bool {
        true
    }

    async fn list_groups(&self, _tenant_id: &str) -> Result<Vec<ConnectorGroup>, SessionError> {
        Ok(vec![
            ConnectorGroup {
                external_id: "g-dealers".to_string(),
                name: "Dealers CH".to_string(),
            },
            ConnectorGroup {
                external_id: "g-traders".to_string(),
                name: "Traders EU".to_string(),
            },
        ])
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

async fn build_app() -> Router {
    let store = Arc::new(OpsStore::new("sqlite::memory:").await.unwrap());
    let sessions = Arc::new(SessionManager::new(
        Arc::new(StubConnector),
        Duration::from_secs(30),
    ));
    let channels: Vec<Box<dyn NotificationChannel>> =
        vec![Box::new(InAppChannel::new(Arc::clone(&store)))];
    let state = AppState {
        alerts: Arc::new(AlertCache::new(Arc::clone(&store))),
        throttle: Arc::new(ThrottleGate::new(chrono_tz::UTC)),
        dispatcher: Arc::new(Dispatcher::new(Arc::clone(&store), channels)),
        store,
        sessions,
        start_time: Utc::now(),
        config: Arc::new(ServerConfig::default()),
    };
    build_http_app(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    tenant: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_needs_no_tenant_header() {
    let app = build_app().await;
    let (status, body) = send(&app, "GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_code"], 0);
    assert_eq!(body["data"]["storage_status"], "ok");
}

#[tokio::test]
async fn tenant_routes_reject_missing_header() {
    let app = build_app().await;
    let (status, body) = send(&app, "GET", "/v1/alerts", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["err_code"], 1008);
}

#[tokio::test]
async fn alert_crud_over_http() {
    let app = build_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/alerts",
        Some("t1"),
        Some(json!({
            "name": "rolex-deal",
            "rules": [
                {"field": "brand", "operator": "equals", "value": "Rolex"},
                {"field": "price", "operator": "less_or_equal", "value": "9000"}
            ],
            "channels": {"in_app": true},
            "max_per_day": 3
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["enabled"], true);

    // Duplicate name is a conflict
    let (status, body) = send(
        &app,
        "POST",
        "/v1/alerts",
        Some("t1"),
        Some(json!({"name": "rolex-deal", "rules": []})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err_code"], 1005);

    let (status, body) = send(&app, "GET", "/v1/alerts", Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    // Another tenant sees nothing
    let (_, body) = send(&app, "GET", "/v1/alerts", Some("t2"), None).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/v1/alerts/{id}"),
        Some("t1"),
        Some(json!({
            "name": "rolex-deal",
            "rules": [{"field": "brand", "operator": "equals", "value": "Omega"}],
            "channels": {"email": true},
            "max_per_day": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rules"][0]["value"], "Omega");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/v1/alerts/{id}/enable"),
        Some("t1"),
        Some(json!({"enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    let (status, _) = send(&app, "DELETE", &format!("/v1/alerts/{id}"), Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/v1/alerts/{id}"), Some("t1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err_code"], 1004);
}

#[tokio::test]
async fn invalid_rules_are_rejected_before_storage() {
    let app = build_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/alerts",
        Some("t1"),
        Some(json!({
            "name": "broken",
            "rules": [{"field": "price", "operator": "contains", "value": "9"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err_code"], 1101);

    let (_, body) = send(&app, "GET", "/v1/alerts", Some("t1"), None).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn ingest_fires_alert_into_events_and_mailbox() {
    let app = build_app().await;

    send(
        &app,
        "POST",
        "/v1/alerts",
        Some("t1"),
        Some(json!({
            "name": "rolex-under-9k",
            "rules": [
                {"field": "brand", "operator": "equals", "value": "Rolex"},
                {"field": "price", "operator": "less_or_equal", "value": "9000"}
            ],
            "channels": {"in_app": true},
            "max_per_day": 1
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/listings/ingest",
        Some("t1"),
        Some(json!({
            "brand": "Rolex",
            "model": "Submariner",
            "price": "8'500",
            "currency": "CHF"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["delivered"], 1);

    // Second hit the same day is throttled but still evaluated
    let (_, body) = send(
        &app,
        "POST",
        "/v1/listings/ingest",
        Some("t1"),
        Some(json!({"brand": "Rolex", "price": "7000"})),
    )
    .await;
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["delivered"], 0);
    assert_eq!(body["data"]["throttled"], 1);

    let (_, body) = send(&app, "GET", "/v1/alerts/events", Some("t1"), None).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["alert_name"], "rolex-under-9k");

    let (_, body) = send(&app, "GET", "/v1/mailbox?unread_only=true", Some("t1"), None).await;
    assert_eq!(body["data"]["total"], 1);
    let msg_id = body["data"]["items"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/v1/mailbox/{msg_id}/read"),
        Some("t1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/v1/mailbox?unread_only=true", Some("t1"), None).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn listings_from_unselected_groups_are_dropped() {
    let app = build_app().await;

    send(
        &app,
        "POST",
        "/v1/alerts",
        Some("t1"),
        Some(json!({
            "name": "any-rolex",
            "rules": [{"field": "brand", "operator": "equals", "value": "Rolex"}],
            "channels": {"in_app": true}
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/listings/ingest",
        Some("t1"),
        Some(json!({"brand": "Rolex", "group_id": "g-unknown"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["skipped_group"], true);
    assert_eq!(body["data"]["matched"], 0);

    let (_, body) = send(&app, "GET", "/v1/alerts/events", Some("t1"), None).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn session_link_sync_and_group_selection() {
    let app = build_app().await;

    // Group sync before linking is rejected
    let (status, body) = send(&app, "POST", "/v1/whatsapp/groups/sync", Some("t1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err_code"], 1103);

    let (status, body) = send(&app, "POST", "/v1/whatsapp/start", Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "qr_pending");
    assert_eq!(body["data"]["qr_code"], "qr-test");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/whatsapp/events",
        Some("t1"),
        Some(json!({
            "kind": "connected",
            "identity": {
                "display_name": "Dealer Desk",
                "connection_id": "41790000000",
                "device_label": null
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // start is idempotent and round-trips through the worker queue, so
    // the webhook above is guaranteed applied by the time it returns.
    let (_, body) = send(&app, "POST", "/v1/whatsapp/start", Some("t1"), None).await;
    assert_eq!(body["data"]["status"], "ready");

    let (status, body) = send(&app, "POST", "/v1/whatsapp/groups/sync", Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["included"], false);

    let (status, _) = send(
        &app,
        "PUT",
        "/v1/whatsapp/groups/g-dealers",
        Some("t1"),
        Some(json!({"included": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "PUT",
        "/v1/whatsapp/groups/nope",
        Some("t1"),
        Some(json!({"included": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err_code"], 1102);

    let (_, body) = send(&app, "GET", "/v1/whatsapp/groups", Some("t1"), None).await;
    let groups = body["data"].as_array().unwrap();
    let dealers = groups
        .iter()
        .find(|g| g["external_id"] == "g-dealers")
        .unwrap();
    assert_eq!(dealers["included"], true);

    let (_, body) = send(&app, "GET", "/v1/whatsapp/status", Some("t1"), None).await;
    assert_eq!(body["data"]["status"], "ready");
    assert_eq!(body["data"]["identity"]["display_name"], "Dealer Desk");

    let (status, _) = send(&app, "POST", "/v1/whatsapp/logout", Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/v1/whatsapp/status", Some("t1"), None).await;
    assert_eq!(body["data"]["status"], "disconnected");

    // Logout clears discovery state but keeps the tenant's opt-ins
    let (_, body) = send(&app, "GET", "/v1/whatsapp/groups", Some("t1"), None).await;
    let groups = body["data"].as_array().unwrap();
    assert!(groups.iter().all(|g| g["present"] == false));
    let dealers = groups
        .iter()
        .find(|g| g["external_id"] == "g-dealers")
        .unwrap();
    assert_eq!(dealers["included"], true);
}

#[tokio::test]
async fn group_inclusion_survives_resync() {
    let app = build_app().await;

    send(&app, "POST", "/v1/whatsapp/start", Some("t1"), None).await;
    send(
        &app,
        "POST",
        "/v1/whatsapp/events",
        Some("t1"),
        Some(json!({
            "kind": "connected",
            "identity": {
                "display_name": "Dealer Desk",
                "connection_id": "41790000000",
                "device_label": null
            }
        })),
    )
    .await;
    // Round-trip the worker queue so the webhook is applied
    send(&app, "POST", "/v1/whatsapp/start", Some("t1"), None).await;

    let (status, _) = send(&app, "POST", "/v1/whatsapp/groups/sync", Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        "/v1/whatsapp/groups/g-dealers",
        Some("t1"),
        Some(json!({"included": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A second sync re-discovers the same groups without resetting opt-ins
    let (status, body) = send(&app, "POST", "/v1/whatsapp/groups/sync", Some("t1"), None).await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["data"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    let dealers = groups
        .iter()
        .find(|g| g["external_id"] == "g-dealers")
        .unwrap();
    assert_eq!(dealers["included"], true);
    assert_eq!(dealers["present"], true);
    let traders = groups
        .iter()
        .find(|g| g["external_id"] == "g-traders")
        .unwrap();
    assert_eq!(traders["included"], false);
}
