//! HTTP client for the external messaging bridge.

use crate::config::BridgeConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use watchdesk_session::{Connector, ConnectorGroup, LinkTicket, SessionError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Talks to the bridge sidecar over its REST API. One client serves all
/// tenants; the tenant id is part of every path.
pub struct BridgeConnector {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct LinkResponse {
    qr_code: Option<String>,
}

#[derive(Deserialize)]
struct GroupEntry {
    external_id: String,
    name: String,
}

impl BridgeConnector {
    pub fn new(config: &BridgeConfig) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SessionError::Bridge(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, SessionError> {
        let resp = req
            .send()
            .await
            .map_err(|e| SessionError::Bridge(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SessionError::Bridge(format!(
                "bridge returned {}",
                resp.status()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn begin_link(&self, tenant_id: &str) -> Result<LinkTicket, SessionError> {
        let resp = self
            .send(self.request(reqwest::Method::POST, &format!("/sessions/{tenant_id}/link")))
            .await?;
        let body: LinkResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Bridge(e.to_string()))?;
        Ok(LinkTicket {
            qr_code: body.qr_code,
        })
    }

    async fn logout(&self, tenant_id: &str) -> Result<(), SessionError> {
        self.send(self.request(
            reqwest::Method::POST,
            &format!("/sessions/{tenant_id}/logout"),
        ))
        .await?;
        Ok(())
    }

    async fn is_alive(&self, tenant_id: &str) -> bool {
        match self
            .request(reqwest::Method::GET, &format!("/sessions/{tenant_id}/alive"))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(tenant_id, error = %e, "Liveness probe failed");
                false
            }
        }
    }

    async fn list_groups(&self, tenant_id: &str) -> Result<Vec<ConnectorGroup>, SessionError> {
        let resp = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/sessions/{tenant_id}/groups"),
            ))
            .await?;
        let entries: Vec<GroupEntry> = resp
            .json()
            .await
            .map_err(|e| SessionError::Bridge(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|g| ConnectorGroup {
                external_id: g.external_id,
                name: g.name,
            })
            .collect())
    }

    async fn send_text(
        &self,
        tenant_id: &str,
        recipient: &str,
        body: &str,
    ) -> Result<(), SessionError> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/sessions/{tenant_id}/messages"),
            )
            .json(&serde_json::json!({
                "recipient": recipient,
                "body": body,
            })),
        )
        .await?;
        Ok(())
    }
}
