//! In-memory alert snapshots for the ingestion hot path.
//!
//! Evaluation never queries the database: each tenant's alerts are held
//! as an `Arc<Vec<Alert>>` snapshot that readers clone cheaply. Writers
//! (the CRUD handlers) rebuild the snapshot from storage after every
//! mutation, so an in-flight evaluation keeps the list it started with.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use watchdesk_alert::normalize::{normalize_rules, RawRule};
use watchdesk_alert::Alert;
use watchdesk_storage::{AlertRow, OpsStore};

pub struct AlertCache {
    store: Arc<OpsStore>,
    cache: RwLock<HashMap<String, Arc<Vec<Alert>>>>,
}

impl AlertCache {
    pub fn new(store: Arc<OpsStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Current snapshot for a tenant, loading from storage on first use.
    pub async fn tenant_alerts(&self, tenant_id: &str) -> Result<Arc<Vec<Alert>>> {
        {
            let cache = self.cache.read().await;
            if let Some(alerts) = cache.get(tenant_id) {
                return Ok(Arc::clone(alerts));
            }
        }
        self.reload(tenant_id).await
    }

    /// Rebuild the tenant's snapshot from storage. Rows whose stored rules
    /// no longer normalize are skipped with a warning rather than taking
    /// the whole tenant down.
    pub async fn reload(&self, tenant_id: &str) -> Result<Arc<Vec<Alert>>> {
        let rows = self.store.list_all_alerts(tenant_id).await?;
        let mut alerts = Vec::with_capacity(rows.len());
        for row in &rows {
            match row_to_alert(row) {
                Ok(alert) => alerts.push(alert),
                Err(e) => {
                    tracing::warn!(
                        alert_id = %row.id,
                        error = %e,
                        "Skipping alert with invalid stored rules"
                    );
                }
            }
        }
        let snapshot = Arc::new(alerts);
        let mut cache = self.cache.write().await;
        cache.insert(tenant_id.to_string(), Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Re-normalize a stored row into the typed evaluation form.
pub fn row_to_alert(row: &AlertRow) -> Result<Alert> {
    let raw: Vec<RawRule> =
        serde_json::from_str(&row.rules_json).context("stored rules are not valid JSON")?;
    let rules = normalize_rules(&raw).context("stored rules failed validation")?;
    Ok(Alert {
        id: row.id.clone(),
        tenant_id: row.tenant_id.clone(),
        name: row.name.clone(),
        enabled: row.enabled,
        rules,
        channels: row.channels,
        max_per_day: row.max_per_day.max(0) as u32,
    })
}
