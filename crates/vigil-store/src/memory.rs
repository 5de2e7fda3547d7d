//! In-process alert store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use vigil_models::{Alert, EventKey};

use crate::{AlertStore, StoreResult};

/// Keeps alerts in memory. Used for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryAlertStore {
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored alert in insertion order.
    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn insert(&self, alert: &Alert) -> StoreResult<()> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn exists_since(&self, key: &EventKey, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .alerts
            .read()
            .await
            .iter()
            .any(|a| &a.event_key == key && a.created_at >= cutoff))
    }
}
