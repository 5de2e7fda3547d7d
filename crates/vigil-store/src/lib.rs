//! Alert persistence for the Vigil pipeline.
//!
//! Stores are insert-only. The only query the pipeline needs is whether an
//! alert with a given event key was created at or after a cutoff.

pub mod error;
pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_models::{Alert, EventKey};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryAlertStore;
pub use redis_store::{RedisAlertStore, RedisStoreConfig};

/// Persistence for alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist a new alert.
    async fn insert(&self, alert: &Alert) -> StoreResult<()>;

    /// Whether an alert with `key` has `created_at >= cutoff`.
    async fn exists_since(&self, key: &EventKey, cutoff: DateTime<Utc>) -> StoreResult<bool>;
}
