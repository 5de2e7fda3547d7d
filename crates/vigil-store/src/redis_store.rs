//! Redis-backed alert store.
//!
//! Alerts are appended to a stream. A sorted set per event key, scored by
//! creation time in milliseconds, answers dedupe lookups.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use vigil_models::{Alert, EventKey};

use crate::{AlertStore, StoreResult};

/// Configuration for the Redis store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub redis_url: String,
    /// Stream every alert is appended to
    pub stream_name: String,
    /// Prefix of the per-key sorted sets
    pub key_prefix: String,
    /// Approximate cap on stream length; 0 keeps everything
    pub stream_max_len: usize,
    /// How far back the per-key index answers lookups. Older entries are
    /// trimmed on insert; set it to at least the dedupe window.
    pub index_retention: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vigil:alerts".to_string(),
            key_prefix: "vigil:alerts:key:".to_string(),
            stream_max_len: 0,
            index_retention: Duration::from_secs(5 * 60),
        }
    }
}

impl RedisStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("VIGIL_ALERT_STREAM").unwrap_or(defaults.stream_name),
            key_prefix: std::env::var("VIGIL_ALERT_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            stream_max_len: std::env::var("VIGIL_ALERT_STREAM_MAXLEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stream_max_len),
            index_retention: defaults.index_retention,
        }
    }

    pub fn with_index_retention(mut self, retention: Duration) -> Self {
        self.index_retention = retention;
        self
    }

    /// Exclusive upper score bound of index entries that can be dropped at `now`.
    fn index_trim_bound(&self, now: DateTime<Utc>) -> String {
        let retention_ms = self.index_retention.as_millis() as i64;
        format!("({}", now.timestamp_millis() - retention_ms)
    }

    fn index_key(&self, key: &EventKey) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

/// Alert store client.
pub struct RedisAlertStore {
    client: redis::Client,
    config: RedisStoreConfig,
}

impl RedisAlertStore {
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }

    /// Verify connectivity.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        info!("Connected to alert store at {}", self.config.redis_url);
        Ok(())
    }

    pub async fn stream_len(&self) -> StoreResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = redis::cmd("XLEN")
            .arg(&self.config.stream_name)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    /// Entries currently held in the dedupe index for `key`.
    pub async fn index_len(&self, key: &EventKey) -> StoreResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = redis::cmd("ZCARD")
            .arg(self.config.index_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

#[async_trait]
impl AlertStore for RedisAlertStore {
    async fn insert(&self, alert: &Alert) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(alert)?;

        let mut xadd = redis::cmd("XADD");
        xadd.arg(&self.config.stream_name);
        if self.config.stream_max_len > 0 {
            xadd.arg("MAXLEN").arg("~").arg(self.config.stream_max_len);
        }
        xadd.arg("*")
            .arg("alert")
            .arg(&payload)
            .arg("key")
            .arg(alert.event_key.as_str());

        let index_key = self.config.index_key(&alert.event_key);
        let mut zadd = redis::cmd("ZADD");
        zadd.arg(&index_key)
            .arg(alert.created_at.timestamp_millis())
            .arg(alert.job_id.as_str());

        let mut trim = redis::cmd("ZREMRANGEBYSCORE");
        trim.arg(&index_key)
            .arg("-inf")
            .arg(self.config.index_trim_bound(Utc::now()));

        // Idle keys expire once nothing in them could match a lookup.
        let mut expire = redis::cmd("PEXPIRE");
        expire
            .arg(&index_key)
            .arg(self.config.index_retention.as_millis() as u64);

        redis::pipe()
            .atomic()
            .add_command(xadd)
            .ignore()
            .add_command(zadd)
            .ignore()
            .add_command(trim)
            .ignore()
            .add_command(expire)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(
            event_key = %alert.event_key,
            job_id = %alert.job_id,
            "Alert persisted"
        );
        Ok(())
    }

    async fn exists_since(&self, key: &EventKey, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(self.config.index_key(key))
            .arg(cutoff.timestamp_millis())
            .arg("+inf")
            .query_async(&mut conn)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.stream_name, "vigil:alerts");
        assert_eq!(
            config.index_key(&EventKey::new("cam-1", "lobby", "suspicious")),
            "vigil:alerts:key:cam-1|lobby|suspicious"
        );
        assert_eq!(config.index_retention, Duration::from_secs(300));
    }

    #[test]
    fn test_index_trim_bound_is_exclusive() {
        let config = RedisStoreConfig::default().with_index_retention(Duration::from_secs(60));
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(config.index_trim_bound(now), "(1699999940000");
    }
}
