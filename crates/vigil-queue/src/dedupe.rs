//! Duplicate trigger suppression.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use vigil_models::{metric_names, EventKey};
use vigil_store::AlertStore;

/// Suppresses triggers whose event key already produced an alert within
/// the trailing window.
///
/// Besides persisted alerts, the gate remembers keys reserved by jobs that
/// are queued or being assembled, so a second trigger cannot slip in while
/// the first clip is still in flight.
pub struct DedupeGate {
    store: Arc<dyn AlertStore>,
    window: Duration,
    /// Event time of the in-flight job per key.
    pending: Mutex<HashMap<EventKey, DateTime<Utc>>>,
}

impl DedupeGate {
    pub fn new(store: Arc<dyn AlertStore>, window: Duration) -> Self {
        Self {
            store,
            window,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_minutes(store: Arc<dyn AlertStore>, minutes: u64) -> Self {
        Self::new(store, Duration::minutes(minutes as i64))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a persisted alert with `key` exists within the window.
    pub async fn is_duplicate(&self, key: &EventKey) -> bool {
        self.is_duplicate_at(key, Utc::now()).await
    }

    /// [`Self::is_duplicate`] evaluated at `now`.
    ///
    /// A store error counts as "not a duplicate".
    pub async fn is_duplicate_at(&self, key: &EventKey, now: DateTime<Utc>) -> bool {
        match self.store.exists_since(key, now - self.window).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(event_key = %key, "Dedupe lookup failed, allowing trigger: {}", e);
                false
            }
        }
    }

    /// Reserve `key` for a new job at `now`.
    ///
    /// Returns `false` if an alert or an in-flight job for the key falls
    /// within the window.
    pub async fn try_reserve_at(&self, key: &EventKey, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        {
            let mut pending = self.lock_pending();
            if let Some(reserved_at) = pending.get(key) {
                if *reserved_at >= cutoff {
                    debug!(event_key = %key, "Trigger suppressed by in-flight job");
                    metrics::counter!(metric_names::DUPLICATES_SUPPRESSED_TOTAL, "source" => "in_flight").increment(1);
                    return false;
                }
            }
            pending.insert(key.clone(), now);
        }

        if self.is_duplicate_at(key, now).await {
            self.release_if(key, now);
            debug!(event_key = %key, "Trigger suppressed by recent alert");
            metrics::counter!(metric_names::DUPLICATES_SUPPRESSED_TOTAL, "source" => "store").increment(1);
            return false;
        }
        true
    }

    pub async fn try_reserve(&self, key: &EventKey) -> bool {
        self.try_reserve_at(key, Utc::now()).await
    }

    /// Drop the reservation for `key`, e.g. after the job failed.
    pub fn release(&self, key: &EventKey) {
        self.lock_pending().remove(key);
    }

    /// Drop the reservation only if it is still the one made at `reserved_at`.
    pub fn release_if(&self, key: &EventKey, reserved_at: DateTime<Utc>) {
        let mut pending = self.lock_pending();
        if pending.get(key) == Some(&reserved_at) {
            pending.remove(key);
        }
    }

    /// Number of keys with an in-flight job.
    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<EventKey, DateTime<Utc>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vigil_models::{Alert, ClipInfo, ClipJob, ClipOffsets, CameraIdentity, SegmentRange, CLIP_SOURCE_SEGMENTS};
    use vigil_store::{MemoryAlertStore, StoreError, StoreResult};

    fn camera() -> CameraIdentity {
        CameraIdentity::new("cam-1", "Gate", "perimeter", "suspicious")
    }

    fn alert_at(at: DateTime<Utc>) -> Alert {
        let job = ClipJob::new(camera(), 0.9, None, at, ClipOffsets::default(), "/tmp/seg");
        let (start, end) = job.window();
        Alert::from_job(
            &job,
            ClipInfo {
                filename: "c.mp4".to_string(),
                path: "/tmp/c.mp4".to_string(),
                source: CLIP_SOURCE_SEGMENTS.to_string(),
                segment_range: SegmentRange { start, end },
                segment_count: 6,
            },
        )
    }

    #[tokio::test]
    async fn test_duplicate_within_window() {
        let store = Arc::new(MemoryAlertStore::new());
        let gate = DedupeGate::from_minutes(store.clone(), 5);
        let t0 = Utc::now();
        store.insert(&alert_at(t0)).await.unwrap();

        let key = camera().event_key();
        assert!(gate.is_duplicate_at(&key, t0 + Duration::minutes(4)).await);
        assert!(!gate.is_duplicate_at(&key, t0 + Duration::minutes(6)).await);
    }

    #[tokio::test]
    async fn test_in_flight_reservation_blocks_second_trigger() {
        let gate = DedupeGate::from_minutes(Arc::new(MemoryAlertStore::new()), 5);
        let key = camera().event_key();
        let t0 = Utc::now();

        assert!(gate.try_reserve_at(&key, t0).await);
        assert!(!gate.try_reserve_at(&key, t0 + Duration::seconds(30)).await);
        assert_eq!(gate.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_release_allows_retrigger() {
        let gate = DedupeGate::from_minutes(Arc::new(MemoryAlertStore::new()), 5);
        let key = camera().event_key();
        let t0 = Utc::now();

        assert!(gate.try_reserve_at(&key, t0).await);
        gate.release(&key);
        assert!(gate.try_reserve_at(&key, t0 + Duration::seconds(1)).await);
    }

    #[tokio::test]
    async fn test_reservation_expires_with_window() {
        let gate = DedupeGate::from_minutes(Arc::new(MemoryAlertStore::new()), 5);
        let key = camera().event_key();
        let t0 = Utc::now();

        assert!(gate.try_reserve_at(&key, t0).await);
        assert!(gate.try_reserve_at(&key, t0 + Duration::minutes(6)).await);
    }

    #[tokio::test]
    async fn test_store_duplicate_does_not_hold_reservation() {
        let store = Arc::new(MemoryAlertStore::new());
        let gate = DedupeGate::from_minutes(store.clone(), 5);
        let t0 = Utc::now();
        store.insert(&alert_at(t0)).await.unwrap();

        let key = camera().event_key();
        assert!(!gate.try_reserve_at(&key, t0 + Duration::minutes(1)).await);
        assert_eq!(gate.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let gate = DedupeGate::from_minutes(Arc::new(MemoryAlertStore::new()), 5);
        let t0 = Utc::now();
        let a = EventKey::new("cam-1", "perimeter", "suspicious");
        let b = EventKey::new("cam-1", "parking", "suspicious");
        assert!(gate.try_reserve_at(&a, t0).await);
        assert!(gate.try_reserve_at(&b, t0).await);
    }

    struct BrokenStore;

    #[async_trait]
    impl AlertStore for BrokenStore {
        async fn insert(&self, _alert: &Alert) -> StoreResult<()> {
            Err(StoreError::insert_failed("down"))
        }

        async fn exists_since(&self, _key: &EventKey, _cutoff: DateTime<Utc>) -> StoreResult<bool> {
            Err(StoreError::ConnectionFailed("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_allows_trigger() {
        let gate = DedupeGate::from_minutes(Arc::new(BrokenStore), 5);
        assert!(!gate.is_duplicate(&camera().event_key()).await);
    }
}
