//! Source connection management.
//!
//! One record per source URI tracks status, retry budget, backoff and
//! heartbeat. The record map lives behind a narrow lock that is only held
//! to read or write records; opening and closing sessions always happens
//! with the lock released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use vigil_media::{MediaSession, SourceConnector};
use vigil_models::ConnectionStatus;

/// Session handle shared between the manager and the frame consumer.
pub type SharedSession = Arc<tokio::sync::Mutex<Box<dyn MediaSession>>>;

/// Connection manager settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Failed reconnect attempts before a source is marked Failed
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_ceiling: Duration,
    /// Longest tolerated gap between frames
    pub heartbeat_timeout: Duration,
    pub monitor_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(60),
            monitor_interval: Duration::from_secs(10),
        }
    }
}

/// Per-source connection state.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub uri: String,
    pub status: ConnectionStatus,
    pub retry_count: u32,
    /// Backoff the next failed attempt will be scheduled with, before jitter
    pub backoff: Duration,
    /// Backoff the last failed attempt was scheduled with, before jitter
    pub last_backoff: Option<Duration>,
    pub next_retry_at: Option<Instant>,
    pub last_check_at: Instant,
    pub last_frame_at: Option<Instant>,
}

impl ConnectionRecord {
    fn new(uri: &str, initial_backoff: Duration, now: Instant) -> Self {
        Self {
            uri: uri.to_string(),
            status: ConnectionStatus::Disconnected,
            retry_count: 0,
            backoff: initial_backoff,
            last_backoff: None,
            next_retry_at: None,
            last_check_at: now,
            last_frame_at: None,
        }
    }
}

struct Entry {
    record: ConnectionRecord,
    session: Option<SharedSession>,
}

/// Counts of sources per status plus a snapshot of every record.
#[derive(Debug, Clone, Default)]
pub struct StatusSummary {
    pub connected: usize,
    pub disconnected: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub sources: Vec<ConnectionRecord>,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.sources.len()
    }

    pub fn all_connected(&self) -> bool {
        self.connected == self.total()
    }
}

/// Outcome of a reconnect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Backoff has not elapsed, or an attempt is already running
    Skipped,
    Connected,
    /// Attempt failed; the next one is scheduled
    Scheduled,
    /// Retries exhausted
    Failed,
}

/// Keeps every configured source connected, or reports why not.
pub struct ConnectionManager {
    connector: Arc<dyn SourceConnector>,
    config: ConnectionConfig,
    uris: Vec<String>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        config: ConnectionConfig,
        uris: impl IntoIterator<Item = String>,
    ) -> Self {
        let now = Instant::now();
        let uris: Vec<String> = uris.into_iter().collect();
        let entries = uris
            .iter()
            .map(|uri| {
                (
                    uri.clone(),
                    Entry {
                        record: ConnectionRecord::new(uri, config.initial_backoff, now),
                        session: None,
                    },
                )
            })
            .collect();

        Self {
            connector,
            config,
            uris,
            entries: Mutex::new(entries),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Connect every source once. Returns how many connected.
    pub async fn initialize_all(&self) -> usize {
        let mut connected = 0;
        for uri in &self.uris {
            if self.connect(uri).await {
                connected += 1;
            }
        }
        info!(connected, total = self.uris.len(), "Initial connection pass complete");
        connected
    }

    /// Open a session for `uri`. Connectivity failures return `false`.
    pub async fn connect(&self, uri: &str) -> bool {
        {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(uri) else {
                warn!(uri, "Connect requested for unknown source");
                return false;
            };
            entry.record.status = ConnectionStatus::Connecting;
        }

        let result = self.connector.open(uri).await;
        let now = Instant::now();

        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(uri) else {
            return false;
        };
        match result {
            Ok(session) => {
                entry.session = Some(Arc::new(tokio::sync::Mutex::new(session)));
                let record = &mut entry.record;
                record.status = ConnectionStatus::Connected;
                record.retry_count = 0;
                record.backoff = self.config.initial_backoff;
                record.next_retry_at = None;
                record.last_check_at = now;
                record.last_frame_at = None;
                info!(uri, "Source connected");
                true
            }
            Err(e) => {
                entry.session = None;
                entry.record.status = ConnectionStatus::Disconnected;
                entry.record.last_check_at = now;
                warn!(uri, "Failed to connect: {}", e);
                false
            }
        }
    }

    pub async fn health(&self, uri: &str) -> bool {
        self.health_at(uri, self.config.heartbeat_timeout, Instant::now())
            .await
    }

    /// Healthy iff Connected, the session is open and the heartbeat is fresh.
    ///
    /// Before the first frame the heartbeat is measured from the last check.
    pub async fn health_at(&self, uri: &str, heartbeat_timeout: Duration, now: Instant) -> bool {
        let (session, reference) = {
            let entries = self.lock();
            let Some(entry) = entries.get(uri) else {
                return false;
            };
            if entry.record.status != ConnectionStatus::Connected {
                return false;
            }
            let Some(session) = entry.session.clone() else {
                return false;
            };
            (
                session,
                entry.record.last_frame_at.unwrap_or(entry.record.last_check_at),
            )
        };

        // A session locked by its reader is in use, hence open.
        let open = match session.try_lock() {
            Ok(mut guard) => guard.is_open(),
            Err(_) => true,
        };
        if !open {
            debug!(uri, "Session reports closed");
            return false;
        }

        let silent_for = now.saturating_duration_since(reference);
        if silent_for > heartbeat_timeout {
            warn!(uri, silent_secs = silent_for.as_secs_f64(), "Heartbeat timeout");
            return false;
        }
        true
    }

    pub async fn reconnect(&self, uri: &str) -> ReconnectOutcome {
        self.reconnect_at(uri, Instant::now()).await
    }

    /// One reconnect attempt, honoring backoff and the retry budget.
    pub async fn reconnect_at(&self, uri: &str, now: Instant) -> ReconnectOutcome {
        let old_session = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(uri) else {
                return ReconnectOutcome::Skipped;
            };
            let record = &mut entry.record;

            if matches!(
                record.status,
                ConnectionStatus::Connecting | ConnectionStatus::Closing
            ) {
                return ReconnectOutcome::Skipped;
            }
            if let Some(next) = record.next_retry_at {
                if now < next {
                    debug!(uri, wait_secs = (next - now).as_secs_f64(), "Backoff active");
                    return ReconnectOutcome::Skipped;
                }
            }
            if record.retry_count >= self.config.max_retries {
                if record.status != ConnectionStatus::Failed {
                    error!(uri, retries = record.retry_count, "Retries exhausted, source failed");
                    record.status = ConnectionStatus::Failed;
                    metrics::counter!(crate::metrics::names::SOURCES_FAILED).increment(1);
                }
                return ReconnectOutcome::Failed;
            }

            record.status = ConnectionStatus::Closing;
            record.retry_count += 1;
            info!(
                uri,
                attempt = record.retry_count,
                max = self.config.max_retries,
                backoff_secs = record.backoff.as_secs_f64(),
                "Reconnecting"
            );
            entry.session.take()
        };

        if let Some(session) = old_session {
            session.lock().await.close().await;
        }

        {
            let mut entries = self.lock();
            if let Some(entry) = entries.get_mut(uri) {
                entry.record.status = ConnectionStatus::Connecting;
            }
        }
        let result = self.connector.open(uri).await;

        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(uri) else {
            return ReconnectOutcome::Skipped;
        };
        let record = &mut entry.record;
        match result {
            Ok(session) => {
                entry.session = Some(Arc::new(tokio::sync::Mutex::new(session)));
                record.status = ConnectionStatus::Connected;
                record.retry_count = 0;
                record.backoff = self.config.initial_backoff;
                record.next_retry_at = None;
                record.last_check_at = now;
                record.last_frame_at = None;
                info!(uri, "Reconnected");
                ReconnectOutcome::Connected
            }
            Err(e) => {
                let base = record.backoff;
                let delay = base.mul_f64(jitter());
                record.status = ConnectionStatus::Disconnected;
                record.last_check_at = now;
                record.last_backoff = Some(base);
                record.next_retry_at = Some(now + delay);
                record.backoff = (base * 2).min(self.config.backoff_ceiling);
                warn!(
                    uri,
                    attempt = record.retry_count,
                    retry_in_secs = delay.as_secs_f64(),
                    "Reconnect failed: {}",
                    e
                );
                ReconnectOutcome::Scheduled
            }
        }
    }

    /// Record that a frame was just read from `uri`.
    pub fn heartbeat(&self, uri: &str) {
        self.heartbeat_at(uri, Instant::now());
    }

    pub fn heartbeat_at(&self, uri: &str, now: Instant) {
        if let Some(entry) = self.lock().get_mut(uri) {
            entry.record.last_frame_at = Some(now);
        }
    }

    /// Report a read failure on `session`. The monitor reconnects on its
    /// next pass.
    ///
    /// Ignored unless `session` is still the active one; a reader holding a
    /// handle from before a reconnect must not take down its replacement.
    /// Returns `true` if the status changed.
    pub fn mark_disconnected(&self, uri: &str, session: &SharedSession) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(uri) else {
            return false;
        };
        let current = entry
            .session
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, session));
        if !current {
            debug!(uri, "Ignoring disconnect report for a replaced session");
            return false;
        }
        if entry.record.status != ConnectionStatus::Connected {
            return false;
        }
        entry.record.status = ConnectionStatus::Disconnected;
        warn!(uri, "Source reported disconnected by reader");
        true
    }

    /// The active session for `uri`, if connected.
    pub fn session(&self, uri: &str) -> Option<SharedSession> {
        let entries = self.lock();
        let entry = entries.get(uri)?;
        if entry.record.status != ConnectionStatus::Connected {
            return None;
        }
        entry.session.clone()
    }

    pub fn status(&self, uri: &str) -> Option<ConnectionStatus> {
        self.lock().get(uri).map(|e| e.record.status)
    }

    pub fn record(&self, uri: &str) -> Option<ConnectionRecord> {
        self.lock().get(uri).map(|e| e.record.clone())
    }

    /// Clear a Failed source so the monitor retries it from scratch.
    pub fn reset(&self, uri: &str) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(uri) else {
            return false;
        };
        if entry.record.status != ConnectionStatus::Failed {
            return false;
        }
        let record = &mut entry.record;
        record.status = ConnectionStatus::Disconnected;
        record.retry_count = 0;
        record.backoff = self.config.initial_backoff;
        record.last_backoff = None;
        record.next_retry_at = None;
        info!(uri, "Failed source reset");
        true
    }

    pub fn status_summary(&self) -> StatusSummary {
        let entries = self.lock();
        let mut summary = StatusSummary::default();
        for uri in &self.uris {
            let Some(entry) = entries.get(uri) else {
                continue;
            };
            match entry.record.status {
                ConnectionStatus::Connected => summary.connected += 1,
                ConnectionStatus::Disconnected => summary.disconnected += 1,
                ConnectionStatus::Failed => summary.failed += 1,
                ConnectionStatus::Connecting | ConnectionStatus::Closing => summary.in_progress += 1,
            }
            summary.sources.push(entry.record.clone());
        }
        summary
    }

    /// One health pass over every source.
    pub async fn monitor_pass(&self) -> StatusSummary {
        for uri in &self.uris {
            if self.health(uri).await {
                continue;
            }

            {
                let mut entries = self.lock();
                if let Some(entry) = entries.get_mut(uri) {
                    if entry.record.status == ConnectionStatus::Connected {
                        entry.record.status = ConnectionStatus::Disconnected;
                        warn!(uri = %uri, "Connection lost");
                    }
                }
            }

            self.reconnect(uri).await;
        }

        let summary = self.status_summary();
        crate::metrics::record_source_status(&summary);
        if summary.disconnected > 0 || summary.failed > 0 {
            warn!(
                connected = summary.connected,
                disconnected = summary.disconnected,
                failed = summary.failed,
                "Source status"
            );
        } else {
            debug!(connected = summary.connected, "Source status");
        }
        summary
    }

    /// Run health passes until shutdown.
    pub async fn run_monitor(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.monitor_interval.as_secs(),
            "Connection monitor started"
        );
        let mut interval = tokio::time::interval(self.config.monitor_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; sources were just initialized.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.monitor_pass().await;
                }
            }
        }
        info!("Connection monitor stopped");
    }

    /// Close every session.
    pub async fn close_all(&self) {
        let sessions: Vec<SharedSession> = {
            let mut entries = self.lock();
            entries
                .values_mut()
                .filter_map(|e| {
                    e.record.status = ConnectionStatus::Closing;
                    e.session.take()
                })
                .collect()
        };
        for session in sessions {
            session.lock().await.close().await;
        }
    }
}

fn jitter() -> f64 {
    rand::rng().random_range(0.8..=1.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use vigil_media::{MediaError, MediaResult};
    use vigil_models::Frame;

    const URI: &str = "rtsp://camera-1/stream";

    struct FakeSession {
        open: Arc<AtomicBool>,
    }

    #[async_trait]
    impl MediaSession for FakeSession {
        async fn read_frame(&mut self) -> MediaResult<Frame> {
            Ok(Frame::new(vec![0; 12], 2, 2, Utc::now()))
        }

        fn is_open(&mut self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        async fn close(&mut self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    /// Succeeds or fails according to a script; fails once the script runs out.
    struct ScriptedConnector {
        script: Mutex<VecDeque<bool>>,
        last_open: Mutex<Option<Arc<AtomicBool>>>,
    }

    impl ScriptedConnector {
        fn new(script: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                last_open: Mutex::new(None),
            })
        }

        fn push(&self, ok: bool) {
            self.script.lock().unwrap().push_back(ok);
        }

        fn drop_last_session(&self) {
            if let Some(flag) = self.last_open.lock().unwrap().as_ref() {
                flag.store(false, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl SourceConnector for ScriptedConnector {
        async fn open(&self, uri: &str) -> MediaResult<Box<dyn MediaSession>> {
            let ok = self.script.lock().unwrap().pop_front().unwrap_or(false);
            if !ok {
                return Err(MediaError::connect_failed(uri, "refused"));
            }
            let open = Arc::new(AtomicBool::new(true));
            *self.last_open.lock().unwrap() = Some(open.clone());
            Ok(Box::new(FakeSession { open }))
        }
    }

    fn manager(connector: Arc<ScriptedConnector>, max_retries: u32) -> ConnectionManager {
        ConnectionManager::new(
            connector,
            ConnectionConfig {
                max_retries,
                ..Default::default()
            },
            vec![URI.to_string()],
        )
    }

    /// Failed reconnect with the retry time forced past any backoff.
    async fn fail_once(manager: &ConnectionManager) -> Duration {
        let at = manager
            .record(URI)
            .unwrap()
            .next_retry_at
            .unwrap_or_else(Instant::now);
        assert_eq!(manager.reconnect_at(URI, at).await, ReconnectOutcome::Scheduled);
        manager.record(URI).unwrap().last_backoff.unwrap()
    }

    #[tokio::test]
    async fn test_connect_reports_failure_without_error() {
        let manager = manager(ScriptedConnector::new(&[false]), 3);
        assert!(!manager.connect(URI).await);
        assert_eq!(manager.status(URI), Some(ConnectionStatus::Disconnected));
        assert!(manager.session(URI).is_none());
    }

    #[tokio::test]
    async fn test_connect_unknown_source() {
        let manager = manager(ScriptedConnector::new(&[true]), 3);
        assert!(!manager.connect("rtsp://other").await);
    }

    #[tokio::test]
    async fn test_backoff_doubles_then_resets_on_success() {
        let connector = ScriptedConnector::new(&[false, false, false, true, false]);
        let manager = manager(connector, 10);

        assert_eq!(fail_once(&manager).await, Duration::from_secs(1));
        assert_eq!(fail_once(&manager).await, Duration::from_secs(2));
        assert_eq!(fail_once(&manager).await, Duration::from_secs(4));

        let at = manager.record(URI).unwrap().next_retry_at.unwrap();
        assert_eq!(manager.reconnect_at(URI, at).await, ReconnectOutcome::Connected);
        let record = manager.record(URI).unwrap();
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.backoff, Duration::from_secs(1));

        let session = manager.session(URI).unwrap();
        assert!(manager.mark_disconnected(URI, &session));
        assert_eq!(fail_once(&manager).await, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_stale_reader_cannot_disconnect_replacement() {
        let manager = manager(ScriptedConnector::new(&[true, true]), 3);
        assert!(manager.connect(URI).await);
        let stale = manager.session(URI).unwrap();

        assert!(manager.mark_disconnected(URI, &stale));
        assert_eq!(
            manager.reconnect_at(URI, Instant::now()).await,
            ReconnectOutcome::Connected
        );
        assert!(!stale.lock().await.is_open());

        // The old reader's failed read arrives after the reconnect.
        assert!(!manager.mark_disconnected(URI, &stale));
        assert_eq!(manager.status(URI), Some(ConnectionStatus::Connected));
        assert_eq!(manager.record(URI).unwrap().retry_count, 0);

        let fresh = manager.session(URI).unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(manager.mark_disconnected(URI, &fresh));
        assert_eq!(manager.status(URI), Some(ConnectionStatus::Disconnected));
    }

    #[tokio::test]
    async fn test_backoff_respects_ceiling_and_jitter() {
        let connector = ScriptedConnector::new(&[]);
        let manager = ConnectionManager::new(
            connector,
            ConnectionConfig {
                max_retries: 20,
                backoff_ceiling: Duration::from_secs(8),
                ..Default::default()
            },
            vec![URI.to_string()],
        );

        let mut previous = Duration::ZERO;
        for _ in 0..8 {
            let at = manager
                .record(URI)
                .unwrap()
                .next_retry_at
                .unwrap_or_else(Instant::now);
            manager.reconnect_at(URI, at).await;
            let record = manager.record(URI).unwrap();
            let base = record.last_backoff.unwrap();
            assert!(base >= previous);
            assert!(base <= Duration::from_secs(8));

            let delay = record.next_retry_at.unwrap() - at;
            assert!(delay >= base.mul_f64(0.8) && delay <= base.mul_f64(1.2));
            previous = base;
        }
        assert_eq!(previous, Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_reconnect_skipped_during_backoff() {
        let manager = manager(ScriptedConnector::new(&[false, true]), 3);
        let t0 = Instant::now();
        assert_eq!(manager.reconnect_at(URI, t0).await, ReconnectOutcome::Scheduled);
        assert_eq!(manager.reconnect_at(URI, t0).await, ReconnectOutcome::Skipped);
        assert_eq!(manager.record(URI).unwrap().retry_count, 1);
    }

    #[tokio::test]
    async fn test_failed_is_terminal_until_reset() {
        let connector = ScriptedConnector::new(&[false, false, false]);
        let manager = manager(connector.clone(), 3);

        for _ in 0..3 {
            fail_once(&manager).await;
        }
        let at = manager.record(URI).unwrap().next_retry_at.unwrap();
        assert_eq!(manager.reconnect_at(URI, at).await, ReconnectOutcome::Failed);
        assert_eq!(manager.status(URI), Some(ConnectionStatus::Failed));

        // Would succeed, but Failed never auto-recovers.
        connector.push(true);
        let later = at + Duration::from_secs(3600);
        assert_eq!(manager.reconnect_at(URI, later).await, ReconnectOutcome::Failed);
        manager.monitor_pass().await;
        assert_eq!(manager.status(URI), Some(ConnectionStatus::Failed));

        assert!(manager.reset(URI));
        assert_eq!(manager.reconnect_at(URI, later).await, ReconnectOutcome::Connected);
        assert_eq!(manager.status(URI), Some(ConnectionStatus::Connected));
    }

    #[tokio::test]
    async fn test_reset_only_clears_failed() {
        let manager = manager(ScriptedConnector::new(&[true]), 3);
        manager.connect(URI).await;
        assert!(!manager.reset(URI));
    }

    #[tokio::test]
    async fn test_health_uses_heartbeat() {
        let manager = manager(ScriptedConnector::new(&[true]), 3);
        assert!(manager.connect(URI).await);
        let t0 = Instant::now();
        let timeout = Duration::from_secs(60);

        assert!(manager.health_at(URI, timeout, t0).await);
        // No frame since connect.
        assert!(!manager.health_at(URI, timeout, t0 + Duration::from_secs(61)).await);

        manager.heartbeat_at(URI, t0 + Duration::from_secs(50));
        assert!(manager.health_at(URI, timeout, t0 + Duration::from_secs(100)).await);
        assert!(!manager.health_at(URI, timeout, t0 + Duration::from_secs(111)).await);
    }

    #[tokio::test]
    async fn test_health_false_when_session_closed() {
        let connector = ScriptedConnector::new(&[true]);
        let manager = manager(connector.clone(), 3);
        assert!(manager.connect(URI).await);
        connector.drop_last_session();
        assert!(!manager.health(URI).await);
    }

    #[tokio::test]
    async fn test_health_false_when_not_connected() {
        let manager = manager(ScriptedConnector::new(&[]), 3);
        assert!(!manager.health(URI).await);
    }

    #[tokio::test]
    async fn test_monitor_pass_recovers_lost_source() {
        let connector = ScriptedConnector::new(&[true, true]);
        let manager = manager(connector.clone(), 3);
        assert!(manager.connect(URI).await);
        connector.drop_last_session();

        let summary = manager.monitor_pass().await;
        assert_eq!(summary.connected, 1);
        assert!(summary.all_connected());
        assert!(manager.health(URI).await);
    }

    #[tokio::test]
    async fn test_status_summary_counts() {
        let connector = ScriptedConnector::new(&[true, false]);
        let manager = ConnectionManager::new(
            connector,
            ConnectionConfig::default(),
            vec!["rtsp://a".to_string(), "rtsp://b".to_string()],
        );
        assert_eq!(manager.initialize_all().await, 1);

        let summary = manager.status_summary();
        assert_eq!(summary.connected, 1);
        assert_eq!(summary.disconnected, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn test_close_all() {
        let connector = ScriptedConnector::new(&[true]);
        let manager = manager(connector, 3);
        manager.connect(URI).await;
        let session = manager.session(URI).unwrap();
        manager.close_all().await;
        assert!(!session.lock().await.is_open());
        assert!(manager.session(URI).is_none());
    }
}
