//! Pipeline configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use vigil_media::{RecorderConfig, SessionConfig};
use vigil_models::{CameraIdentity, ClipOffsets, EVENT_KEY_SEPARATOR};
use vigil_queue::QueueConfig;
use vigil_scoring::ScoringConfig;

use crate::connection::ConnectionConfig;
use crate::error::{WorkerError, WorkerResult};

/// One configured camera.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub name: String,
    pub zone: String,
    #[serde(alias = "eventType")]
    pub event_type: String,
    #[serde(alias = "rtsp_uri", alias = "sourceUri")]
    pub source_uri: String,
    /// Overrides the global trigger threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl CameraConfig {
    pub fn identity(&self) -> CameraIdentity {
        CameraIdentity::new(&self.id, &self.name, &self.zone, &self.event_type)
    }
}

/// Global pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub threshold: f64,
    /// Seconds of history kept beyond the clip window
    pub buffer_seconds: u64,
    /// Trailing window in which a repeated event key is suppressed
    pub dedupe_window: Duration,
    pub window_size: usize,
    pub consecutive_windows: u32,
    pub ema_alpha: f64,
    pub anomaly_weight: f64,
    pub clip_pre_seconds: u64,
    pub clip_during_seconds: u64,
    pub clip_post_seconds: u64,
    pub decay_rate: f64,
    pub score_floor: f64,
    pub stale_timeout: Duration,
    pub stale_check_interval: Duration,
    pub anomaly_warmup_samples: usize,
    pub max_retries: u32,
    pub backoff_ceiling: Duration,
    pub heartbeat_timeout: Duration,
    pub monitor_interval: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Pause after a failed frame read before asking for a session again
    pub reconnect_sleep: Duration,
    pub fps_target: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub segment_seconds: u64,
    pub segment_margin_seconds: u64,
    pub segment_retry_attempts: u32,
    pub segment_retry_delay: Duration,
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub clip_workers: usize,
    pub segments_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub cameras_path: PathBuf,
    pub score_log_interval: Duration,
    pub recorder_poll_interval: Duration,
    /// Run a segment recorder per camera. Off when segments are produced elsewhere.
    pub record_segments: bool,
    /// Prometheus scrape address; metrics are not exported when unset
    pub metrics_addr: Option<std::net::SocketAddr>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: 0.65,
            buffer_seconds: 10,
            dedupe_window: Duration::from_secs(5 * 60),
            window_size: 24,
            consecutive_windows: 5,
            ema_alpha: 0.6,
            anomaly_weight: 0.3,
            clip_pre_seconds: 2,
            clip_during_seconds: 2,
            clip_post_seconds: 2,
            decay_rate: 0.85,
            score_floor: 0.01,
            stale_timeout: Duration::from_secs(30),
            stale_check_interval: Duration::from_secs(10),
            anomaly_warmup_samples: 50,
            max_retries: 3,
            backoff_ceiling: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(60),
            monitor_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            reconnect_sleep: Duration::from_secs(1),
            fps_target: 15,
            frame_width: 1280,
            frame_height: 720,
            segment_seconds: 1,
            segment_margin_seconds: 2,
            segment_retry_attempts: 3,
            segment_retry_delay: Duration::from_secs(2),
            queue_capacity: 50_000,
            enqueue_timeout: Duration::from_millis(250),
            clip_workers: default_clip_workers(),
            segments_dir: PathBuf::from("/var/lib/vigil/segments"),
            clips_dir: PathBuf::from("/var/lib/vigil/clips"),
            cameras_path: PathBuf::from("cameras.json"),
            score_log_interval: Duration::from_secs(3),
            recorder_poll_interval: Duration::from_secs(1),
            record_segments: true,
            metrics_addr: None,
        }
    }
}

/// Encoding is CPU-bound, so one clip worker per core.
fn default_clip_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from `VIGIL_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            threshold: env_parse("VIGIL_THRESHOLD", d.threshold),
            buffer_seconds: env_parse("VIGIL_BUFFER_SECONDS", d.buffer_seconds),
            dedupe_window: Duration::from_secs(
                60 * env_parse("VIGIL_DEDUPE_MINUTES", d.dedupe_window.as_secs() / 60),
            ),
            window_size: env_parse("VIGIL_WINDOW_SIZE", d.window_size),
            consecutive_windows: env_parse("VIGIL_CONSECUTIVE_WINDOWS", d.consecutive_windows),
            ema_alpha: env_parse("VIGIL_EMA_ALPHA", d.ema_alpha),
            anomaly_weight: env_parse("VIGIL_ANOMALY_WEIGHT", d.anomaly_weight),
            clip_pre_seconds: env_parse("VIGIL_CLIP_PRE_SECONDS", d.clip_pre_seconds),
            clip_during_seconds: env_parse("VIGIL_CLIP_DURING_SECONDS", d.clip_during_seconds),
            clip_post_seconds: env_parse("VIGIL_CLIP_POST_SECONDS", d.clip_post_seconds),
            decay_rate: env_parse("VIGIL_DECAY_RATE", d.decay_rate),
            score_floor: env_parse("VIGIL_SCORE_FLOOR", d.score_floor),
            stale_timeout: env_secs("VIGIL_STALE_TIMEOUT_SECS", d.stale_timeout),
            stale_check_interval: env_secs("VIGIL_STALE_CHECK_INTERVAL_SECS", d.stale_check_interval),
            anomaly_warmup_samples: env_parse("VIGIL_ANOMALY_WARMUP_SAMPLES", d.anomaly_warmup_samples),
            max_retries: env_parse("VIGIL_MAX_RETRIES", d.max_retries),
            backoff_ceiling: env_secs("VIGIL_BACKOFF_CEILING_SECS", d.backoff_ceiling),
            heartbeat_timeout: env_secs("VIGIL_HEARTBEAT_TIMEOUT_SECS", d.heartbeat_timeout),
            monitor_interval: env_secs("VIGIL_MONITOR_INTERVAL_SECS", d.monitor_interval),
            connect_timeout: env_secs("VIGIL_CONNECT_TIMEOUT_SECS", d.connect_timeout),
            read_timeout: env_secs("VIGIL_READ_TIMEOUT_SECS", d.read_timeout),
            reconnect_sleep: Duration::from_millis(env_parse(
                "VIGIL_RECONNECT_SLEEP_MS",
                d.reconnect_sleep.as_millis() as u64,
            )),
            fps_target: env_parse("VIGIL_FPS_TARGET", d.fps_target),
            frame_width: env_parse("VIGIL_FRAME_WIDTH", d.frame_width),
            frame_height: env_parse("VIGIL_FRAME_HEIGHT", d.frame_height),
            segment_seconds: env_parse("VIGIL_SEGMENT_SECONDS", d.segment_seconds),
            segment_margin_seconds: env_parse("VIGIL_SEGMENT_MARGIN_SECONDS", d.segment_margin_seconds),
            segment_retry_attempts: env_parse("VIGIL_SEGMENT_RETRY_ATTEMPTS", d.segment_retry_attempts),
            segment_retry_delay: env_secs("VIGIL_SEGMENT_RETRY_DELAY_SECS", d.segment_retry_delay),
            queue_capacity: env_parse("VIGIL_QUEUE_CAPACITY", d.queue_capacity),
            enqueue_timeout: Duration::from_millis(env_parse(
                "VIGIL_ENQUEUE_TIMEOUT_MS",
                d.enqueue_timeout.as_millis() as u64,
            )),
            clip_workers: env_parse("VIGIL_CLIP_WORKERS", d.clip_workers),
            segments_dir: env_path("VIGIL_SEGMENTS_DIR", d.segments_dir),
            clips_dir: env_path("VIGIL_CLIPS_DIR", d.clips_dir),
            cameras_path: env_path("VIGIL_CAMERAS_PATH", d.cameras_path),
            score_log_interval: env_secs("VIGIL_SCORE_LOG_INTERVAL_SECS", d.score_log_interval),
            recorder_poll_interval: d.recorder_poll_interval,
            record_segments: env_parse("VIGIL_RECORD_SEGMENTS", d.record_segments),
            metrics_addr: std::env::var("VIGIL_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.clip_workers == 0 {
            return Err("clip_workers must be > 0".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be > 0".to_string());
        }
        if self.dedupe_window.is_zero() {
            return Err("dedupe window must be > 0".to_string());
        }
        if self.segment_retry_attempts == 0 {
            return Err("segment_retry_attempts must be > 0".to_string());
        }
        if self.frame_width == 0 || self.frame_height == 0 || self.fps_target == 0 {
            return Err("frame size and fps must be > 0".to_string());
        }
        self.scoring_config(self.threshold).validate()
    }

    /// Trigger threshold for a camera, honoring its override.
    pub fn threshold_for(&self, camera: &CameraConfig) -> f64 {
        camera.threshold.unwrap_or(self.threshold)
    }

    pub fn scoring_config(&self, threshold: f64) -> ScoringConfig {
        ScoringConfig {
            window_size: self.window_size,
            ema_alpha: self.ema_alpha,
            threshold,
            consecutive_gate: self.consecutive_windows,
            anomaly_weight: self.anomaly_weight,
            decay_rate: self.decay_rate,
            score_floor: self.score_floor,
            stale_timeout: self.stale_timeout,
            stale_check_interval: self.stale_check_interval,
            anomaly_warmup: self.anomaly_warmup_samples,
            ..Default::default()
        }
    }

    pub fn offsets(&self) -> ClipOffsets {
        ClipOffsets::new(
            self.clip_pre_seconds,
            self.clip_during_seconds,
            self.clip_post_seconds,
        )
    }

    /// Segments retained per camera: enough for a full clip plus slack, never fewer than 15.
    pub fn keep_segments(&self) -> usize {
        let seconds = self.buffer_seconds + self.offsets().total_seconds() + 5;
        let segments = seconds.div_ceil(self.segment_seconds.max(1)) as usize;
        segments.max(15)
    }

    pub fn segments_dir_for(&self, camera_id: &str) -> PathBuf {
        self.segments_dir.join(camera_id)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            width: self.frame_width,
            height: self.frame_height,
            fps: self.fps_target,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        }
    }

    pub fn recorder_config(&self, camera: &CameraConfig) -> RecorderConfig {
        RecorderConfig::new(&camera.id, &camera.source_uri, self.segments_dir_for(&camera.id))
            .with_segment_seconds(self.segment_seconds)
            .with_keep_segments(self.keep_segments())
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
            enqueue_timeout: self.enqueue_timeout,
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_secs(1),
            backoff_ceiling: self.backoff_ceiling,
            heartbeat_timeout: self.heartbeat_timeout,
            monitor_interval: self.monitor_interval,
        }
    }
}

/// Load camera definitions from a JSON array.
pub fn load_cameras(path: &Path) -> WorkerResult<Vec<CameraConfig>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        WorkerError::config_error(format!("cannot read {}: {}", path.display(), e))
    })?;
    let cameras: Vec<CameraConfig> = serde_json::from_str(&raw)?;
    validate_cameras(&cameras).map_err(WorkerError::config_error)?;
    Ok(cameras)
}

pub fn validate_cameras(cameras: &[CameraConfig]) -> Result<(), String> {
    if cameras.is_empty() {
        return Err("no cameras configured".to_string());
    }

    let mut ids = HashSet::new();
    let mut uris = HashSet::new();
    for camera in cameras {
        if camera.id.trim().is_empty() {
            return Err("camera id must not be empty".to_string());
        }
        if camera.id.contains('/') || camera.id.contains("..") {
            return Err(format!("camera id '{}' is not a valid directory name", camera.id));
        }
        for (field, value) in [
            ("id", &camera.id),
            ("zone", &camera.zone),
            ("event_type", &camera.event_type),
        ] {
            if value.contains(EVENT_KEY_SEPARATOR) {
                return Err(format!(
                    "camera '{}' {} must not contain '{}'",
                    camera.id, field, EVENT_KEY_SEPARATOR
                ));
            }
        }
        if !ids.insert(camera.id.as_str()) {
            return Err(format!("duplicate camera id '{}'", camera.id));
        }
        if !uris.insert(camera.source_uri.as_str()) {
            return Err(format!("camera '{}' reuses source uri {}", camera.id, camera.source_uri));
        }
        if camera.source_uri.contains("://") {
            url::Url::parse(&camera.source_uri)
                .map_err(|e| format!("camera '{}' has an invalid source uri: {}", camera.id, e))?;
        } else if camera.source_uri.trim().is_empty() {
            return Err(format!("camera '{}' has no source uri", camera.id));
        }
        if let Some(t) = camera.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!("camera '{}' threshold {} outside [0, 1]", camera.id, t));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: &str) -> CameraConfig {
        CameraConfig {
            id: id.to_string(),
            name: "Front".to_string(),
            zone: "entrance".to_string(),
            event_type: "suspicious".to_string(),
            source_uri: "rtsp://10.0.0.5:554/live".to_string(),
            threshold: None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_keep_segments() {
        let config = PipelineConfig::default();
        // 10 + 2 + 2 + 2 + 5
        assert_eq!(config.keep_segments(), 21);

        let small = PipelineConfig {
            buffer_seconds: 0,
            clip_pre_seconds: 1,
            clip_during_seconds: 1,
            clip_post_seconds: 1,
            ..Default::default()
        };
        assert_eq!(small.keep_segments(), 15);
    }

    #[test]
    fn test_threshold_override() {
        let config = PipelineConfig::default();
        let mut cam = camera("cam-1");
        assert_eq!(config.threshold_for(&cam), 0.65);
        cam.threshold = Some(0.8);
        assert_eq!(config.threshold_for(&cam), 0.8);
    }

    #[test]
    fn test_parse_cameras_with_aliases() {
        let raw = r#"[
            {"id": "cam-1", "name": "Front", "zone": "entrance", "eventType": "suspicious",
             "rtsp_uri": "rtsp://10.0.0.5/live", "threshold": 0.7},
            {"id": "cam-2", "name": "Back", "zone": "yard", "event_type": "loitering",
             "source_uri": "/videos/yard.mp4"}
        ]"#;
        let cameras: Vec<CameraConfig> = serde_json::from_str(raw).unwrap();
        assert_eq!(cameras[0].event_type, "suspicious");
        assert_eq!(cameras[0].threshold, Some(0.7));
        assert_eq!(cameras[1].source_uri, "/videos/yard.mp4");
        assert!(validate_cameras(&cameras).is_ok());
    }

    #[test]
    fn test_validate_cameras() {
        assert!(validate_cameras(&[]).is_err());
        assert!(validate_cameras(&[camera("a"), camera("a")])
            .unwrap_err()
            .contains("duplicate"));
        assert!(validate_cameras(&[camera("../etc")]).is_err());

        let mut other = camera("c");
        other.id = "d".to_string();
        assert!(validate_cameras(&[camera("c"), other])
            .unwrap_err()
            .contains("reuses"));

        let mut piped = camera("e");
        piped.zone = "yard|north".to_string();
        assert!(validate_cameras(&[piped]).unwrap_err().contains("zone"));
        assert!(validate_cameras(&[camera("cam|1")]).is_err());

        let mut bad = camera("b");
        bad.threshold = Some(1.2);
        assert!(validate_cameras(&[bad]).is_err());
    }

    #[test]
    fn test_load_cameras_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cameras.json");
        std::fs::write(
            &path,
            r#"[{"id":"cam-1","name":"Front","zone":"z","event_type":"e","source_uri":"rtsp://h/s"}]"#,
        )
        .unwrap();
        let cameras = load_cameras(&path).unwrap();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].identity().event_key().as_str(), "cam-1|z|e");
    }
}
