//! Clip job definitions.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{CameraIdentity, EventKey};

/// Unique identifier for a clip job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracker-assigned id of a person, scoped to one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seconds of footage to keep around an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClipOffsets {
    pub pre_seconds: u64,
    pub during_seconds: u64,
    pub post_seconds: u64,
}

impl ClipOffsets {
    pub fn new(pre_seconds: u64, during_seconds: u64, post_seconds: u64) -> Self {
        Self {
            pre_seconds,
            during_seconds,
            post_seconds,
        }
    }

    /// Time left until the window starting at `event_time` has been fully
    /// recorded, measured from `now`. Zero once the window end has passed.
    pub fn settle_remaining(
        &self,
        event_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> std::time::Duration {
        let (_, end) = self.window(event_time);
        (end - now).to_std().unwrap_or(std::time::Duration::ZERO)
    }

    /// Resolve `[event - pre, event + during + post]`.
    pub fn window(&self, event_time: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = event_time - Duration::seconds(self.pre_seconds as i64);
        let end = event_time + Duration::seconds((self.during_seconds + self.post_seconds) as i64);
        (start, end)
    }

    pub fn total_seconds(&self) -> u64 {
        self.pre_seconds + self.during_seconds + self.post_seconds
    }
}

impl Default for ClipOffsets {
    fn default() -> Self {
        Self::new(2, 2, 2)
    }
}

/// Request to assemble an evidence clip for one trigger.
///
/// Jobs are moved into the queue and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipJob {
    pub job_id: JobId,
    pub camera: CameraIdentity,
    pub event_key: EventKey,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<TrackId>,
    pub event_time: DateTime<Utc>,
    pub offsets: ClipOffsets,
    pub segments_dir: PathBuf,
}

impl ClipJob {
    pub fn new(
        camera: CameraIdentity,
        score: f64,
        track_id: Option<TrackId>,
        event_time: DateTime<Utc>,
        offsets: ClipOffsets,
        segments_dir: impl Into<PathBuf>,
    ) -> Self {
        let event_key = camera.event_key();
        Self {
            job_id: JobId::new(),
            camera,
            event_key,
            score,
            track_id,
            event_time,
            offsets,
            segments_dir: segments_dir.into(),
        }
    }

    /// The resolved clip window for this job.
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.offsets.window(self.event_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_window_resolution() {
        let event = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let offsets = ClipOffsets::new(2, 3, 4);
        let (start, end) = offsets.window(event);
        assert_eq!(start, event - Duration::seconds(2));
        assert_eq!(end, event + Duration::seconds(7));
    }

    #[test]
    fn test_settle_remaining_counts_from_event() {
        let event = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let offsets = ClipOffsets::new(2, 3, 4);
        assert_eq!(
            offsets.settle_remaining(event, event),
            std::time::Duration::from_secs(7)
        );
        assert_eq!(
            offsets.settle_remaining(event, event + Duration::seconds(5)),
            std::time::Duration::from_secs(2)
        );
        // A backlogged job whose window already ended does not wait.
        assert_eq!(
            offsets.settle_remaining(event, event + Duration::minutes(3)),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn test_job_key_derived_from_camera() {
        let camera = CameraIdentity::new("cam-2", "Lobby", "lobby", "loitering");
        let job = ClipJob::new(
            camera,
            0.8,
            Some(TrackId(7)),
            Utc::now(),
            ClipOffsets::default(),
            "/tmp/segments/cam-2",
        );
        assert_eq!(job.event_key.as_str(), "cam-2|lobby|loitering");
    }

    #[test]
    fn test_job_serialization_omits_missing_track() {
        let camera = CameraIdentity::new("cam-2", "Lobby", "lobby", "loitering");
        let job = ClipJob::new(camera, 0.8, None, Utc::now(), ClipOffsets::default(), "/tmp/x");
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("track_id").is_none());
        assert_eq!(json["offsets"]["pre_seconds"], 2);
    }
}
