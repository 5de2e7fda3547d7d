//! Persisted alert records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ClipJob, ClipOffsets, EventKey, JobId, TrackId};

/// Value of [`ClipInfo::source`] for clips built from recorded segments.
pub const CLIP_SOURCE_SEGMENTS: &str = "ffmpeg_segments";

/// Resolved time window covered by a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Clip metadata embedded in an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClipInfo {
    pub filename: String,
    pub path: String,
    pub source: String,
    pub segment_range: SegmentRange,
    pub segment_count: usize,
}

/// A persisted alert. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    pub event_key: EventKey,
    pub job_id: JobId,
    pub camera_id: String,
    pub camera_name: String,
    pub zone: String,
    pub event_type: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<TrackId>,
    pub offsets: ClipOffsets,
    pub segments_dir: String,
    /// Event time of the trigger. Dedupe windows are measured against this.
    pub created_at: DateTime<Utc>,
    pub clip: ClipInfo,
}

impl Alert {
    /// Build the alert for a job whose clip was assembled.
    pub fn from_job(job: &ClipJob, clip: ClipInfo) -> Self {
        Self {
            event_key: job.event_key.clone(),
            job_id: job.job_id.clone(),
            camera_id: job.camera.id.clone(),
            camera_name: job.camera.name.clone(),
            zone: job.camera.zone.clone(),
            event_type: job.camera.event_type.clone(),
            score: job.score,
            track_id: job.track_id,
            offsets: job.offsets,
            segments_dir: job.segments_dir.to_string_lossy().to_string(),
            created_at: job.event_time,
            clip,
        }
    }
}
