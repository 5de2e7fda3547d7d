//! Inference contract used by the scoring pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vigil_models::{Frame, TrackId};

use crate::error::MlResult;

/// One visible person in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackObservation {
    pub track_id: TrackId,
    /// Normalized pose features. Absent for low-confidence detections.
    #[serde(default)]
    pub features: Option<Vec<f32>>,
}

impl TrackObservation {
    pub fn new(track_id: u64, features: Option<Vec<f32>>) -> Self {
        Self {
            track_id: TrackId(track_id),
            features,
        }
    }
}

/// Turns frames into per-track feature vectors.
///
/// Implementations keep one tracker per camera id.
#[async_trait]
pub trait PoseTracker: Send + Sync {
    async fn track(&self, camera_id: &str, frame: &Frame) -> MlResult<Vec<TrackObservation>>;
}

/// Scores a full window of feature vectors.
#[async_trait]
pub trait WindowScorer: Send + Sync {
    /// Suspicion probability in `[0, 1]`.
    async fn classify(&self, window: &[Vec<f32>]) -> MlResult<f64>;

    /// Raw reconstruction error, or `None` when no anomaly model is configured.
    async fn reconstruction_error(&self, window: &[Vec<f32>]) -> MlResult<Option<f64>>;
}

#[derive(Debug, Serialize)]
pub(crate) struct WindowRequest<'a> {
    pub window: &'a [Vec<f32>],
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackResponse {
    pub tracks: Vec<TrackObservation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyResponse {
    pub probability: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnomalyResponse {
    pub reconstruction_error: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    pub status: String,
}
