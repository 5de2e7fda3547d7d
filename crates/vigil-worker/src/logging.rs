//! Structured logging for clip jobs.

use tracing::{error, info, warn, Span};
use vigil_models::ClipJob;

/// Logs clip job lifecycle events with the job's identifying fields attached,
/// so a failure can be traced back to its camera and trigger.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    camera_id: String,
    event_key: String,
    event_time: String,
}

impl JobLogger {
    pub fn new(job: &ClipJob) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            camera_id: job.camera.id.clone(),
            event_key: job.event_key.to_string(),
            event_time: job.event_time.to_rfc3339(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            camera_id = %self.camera_id,
            event_key = %self.event_key,
            event_time = %self.event_time,
            "Clip job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            camera_id = %self.camera_id,
            "Clip job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            camera_id = %self.camera_id,
            event_key = %self.event_key,
            "Clip job warning: {}", message
        );
    }

    /// Errors carry every identifying field; the job is dropped afterwards.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            camera_id = %self.camera_id,
            event_key = %self.event_key,
            event_time = %self.event_time,
            "Clip job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            camera_id = %self.camera_id,
            event_key = %self.event_key,
            "Clip job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "clip_job",
            job_id = %self.job_id,
            camera_id = %self.camera_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_models::{CameraIdentity, ClipOffsets};

    #[test]
    fn test_job_logger_fields() {
        let camera = CameraIdentity::new("cam-7", "Dock", "loading", "intrusion");
        let job = ClipJob::new(camera, 0.8, None, Utc::now(), ClipOffsets::default(), "/tmp/seg");
        let logger = JobLogger::new(&job);

        assert_eq!(logger.job_id(), job.job_id.to_string());
        assert_eq!(logger.camera_id(), "cam-7");
        assert_eq!(logger.event_key, "cam-7|loading|intrusion");
    }
}
