//! Per-camera frame loop.
//!
//! One worker per camera reads frames, feeds the tracker's output to its
//! [`TrackScorer`] strictly in arrival order and turns triggers into clip
//! jobs. It also supervises the camera's segment recorder.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use vigil_media::SegmentRecorder;
use vigil_models::{CameraIdentity, ClipJob};
use vigil_scoring::{TrackScorer, Trigger};

use crate::config::CameraConfig;
use crate::context::PipelineContext;
use crate::retry::FailureTracker;

/// What happened to one pass of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No active session; the worker waited for the monitor to reconnect.
    NoSession,
    ReadFailed,
    /// Frame read, but the tracker failed on it
    TrackerFailed,
    Scored,
    /// A trigger passed the dedupe gate and was enqueued
    Enqueued,
    /// A trigger was suppressed or could not be enqueued
    Suppressed,
}

pub struct CameraWorker {
    ctx: Arc<PipelineContext>,
    camera: CameraConfig,
    identity: CameraIdentity,
    segments_dir: PathBuf,
    scorer: TrackScorer,
    recorder: Option<SegmentRecorder>,
    read_failures: FailureTracker,
    recorder_failures: FailureTracker,
}

impl CameraWorker {
    pub fn new(ctx: Arc<PipelineContext>, camera: CameraConfig) -> Self {
        let config = &ctx.config;
        let scorer = TrackScorer::new(
            &camera.id,
            config.scoring_config(config.threshold_for(&camera)),
        );
        let recorder = config
            .record_segments
            .then(|| SegmentRecorder::new(config.recorder_config(&camera)));
        let segments_dir = config.segments_dir_for(&camera.id);
        let identity = camera.identity();

        Self {
            ctx,
            camera,
            identity,
            segments_dir,
            scorer,
            recorder,
            read_failures: FailureTracker::new(3),
            recorder_failures: FailureTracker::new(3),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera.id
    }

    /// Run until shutdown, then stop the recorder.
    pub async fn run(mut self) {
        info!(
            camera_id = %self.camera.id,
            threshold = self.scorer.config().threshold,
            "Camera worker started"
        );
        let mut shutdown = self.ctx.subscribe();
        let poll_interval = self.ctx.config.recorder_poll_interval;
        let log_interval = self.ctx.config.score_log_interval;

        self.supervise_recorder().await;
        let mut last_poll = Instant::now();
        let mut last_log = Instant::now();

        while !*shutdown.borrow() {
            if last_poll.elapsed() >= poll_interval {
                self.supervise_recorder().await;
                last_poll = Instant::now();
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.process_next_frame() => {}
            }

            if last_log.elapsed() >= log_interval {
                if !self.scorer.is_empty() {
                    debug!(camera_id = %self.camera.id, "{}", self.scorer.summary());
                }
                last_log = Instant::now();
            }
        }

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop().await;
        }
        info!(camera_id = %self.camera.id, "Camera worker stopped");
    }

    /// Read one frame and advance the scorer by it.
    pub async fn process_next_frame(&mut self) -> FrameOutcome {
        let uri = self.camera.source_uri.as_str();
        let Some(session) = self.ctx.connections.session(uri) else {
            tokio::time::sleep(self.ctx.config.reconnect_sleep).await;
            return FrameOutcome::NoSession;
        };

        let read = session.lock().await.read_frame().await;
        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                if self.read_failures.record_failure() {
                    warn!(camera_id = %self.camera.id, "Frame read failed: {}", e);
                }
                crate::metrics::record_frame_read_failure(&self.camera.id);
                self.ctx.connections.mark_disconnected(uri, &session);
                tokio::time::sleep(self.ctx.config.reconnect_sleep).await;
                return FrameOutcome::ReadFailed;
            }
        };
        self.read_failures.record_success();
        self.ctx.connections.heartbeat(uri);

        let observations = match self.ctx.tracker.track(&self.camera.id, &frame).await {
            Ok(observations) => observations,
            Err(e) => {
                debug!(camera_id = %self.camera.id, "Tracker failed, skipping frame: {}", e);
                return FrameOutcome::TrackerFailed;
            }
        };

        let outcome = self
            .scorer
            .step(&observations, Instant::now(), self.ctx.scorer.as_ref())
            .await;

        match outcome.trigger {
            Some(trigger) => {
                if self.submit(trigger).await {
                    FrameOutcome::Enqueued
                } else {
                    FrameOutcome::Suppressed
                }
            }
            None => FrameOutcome::Scored,
        }
    }

    /// Pass a trigger through the dedupe gate into the queue.
    async fn submit(&self, trigger: Trigger) -> bool {
        let event_time = Utc::now();
        let event_key = self.identity.event_key();

        if !self.ctx.dedupe.try_reserve_at(&event_key, event_time).await {
            return false;
        }

        let job = ClipJob::new(
            self.identity.clone(),
            trigger.score,
            Some(trigger.track_id),
            event_time,
            self.ctx.config.offsets(),
            self.segments_dir.clone(),
        );
        let job_id = job.job_id.clone();

        match self.ctx.queue.enqueue(job).await {
            Ok(()) => {
                info!(
                    camera_id = %self.camera.id,
                    job_id = %job_id,
                    track_id = %trigger.track_id,
                    score = trigger.score,
                    "Trigger enqueued"
                );
                true
            }
            Err(_) => {
                // The queue has already logged and counted the drop.
                self.ctx.dedupe.release_if(&event_key, event_time);
                false
            }
        }
    }

    /// Restart the recorder if it died and prune old segments.
    async fn supervise_recorder(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };

        if !recorder.is_running() {
            let restarting = recorder.start_count() > 0;
            match recorder.start().await {
                Ok(()) => {
                    self.recorder_failures.record_success();
                    if restarting {
                        warn!(camera_id = %self.camera.id, "Segment recorder restarted");
                        crate::metrics::record_recorder_restart(&self.camera.id);
                    }
                }
                Err(e) => {
                    if self.recorder_failures.record_failure() {
                        warn!(camera_id = %self.camera.id, "Failed to start segment recorder: {}", e);
                    }
                }
            }
        }

        let report = recorder.cleanup().await;
        if report.removed > 0 {
            crate::metrics::record_segments_pruned(report.removed);
        }
        if report.failed > 0 {
            debug!(
                camera_id = %self.camera.id,
                failed = report.failed,
                "Some segments could not be pruned"
            );
        }
    }
}

