//! Clip assembly and the clip worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use chrono::Utc;
use tracing::{debug, info, warn, Instrument};
use vigil_media::{move_file, select_segments, ClipEncoder, MediaError, SegmentFile};
use vigil_models::{Alert, ClipInfo, ClipJob, SegmentRange, CLIP_SOURCE_SEGMENTS};
use vigil_queue::{DedupeGate, JobQueue, QueueError};
use vigil_store::AlertStore;

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::retry::{retry_async, RetryConfig};

/// How long a pool worker waits on an empty queue before rechecking shutdown.
const RECV_WAIT: Duration = Duration::from_secs(1);

/// `<camera_id>_<YYYYmmdd_HHMMSS>_<8 hex>.mp4`, stamped with the event time.
pub fn clip_filename(job: &ClipJob) -> String {
    let suffix: String = job
        .job_id
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect();
    format!(
        "{}_{}_{}.mp4",
        job.camera.id,
        job.event_time.format("%Y%m%d_%H%M%S"),
        suffix
    )
}

/// Turns one [`ClipJob`] into a stored [`Alert`].
pub struct ClipWorker {
    config: Arc<PipelineConfig>,
    store: Arc<dyn AlertStore>,
    dedupe: Arc<DedupeGate>,
    encoder: Arc<dyn ClipEncoder>,
}

impl ClipWorker {
    pub fn new(
        config: Arc<PipelineConfig>,
        store: Arc<dyn AlertStore>,
        dedupe: Arc<DedupeGate>,
        encoder: Arc<dyn ClipEncoder>,
    ) -> Self {
        Self {
            config,
            store,
            dedupe,
            encoder,
        }
    }

    pub fn from_context(ctx: &PipelineContext) -> Self {
        Self::new(
            Arc::clone(&ctx.config),
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.dedupe),
            Arc::clone(&ctx.encoder),
        )
    }

    /// Run a job to completion. Failures are logged and the job dropped.
    pub async fn run_job(&self, job: ClipJob) -> Option<Alert> {
        let logger = JobLogger::new(&job);
        let span = logger.create_span();

        let result = self.build_clip(&job, &logger).instrument(span).await;
        self.dedupe.release_if(&job.event_key, job.event_time);

        match result {
            Ok(alert) => {
                logger.log_completion(&alert.clip.filename);
                crate::metrics::record_job_completed(&job.camera.id);
                Some(alert)
            }
            Err(e) => {
                logger.log_error(&format!(
                    "{} (score={:.3}, track={:?}, window={:?})",
                    e,
                    job.score,
                    job.track_id,
                    job.window()
                ));
                crate::metrics::record_job_failed(&job.camera.id, e.failure_reason());
                None
            }
        }
    }

    /// Wait for the window to be recorded, then select, encode and persist.
    ///
    /// The wait runs until the window end, so a job picked up late from a
    /// backlog starts right away.
    pub async fn build_clip(&self, job: &ClipJob, logger: &JobLogger) -> WorkerResult<Alert> {
        let settle = job.offsets.settle_remaining(job.event_time, Utc::now());
        logger.log_start(&format!("settling {:?}", settle));
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let (start, end) = job.window();
        let segments = self.find_segments(job).await?;
        logger.log_progress(&format!("{} segments selected", segments.len()));

        let filename = clip_filename(job);
        let staging = tempfile::Builder::new().prefix("vigil-clip-").tempdir()?;
        let staged = staging.path().join(&filename);
        self.encoder.encode(&segments, &staged).await?;

        let destination = self.config.clips_dir.join(&filename);
        move_file(&staged, &destination).await?;

        let alert = Alert::from_job(
            job,
            ClipInfo {
                filename,
                path: destination.to_string_lossy().to_string(),
                source: CLIP_SOURCE_SEGMENTS.to_string(),
                segment_range: SegmentRange { start, end },
                segment_count: segments.len(),
            },
        );

        if let Err(e) = self.store.insert(&alert).await {
            logger.log_warning(&format!(
                "clip {} written but alert not stored",
                destination.display()
            ));
            return Err(e.into());
        }
        Ok(alert)
    }

    /// Segments covering the job window, retried while the recorder catches up.
    ///
    /// Segments pruned between listing and use are dropped from the result.
    async fn find_segments(&self, job: &ClipJob) -> WorkerResult<Vec<SegmentFile>> {
        let (start, end) = job.window();
        let margin = chrono::Duration::seconds(self.config.segment_margin_seconds as i64);
        let segment_seconds = self.config.segment_seconds;
        let dir = &job.segments_dir;

        let retry = RetryConfig::new("segment lookup")
            .with_max_attempts(self.config.segment_retry_attempts)
            .with_delay(self.config.segment_retry_delay);

        let selected = retry_async(&retry, |attempt| async move {
            let found = select_segments(dir, start, end, margin, segment_seconds).await?;
            if found.is_empty() {
                debug!(dir = %dir.display(), attempt, "No segments yet");
                return Err(MediaError::NoSegments);
            }
            Ok(found)
        })
        .await
        .into_result()
        .map_err(|(error, attempts)| {
            warn!(dir = %dir.display(), attempts, "Segment lookup exhausted: {}", error);
            WorkerError::SegmentsUnavailable { attempts }
        })?;

        let mut present = Vec::with_capacity(selected.len());
        for segment in selected {
            if tokio::fs::try_exists(&segment.path).await.unwrap_or(false) {
                present.push(segment);
            } else {
                debug!(path = %segment.path.display(), "Segment vanished before encode");
            }
        }
        if present.is_empty() {
            return Err(WorkerError::SegmentsUnavailable { attempts: 1 });
        }
        Ok(present)
    }
}

/// Fixed-size pool of clip workers sharing one queue.
pub struct ClipWorkerPool;

impl ClipWorkerPool {
    /// Spawn `size` workers. Each finishes its current job before honoring shutdown.
    pub fn spawn(
        size: usize,
        worker: Arc<ClipWorker>,
        queue: JobQueue,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        info!(size, "Starting clip worker pool");
        (0..size.max(1))
            .map(|index| {
                let worker = Arc::clone(&worker);
                let queue = queue.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { pool_loop(index, worker, queue, shutdown).await })
            })
            .collect()
    }
}

async fn pool_loop(
    index: usize,
    worker: Arc<ClipWorker>,
    queue: JobQueue,
    shutdown: watch::Receiver<bool>,
) {
    debug!(worker = index, "Clip worker started");
    while !*shutdown.borrow() {
        match queue.recv(RECV_WAIT).await {
            Ok(Some(job)) => {
                worker.run_job(job).await;
            }
            Ok(None) => {}
            Err(QueueError::Closed) => break,
            Err(e) => warn!(worker = index, "Queue receive failed: {}", e),
        }
    }
    debug!(worker = index, "Clip worker stopped");
}
