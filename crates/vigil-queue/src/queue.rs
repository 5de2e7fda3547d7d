//! Bounded in-process clip job queue.
//!
//! Every camera worker holds a clone for producing; every clip worker
//! holds a clone for consuming. Consumers share the single receiver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};
use vigil_models::{metric_names, ClipJob};

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of queued jobs
    pub capacity: usize,
    /// How long a producer waits on a full queue before dropping the job
    pub enqueue_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 50_000,
            enqueue_timeout: Duration::from_millis(250),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: std::env::var("VIGIL_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capacity),
            enqueue_timeout: Duration::from_millis(
                std::env::var("VIGIL_ENQUEUE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.enqueue_timeout.as_millis() as u64),
            ),
        }
    }
}

/// Bounded MPMC queue of clip jobs.
///
/// Saturation policy: enqueue first tries without waiting; if the queue is
/// full it waits up to `enqueue_timeout`, then drops the job, logs it with
/// full job context and counts it in [`JobQueue::dropped_count`].
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<ClipJob>,
    rx: Arc<Mutex<mpsc::Receiver<ClipJob>>>,
    enqueue_timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl JobQueue {
    /// Create a new queue.
    pub fn new(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            enqueue_timeout: config.enqueue_timeout,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue with the given capacity and default timeout.
    pub fn bounded(capacity: usize) -> Self {
        Self::new(QueueConfig {
            capacity,
            ..Default::default()
        })
    }

    /// Enqueue a job.
    pub async fn enqueue(&self, job: ClipJob) -> QueueResult<()> {
        let job = match self.tx.try_send(job) {
            Ok(()) => return self.enqueued(),
            Err(mpsc::error::TrySendError::Full(job)) => job,
            Err(mpsc::error::TrySendError::Closed(job)) => return Err(self.drop_job(job, false)),
        };

        debug!(job_id = %job.job_id, "Queue full, waiting for capacity");
        match self.tx.send_timeout(job, self.enqueue_timeout).await {
            Ok(()) => self.enqueued(),
            Err(mpsc::error::SendTimeoutError::Timeout(job)) => Err(self.drop_job(job, true)),
            Err(mpsc::error::SendTimeoutError::Closed(job)) => Err(self.drop_job(job, false)),
        }
    }

    fn enqueued(&self) -> QueueResult<()> {
        metrics::counter!(metric_names::JOBS_ENQUEUED_TOTAL).increment(1);
        metrics::gauge!(metric_names::QUEUE_DEPTH).set(self.len() as f64);
        Ok(())
    }

    fn drop_job(&self, job: ClipJob, saturated: bool) -> QueueError {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            metric_names::JOBS_DROPPED_TOTAL,
            "reason" => if saturated { "saturated" } else { "closed" }
        )
        .increment(1);
        error!(
            job_id = %job.job_id,
            camera_id = %job.camera.id,
            event_key = %job.event_key,
            score = job.score,
            track_id = ?job.track_id,
            event_time = %job.event_time,
            queue_len = self.len(),
            "Dropping clip job: {}",
            if saturated { "queue saturated" } else { "queue closed" }
        );
        if saturated {
            QueueError::Saturated {
                job_id: job.job_id,
                event_key: job.event_key,
            }
        } else {
            QueueError::Disconnected {
                job_id: job.job_id,
                event_key: job.event_key,
            }
        }
    }

    /// Wait up to `wait` for the next job.
    ///
    /// Returns `Ok(None)` on timeout. Every handle owns a sender, so the
    /// channel stays open while any clone lives; shutdown is signalled by
    /// the caller rather than by [`QueueError::Closed`].
    pub async fn recv(&self, wait: Duration) -> QueueResult<Option<ClipJob>> {
        let result = tokio::time::timeout(wait, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await;

        match result {
            Ok(Some(job)) => {
                metrics::gauge!(metric_names::QUEUE_DEPTH).set(self.len() as f64);
                Ok(Some(job))
            }
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Jobs dropped by the saturation policy since creation.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_models::{CameraIdentity, ClipOffsets};

    fn job(camera_id: &str) -> ClipJob {
        ClipJob::new(
            CameraIdentity::new(camera_id, "Cam", "zone", "suspicious"),
            0.9,
            None,
            Utc::now(),
            ClipOffsets::default(),
            "/tmp/seg",
        )
    }

    #[tokio::test]
    async fn test_fifo_delivery() {
        let queue = JobQueue::bounded(8);
        tokio_test::assert_ok!(queue.enqueue(job("a")).await);
        tokio_test::assert_ok!(queue.enqueue(job("b")).await);
        assert_eq!(queue.len(), 2);

        let first = queue.recv(Duration::from_millis(50)).await.unwrap().unwrap();
        let second = queue.recv(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(first.camera.id, "a");
        assert_eq!(second.camera.id, "b");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recv_times_out_when_empty() {
        let queue = JobQueue::bounded(4);
        assert!(queue.recv(Duration::from_millis(20)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saturation_drops_and_counts() {
        let queue = JobQueue::new(QueueConfig {
            capacity: 1,
            enqueue_timeout: Duration::from_millis(20),
        });
        tokio_test::assert_ok!(queue.enqueue(job("a")).await);

        let err = queue.enqueue(job("b")).await.unwrap_err();
        assert!(matches!(err, QueueError::Saturated { .. }));
        assert_eq!(err.event_key().unwrap().as_str(), "b|zone|suspicious");
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_waits_for_consumer() {
        let queue = JobQueue::new(QueueConfig {
            capacity: 1,
            enqueue_timeout: Duration::from_secs(2),
        });
        tokio_test::assert_ok!(queue.enqueue(job("a")).await);

        let consumer = queue.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            consumer.recv(Duration::from_secs(1)).await.unwrap()
        });

        tokio_test::assert_ok!(queue.enqueue(job("b")).await);
        assert_eq!(handle.await.unwrap().unwrap().camera.id, "a");
        assert_eq!(queue.dropped_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_consumers_each_job_once() {
        let queue = JobQueue::bounded(100);
        for i in 0..20 {
            queue.enqueue(job(&format!("cam-{}", i))).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(Some(job)) = q.recv(Duration::from_millis(50)).await {
                    seen.push(job.camera.id);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        assert_eq!(all.len(), 20);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 20);
    }
}
