//! Queue error types.

use thiserror::Error;
use vigil_models::{EventKey, JobId};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue stayed full for the whole enqueue timeout. The job was dropped.
    #[error("Queue saturated, dropped job {job_id} ({event_key})")]
    Saturated { job_id: JobId, event_key: EventKey },

    /// Every consumer is gone. The job was dropped.
    #[error("Queue closed, dropped job {job_id} ({event_key})")]
    Disconnected { job_id: JobId, event_key: EventKey },

    /// Every producer is gone and the queue is drained.
    #[error("Queue closed")]
    Closed,
}

impl QueueError {
    /// Event key of the job this error refers to, if any.
    pub fn event_key(&self) -> Option<&EventKey> {
        match self {
            QueueError::Saturated { event_key, .. }
            | QueueError::Disconnected { event_key, .. } => Some(event_key),
            QueueError::Closed => None,
        }
    }
}
