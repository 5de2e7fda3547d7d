//! Shared pipeline context.
//!
//! Created once at startup and handed to every worker; nothing in the
//! pipeline reaches for process-wide state.

use std::sync::Arc;

use tokio::sync::watch;
use vigil_media::{ClipEncoder, SourceConnector};
use vigil_ml_client::{PoseTracker, WindowScorer};
use vigil_queue::{DedupeGate, JobQueue};
use vigil_store::AlertStore;

use crate::config::{CameraConfig, PipelineConfig};
use crate::connection::ConnectionManager;

/// External collaborators the pipeline is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub connector: Arc<dyn SourceConnector>,
    pub store: Arc<dyn AlertStore>,
    pub tracker: Arc<dyn PoseTracker>,
    pub scorer: Arc<dyn WindowScorer>,
    pub encoder: Arc<dyn ClipEncoder>,
}

pub struct PipelineContext {
    pub config: Arc<PipelineConfig>,
    pub connections: Arc<ConnectionManager>,
    pub queue: JobQueue,
    pub dedupe: Arc<DedupeGate>,
    pub store: Arc<dyn AlertStore>,
    pub tracker: Arc<dyn PoseTracker>,
    pub scorer: Arc<dyn WindowScorer>,
    pub encoder: Arc<dyn ClipEncoder>,
    shutdown: watch::Sender<bool>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig, cameras: &[CameraConfig], collaborators: Collaborators) -> Self {
        let connections = ConnectionManager::new(
            collaborators.connector,
            config.connection_config(),
            cameras.iter().map(|c| c.source_uri.clone()),
        );
        let queue = JobQueue::new(config.queue_config());
        let dedupe = DedupeGate::new(
            Arc::clone(&collaborators.store),
            chrono::Duration::milliseconds(config.dedupe_window.as_millis() as i64),
        );
        let (shutdown, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            connections: Arc::new(connections),
            queue,
            dedupe: Arc::new(dedupe),
            store: collaborators.store,
            tracker: collaborators.tracker,
            scorer: collaborators.scorer,
            encoder: collaborators.encoder,
            shutdown,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Ask every worker to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}
