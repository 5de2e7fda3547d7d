//! Pipeline executor.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::camera_worker::CameraWorker;
use crate::clip_worker::{ClipWorker, ClipWorkerPool};
use crate::config::{CameraConfig, PipelineConfig};
use crate::context::{Collaborators, PipelineContext};
use crate::error::WorkerResult;

/// How long in-flight clip jobs get to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Wires camera workers, the connection monitor and the clip pool together.
pub struct PipelineExecutor {
    ctx: Arc<PipelineContext>,
    cameras: Vec<CameraConfig>,
}

impl PipelineExecutor {
    pub fn new(config: PipelineConfig, cameras: Vec<CameraConfig>, collaborators: Collaborators) -> Self {
        let ctx = Arc::new(PipelineContext::new(config, &cameras, collaborators));
        Self { ctx, cameras }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Run until Ctrl-C or [`PipelineContext::shutdown`].
    pub async fn run(&self) -> WorkerResult<()> {
        let config = &self.ctx.config;
        info!(
            cameras = self.cameras.len(),
            clip_workers = config.clip_workers,
            queue_capacity = config.queue_capacity,
            "Starting pipeline"
        );
        tokio::fs::create_dir_all(&config.clips_dir).await?;

        let connected = self.ctx.connections.initialize_all().await;
        if connected < self.cameras.len() {
            warn!(
                connected,
                total = self.cameras.len(),
                "Some sources are down; the monitor will retry them"
            );
        }

        let monitor = tokio::spawn(
            Arc::clone(&self.ctx.connections).run_monitor(self.ctx.subscribe()),
        );

        let camera_handles: Vec<_> = self
            .cameras
            .iter()
            .map(|camera| {
                let worker = CameraWorker::new(Arc::clone(&self.ctx), camera.clone());
                tokio::spawn(worker.run())
            })
            .collect();

        let clip_worker = Arc::new(ClipWorker::from_context(&self.ctx));
        let pool = ClipWorkerPool::spawn(
            config.clip_workers,
            clip_worker,
            self.ctx.queue.clone(),
            self.ctx.subscribe(),
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping pipeline");
                self.ctx.shutdown();
            }
            _ = wait_for_shutdown(self.ctx.subscribe()) => {
                info!("Shutdown requested, stopping pipeline");
            }
        }

        join_all(camera_handles).await;
        monitor.await.ok();

        info!(queued = self.ctx.queue.len(), "Waiting for in-flight clip jobs...");
        if tokio::time::timeout(DRAIN_TIMEOUT, join_all(pool)).await.is_err() {
            warn!("Clip workers did not finish in time");
        }

        self.ctx.connections.close_all().await;
        info!(
            dropped_jobs = self.ctx.queue.dropped_count(),
            "Pipeline stopped"
        );
        Ok(())
    }
}

async fn wait_for_shutdown(mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
