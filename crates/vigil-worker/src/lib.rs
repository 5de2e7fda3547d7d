//! Camera anomaly pipeline.
//!
//! This crate provides:
//! - Source connection management with backoff and heartbeat health
//! - Per-camera frame loops driving the track scorer
//! - Clip assembly from recorded segments and alert persistence
//! - The executor that wires everything together

pub mod camera_worker;
pub mod clip_worker;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod retry;

pub use camera_worker::{CameraWorker, FrameOutcome};
pub use clip_worker::{clip_filename, ClipWorker, ClipWorkerPool};
pub use config::{load_cameras, CameraConfig, PipelineConfig};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionRecord, ReconnectOutcome, StatusSummary};
pub use context::{Collaborators, PipelineContext};
pub use error::{WorkerError, WorkerResult};
pub use executor::PipelineExecutor;
pub use logging::JobLogger;
