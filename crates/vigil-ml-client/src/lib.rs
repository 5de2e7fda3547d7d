//! Inference seam for the Vigil pipeline.
//!
//! The pipeline only depends on the [`PoseTracker`] and [`WindowScorer`]
//! traits. [`MlClient`] implements both against the HTTP inference service.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{PoseTracker, TrackObservation, WindowScorer};
