//! Shared data models for the Vigil alert pipeline.
//!
//! This crate contains the types that flow between camera workers,
//! the clip queue, clip workers and the alert store.

pub mod alert;
pub mod camera;
pub mod connection;
pub mod frame;
pub mod job;
pub mod metric_names;

pub use alert::{Alert, ClipInfo, SegmentRange, CLIP_SOURCE_SEGMENTS};
pub use camera::{CameraIdentity, EventKey, EVENT_KEY_SEPARATOR};
pub use connection::ConnectionStatus;
pub use frame::Frame;
pub use job::{ClipJob, ClipOffsets, JobId, TrackId};
