//! Clip job queue and dedupe gate.
//!
//! This crate provides:
//! - A bounded multi-producer multi-consumer [`JobQueue`] with a
//!   wait-then-drop saturation policy
//! - A [`DedupeGate`] that suppresses repeat triggers for one event key

pub mod dedupe;
pub mod error;
pub mod queue;

pub use dedupe::DedupeGate;
pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, QueueConfig};
