//! FFmpeg process wrappers for the Vigil pipeline.
//!
//! This crate provides:
//! - `session`: frame sessions over a live source
//! - `process`: owned external process handles (graceful then forceful stop)
//! - `recorder`: per-camera segment recording with retention pruning
//! - `segments`: time-addressable segment naming and window selection
//! - `encode`: concat re-encode of selected segments into one clip

pub mod command;
pub mod encode;
pub mod error;
pub mod fs_utils;
pub mod process;
pub mod recorder;
pub mod segments;
pub mod session;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use encode::{ClipEncoder, FfmpegClipEncoder};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use process::OwnedProcess;
pub use recorder::{CleanupReport, RecorderConfig, SegmentRecorder};
pub use segments::{segment_path, select_segments, SegmentFile};
pub use session::{FfmpegConnector, MediaSession, SessionConfig, SourceConnector};
