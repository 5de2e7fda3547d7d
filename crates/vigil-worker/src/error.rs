//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No segments found for window after {attempts} attempts")]
    SegmentsUnavailable { attempts: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] vigil_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Label for the `reason` dimension of the failed-job counter.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            WorkerError::SegmentsUnavailable { .. } => "no_segments",
            WorkerError::Media(vigil_media::MediaError::FfmpegFailed { .. }) => "encode",
            WorkerError::Media(_) | WorkerError::Io(_) => "io",
            WorkerError::Store(_) => "store",
            WorkerError::ConfigError(_) | WorkerError::Json(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_media::MediaError;

    #[test]
    fn test_failure_reason() {
        assert_eq!(
            WorkerError::SegmentsUnavailable { attempts: 3 }.failure_reason(),
            "no_segments"
        );
        assert_eq!(
            WorkerError::from(MediaError::ffmpeg_failed("boom", None, Some(1))).failure_reason(),
            "encode"
        );
        assert_eq!(WorkerError::from(MediaError::NoSegments).failure_reason(), "io");
        assert_eq!(WorkerError::config_error("bad").failure_reason(), "config");
    }
}
