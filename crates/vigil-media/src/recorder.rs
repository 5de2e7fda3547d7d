//! Per-camera segment recording.
//!
//! One FFmpeg segmenter per camera copies the source stream into
//! fixed-length `<epoch>.ts` files. Retention keeps the newest K files.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::command::{check_ffmpeg, FfmpegCommand};
use crate::error::MediaResult;
use crate::process::OwnedProcess;
use crate::segments::{list_segments, SEGMENT_EXTENSION};

/// Recorder settings for one camera.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub camera_id: String,
    pub source_uri: String,
    pub segments_dir: PathBuf,
    pub segment_seconds: u64,
    /// Number of newest segments kept on disk.
    pub keep_segments: usize,
    pub stop_grace: Duration,
}

impl RecorderConfig {
    pub fn new(
        camera_id: impl Into<String>,
        source_uri: impl Into<String>,
        segments_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            source_uri: source_uri.into(),
            segments_dir: segments_dir.into(),
            segment_seconds: 1,
            keep_segments: 15,
            stop_grace: crate::process::DEFAULT_STOP_GRACE,
        }
    }

    pub fn with_segment_seconds(mut self, secs: u64) -> Self {
        self.segment_seconds = secs.max(1);
        self
    }

    pub fn with_keep_segments(mut self, keep: usize) -> Self {
        self.keep_segments = keep;
        self
    }

    /// FFmpeg arguments for the segmenter.
    pub fn segmenter_command(&self) -> FfmpegCommand {
        let pattern = self.segments_dir.join(format!("%s.{}", SEGMENT_EXTENSION));
        let mut cmd = FfmpegCommand::new(self.source_uri.clone(), pattern)
            .no_overwrite()
            .log_level("warning");
        if self.source_uri.starts_with("rtsp://") || self.source_uri.starts_with("rtsps://") {
            cmd = cmd.rtsp_tcp();
        }
        cmd.no_audio()
            .video_codec("copy")
            .output_format("segment")
            .output_args([
                "-segment_time".to_string(),
                self.segment_seconds.to_string(),
                "-reset_timestamps".to_string(),
                "1".to_string(),
                "-strftime".to_string(),
                "1".to_string(),
            ])
    }
}

/// Outcome of a retention pass. Cleanup never fails; problems are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub kept: usize,
    pub removed: usize,
    /// Files that disappeared before we could delete them.
    pub vanished: usize,
    pub failed: usize,
}

/// Keeps one segmenter process alive for a camera.
#[derive(Debug)]
pub struct SegmentRecorder {
    config: RecorderConfig,
    process: OwnedProcess,
    starts: u64,
}

impl SegmentRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        let args = config.segmenter_command().build_args();
        let process = OwnedProcess::new("ffmpeg", args).with_grace(config.stop_grace);
        Self {
            config,
            process,
            starts: 0,
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.config.camera_id
    }

    pub fn segments_dir(&self) -> &Path {
        &self.config.segments_dir
    }

    /// Number of times a segmenter was spawned.
    pub fn start_count(&self) -> u64 {
        self.starts
    }

    /// Start the segmenter. No-op while it is running.
    pub async fn start(&mut self) -> MediaResult<()> {
        if self.process.is_running() {
            return Ok(());
        }
        check_ffmpeg()?;
        tokio::fs::create_dir_all(&self.config.segments_dir).await?;

        if self.process.start()? {
            self.starts += 1;
            info!(
                camera_id = %self.config.camera_id,
                dir = %self.config.segments_dir.display(),
                pid = ?self.process.pid(),
                "Segment recorder started"
            );
        }
        Ok(())
    }

    pub fn is_running(&mut self) -> bool {
        self.process.is_running()
    }

    pub async fn stop(&mut self) {
        self.process.stop().await;
        info!(camera_id = %self.config.camera_id, "Segment recorder stopped");
    }

    /// Delete the oldest segments beyond the retention count.
    pub async fn cleanup(&self) -> CleanupReport {
        prune_segments(&self.config.segments_dir, self.config.keep_segments).await
    }
}

/// Delete all but the newest `keep` segments in `dir`. Best-effort.
pub async fn prune_segments(dir: &Path, keep: usize) -> CleanupReport {
    let segments = match list_segments(dir).await {
        Ok(segments) => segments,
        Err(e) => {
            warn!(dir = %dir.display(), "Failed to list segments for cleanup: {}", e);
            return CleanupReport {
                failed: 1,
                ..Default::default()
            };
        }
    };

    let excess = segments.len().saturating_sub(keep);
    let mut report = CleanupReport {
        kept: segments.len() - excess,
        ..Default::default()
    };

    for segment in segments.into_iter().take(excess) {
        match tokio::fs::remove_file(&segment.path).await {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => report.vanished += 1,
            Err(e) => {
                debug!(path = %segment.path.display(), "Failed to remove segment: {}", e);
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_segmenter_command() {
        let config = RecorderConfig::new("cam-1", "rtsp://10.0.0.5/live", "/data/segments/cam-1");
        let args = config.segmenter_command().build_args();

        assert!(args.contains(&"tcp".to_string()));
        assert!(args.contains(&"segment".to_string()));
        assert!(args.contains(&"copy".to_string()));
        assert!(!args.contains(&"-y".to_string()));
        assert_eq!(args.last().unwrap(), "/data/segments/cam-1/%s.ts");
    }

    #[test]
    fn test_file_source_skips_rtsp_transport() {
        let config = RecorderConfig::new("cam-1", "/videos/sample.mp4", "/tmp/seg");
        let args = config.segmenter_command().build_args();
        assert!(!args.contains(&"-rtsp_transport".to_string()));
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for epoch in 100..120 {
            std::fs::write(dir.path().join(format!("{}.ts", epoch)), b"x").unwrap();
        }
        std::fs::write(dir.path().join("other.log"), b"x").unwrap();

        let report = prune_segments(dir.path(), 5).await;
        assert_eq!(report.removed, 15);
        assert_eq!(report.kept, 5);
        assert_eq!(report.failed, 0);

        let mut remaining: Vec<i64> = list_segments(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.start)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec![115, 116, 117, 118, 119]);
        assert!(dir.path().join("other.log").exists());
    }

    #[tokio::test]
    async fn test_prune_under_limit_is_noop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("1.ts"), b"x").unwrap();
        let report = prune_segments(dir.path(), 5).await;
        assert_eq!(report, CleanupReport { kept: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_prune_missing_dir_never_fails() {
        let dir = TempDir::new().unwrap();
        let report = prune_segments(&dir.path().join("gone"), 5).await;
        assert_eq!(report.removed, 0);
        assert_eq!(report.failed, 0);
    }
}
