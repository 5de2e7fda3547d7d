//! Clip assembly from recorded segments.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use vigil_models::metric_names;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::segments::SegmentFile;

/// Turns an ordered list of segments into one playable clip.
#[async_trait]
pub trait ClipEncoder: Send + Sync {
    async fn encode(&self, segments: &[SegmentFile], output: &Path) -> MediaResult<()>;
}

/// Concat demuxer into a full H.264 re-encode.
///
/// Segments are re-encoded rather than stream-copied so timestamp and codec
/// discontinuities between segments never produce an undecodable file.
#[derive(Debug, Clone)]
pub struct FfmpegClipEncoder {
    pub preset: String,
    pub crf: u8,
    pub timeout_secs: u64,
}

impl Default for FfmpegClipEncoder {
    fn default() -> Self {
        Self {
            preset: "veryfast".to_string(),
            crf: 23,
            timeout_secs: 120,
        }
    }
}

impl FfmpegClipEncoder {
    pub fn command(&self, list_file: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(list_file.to_string_lossy().to_string(), output)
            .input_format("concat")
            .input_args(["-safe", "0"])
            .no_audio()
            .video_codec("libx264")
            .preset(self.preset.clone())
            .crf(self.crf)
            .pixel_format("yuv420p")
            .output_args(["-movflags", "+faststart"])
    }
}

/// Body of an FFmpeg concat list.
pub fn concat_list(segments: &[SegmentFile]) -> String {
    segments
        .iter()
        .map(|s| {
            let path = s.path.to_string_lossy().replace('\'', "'\\''");
            format!("file '{}'\n", path)
        })
        .collect()
}

#[async_trait]
impl ClipEncoder for FfmpegClipEncoder {
    async fn encode(&self, segments: &[SegmentFile], output: &Path) -> MediaResult<()> {
        if segments.is_empty() {
            return Err(MediaError::NoSegments);
        }

        let work_dir = tempfile::Builder::new().prefix("vigil-concat-").tempdir()?;
        let list_file = work_dir.path().join("list.txt");
        tokio::fs::write(&list_file, concat_list(segments)).await?;

        let cmd = self.command(&list_file, output);
        debug!(segments = segments.len(), output = %output.display(), "Encoding clip");

        let started = Instant::now();
        FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run(&cmd)
            .await?;

        info!(
            segments = segments.len(),
            output = %output.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Clip encoded"
        );
        metrics::histogram!(metric_names::CLIP_ENCODE_SECONDS).record(started.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_concat_list_quotes_paths() {
        let segments = vec![
            SegmentFile { start: 1, path: PathBuf::from("/data/cam/1.ts") },
            SegmentFile { start: 2, path: PathBuf::from("/data/it's/2.ts") },
        ];
        assert_eq!(
            concat_list(&segments),
            "file '/data/cam/1.ts'\nfile '/data/it'\\''s/2.ts'\n"
        );
    }

    #[test]
    fn test_encode_command_reencodes() {
        let encoder = FfmpegClipEncoder::default();
        let args = encoder
            .command(Path::new("/tmp/list.txt"), Path::new("/clips/out.mp4"))
            .build_args();

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_pos - 3], "concat");
        assert_eq!(&args[input_pos - 2..input_pos], &["-safe".to_string(), "0".to_string()]);
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(!args.contains(&"copy".to_string()));
    }

    #[tokio::test]
    async fn test_encode_rejects_empty_input() {
        let encoder = FfmpegClipEncoder::default();
        let result = encoder.encode(&[], Path::new("/tmp/never.mp4")).await;
        assert!(matches!(result, Err(MediaError::NoSegments)));
    }
}
