//! Frame sessions over live media sources.
//!
//! A [`SourceConnector`] opens a [`MediaSession`] for a URI. The FFmpeg
//! implementation decodes the source to packed BGR24 on stdout and reads
//! one frame at a time.

use async_trait::async_trait;
use chrono::Utc;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use vigil_models::Frame;

use crate::command::{check_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

/// An open, read-capable session on one source.
#[async_trait]
pub trait MediaSession: Send {
    /// Read the next frame.
    async fn read_frame(&mut self) -> MediaResult<Frame>;

    /// Whether the underlying transport is still open.
    fn is_open(&mut self) -> bool;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens sessions. Ordinary connectivity failures are returned as errors.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn open(&self, uri: &str) -> MediaResult<Box<dyn MediaSession>>;
}

/// Decode settings for FFmpeg frame sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Time allowed for the first frame to arrive.
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 15,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    pub fn reader_command(&self, uri: &str) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(uri, "-").log_level("error");
        if uri.starts_with("rtsp://") || uri.starts_with("rtsps://") {
            cmd = cmd
                .rtsp_tcp()
                .input_arg("-timeout")
                .input_arg(self.connect_timeout.as_micros().to_string());
        } else {
            // Files are paced to real time like a live source.
            cmd = cmd.input_arg("-re");
        }
        cmd.input_args(["-fflags", "nobuffer"])
            .no_audio()
            .video_filter(format!(
                "fps={},scale={}:{}",
                self.fps, self.width, self.height
            ))
            .pixel_format("bgr24")
            .output_format("rawvideo")
    }
}

/// Opens [`FfmpegSession`]s.
#[derive(Debug, Clone, Default)]
pub struct FfmpegConnector {
    config: SessionConfig,
}

impl FfmpegConnector {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceConnector for FfmpegConnector {
    async fn open(&self, uri: &str) -> MediaResult<Box<dyn MediaSession>> {
        check_ffmpeg()?;

        let args = self.config.reader_command(uri).build_args();
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;

        let mut session = FfmpegSession {
            child: Some(child),
            stdout: Some(stdout),
            width: self.config.width,
            height: self.config.height,
            read_timeout: self.config.read_timeout,
            pending: None,
        };

        // A connection only counts once a frame has actually been decoded.
        match tokio::time::timeout(self.config.connect_timeout, session.read_raw()).await {
            Ok(Ok(frame)) => {
                session.pending = Some(frame);
                debug!(uri, "Source opened");
                Ok(Box::new(session))
            }
            Ok(Err(e)) => {
                session.close().await;
                Err(MediaError::connect_failed(uri, e.to_string()))
            }
            Err(_) => {
                session.close().await;
                Err(MediaError::connect_failed(
                    uri,
                    format!("no frame within {:?}", self.config.connect_timeout),
                ))
            }
        }
    }
}

/// Frame session backed by an FFmpeg child process.
pub struct FfmpegSession {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
    read_timeout: Duration,
    /// Frame read while validating the connection.
    pending: Option<Frame>,
}

impl FfmpegSession {
    async fn read_raw(&mut self) -> MediaResult<Frame> {
        let stdout = self.stdout.as_mut().ok_or(MediaError::SessionClosed)?;
        let mut buf = vec![0u8; Frame::byte_len(self.width, self.height)];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => Ok(Frame::new(buf, self.width, self.height, Utc::now())),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(MediaError::StreamEnded),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MediaSession for FfmpegSession {
    async fn read_frame(&mut self) -> MediaResult<Frame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        let read_timeout = self.read_timeout;
        match tokio::time::timeout(read_timeout, self.read_raw()).await {
            Ok(result) => result,
            Err(_) => Err(MediaError::Timeout(read_timeout.as_secs())),
        }
    }

    fn is_open(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    async fn close(&mut self) {
        self.stdout = None;
        self.pending = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill frame reader: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_command_rtsp() {
        let config = SessionConfig::default();
        let args = config.reader_command("rtsp://10.0.0.5/live").build_args();

        assert!(args.contains(&"tcp".to_string()));
        assert!(args.contains(&"5000000".to_string()));
        assert!(args.contains(&"fps=15,scale=1280:720".to_string()));
        assert!(args.contains(&"bgr24".to_string()));
        assert!(args.contains(&"rawvideo".to_string()));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_reader_command_file() {
        let args = SessionConfig::default()
            .reader_command("/videos/lobby.mp4")
            .build_args();
        assert!(!args.contains(&"-rtsp_transport".to_string()));
        assert!(args.contains(&"-re".to_string()));
    }
}
