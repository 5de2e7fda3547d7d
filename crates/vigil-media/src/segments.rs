//! Time-addressable segment files and clip window selection.
//!
//! The recorder names every segment `<epoch seconds>.ts` after the UTC
//! instant it starts at, so a segment's coverage is derivable from its
//! name alone.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MediaResult;

/// File extension of recorded segments.
pub const SEGMENT_EXTENSION: &str = "ts";

/// One recorded segment on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentFile {
    /// Start instant in UTC epoch seconds.
    pub start: i64,
    pub path: PathBuf,
}

impl SegmentFile {
    /// Parse a path of the form `<epoch>.ts`.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
            return None;
        }
        let start = path.file_stem()?.to_str()?.parse::<i64>().ok()?;
        Some(Self { start, path })
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.start, 0).single()
    }

    /// Whether `[start, start + len)` intersects the closed range `[lo, hi]`.
    pub fn overlaps(&self, lo: i64, hi: i64, segment_seconds: i64) -> bool {
        self.start <= hi && self.start + segment_seconds > lo
    }
}

/// Path of the segment starting at `start`.
pub fn segment_path(dir: &Path, start: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}.{}", start.timestamp(), SEGMENT_EXTENSION))
}

/// List every segment in `dir`, oldest first.
///
/// A missing directory yields an empty list.
pub async fn list_segments(dir: &Path) -> MediaResult<Vec<SegmentFile>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut segments = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(segment) = SegmentFile::from_path(entry.path()) {
            segments.push(segment);
        }
    }
    segments.sort();
    Ok(segments)
}

/// Segments whose coverage intersects `[start - margin, end + margin]`, in time order.
///
/// Stateless: callers retry when the newest segments have not been flushed yet.
pub async fn select_segments(
    dir: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    margin: Duration,
    segment_seconds: u64,
) -> MediaResult<Vec<SegmentFile>> {
    let lo = (start - margin).timestamp();
    let hi = (end + margin).timestamp();
    let segment_seconds = segment_seconds.max(1) as i64;

    let selected: Vec<SegmentFile> = list_segments(dir)
        .await?
        .into_iter()
        .filter(|s| s.overlaps(lo, hi, segment_seconds))
        .collect();

    debug!(
        dir = %dir.display(),
        lo,
        hi,
        count = selected.len(),
        "Selected segments"
    );
    Ok(selected)
}
