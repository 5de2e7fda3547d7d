//! Filesystem helpers for publishing finished clips.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Move `src` to `dst`, creating `dst`'s parent if missing.
///
/// Scratch directories usually live on a different filesystem than the
/// clips directory, so a failed rename with EXDEV falls back to copying
/// into a sibling `.part` file and renaming that into place. `dst` never
/// holds a partially written clip.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !fs::try_exists(src).await? {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(src = %src.display(), dst = %dst.display(), "Cross-device move, copying");
            copy_into_place(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
}

async fn copy_into_place(src: &Path, dst: &Path) -> MediaResult<()> {
    let part = dst.with_extension("part");

    if let Err(e) = fs::copy(src, &part).await {
        let _ = fs::remove_file(&part).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&part, dst).await {
        let _ = fs::remove_file(&part).await;
        return Err(e.into());
    }
    if let Err(e) = fs::remove_file(src).await {
        warn!(src = %src.display(), "Failed to remove source after copy: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("scratch.mp4");
        let dst = dir.path().join("clips").join("cam-1").join("final.mp4");
        fs::write(&src, b"clip").await.unwrap();

        tokio_test::assert_ok!(move_file(&src, &dst).await);

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"clip");
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = move_file(dir.path().join("nope.mp4"), dir.path().join("out.mp4")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }

    #[test]
    fn test_cross_device_detection() {
        assert!(is_cross_device(&std::io::Error::from_raw_os_error(
            nix::errno::Errno::EXDEV as i32
        )));
        assert!(!is_cross_device(&std::io::Error::from_raw_os_error(
            nix::errno::Errno::ENOENT as i32
        )));
    }
}
