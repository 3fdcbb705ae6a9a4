use std::path::{Path, PathBuf};
use log::{debug, info};
use crate::error::{Error, Result};
use crate::ffmpeg::Muxer;

/// True when the path already has an `.mkv` extension (any case)
pub fn is_mkv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mkv"))
        .unwrap_or(false)
}

/// Make sure the file is in a Matroska container, remuxing into a sibling `.mkv` if needed
///
/// On failure the partial output, if any, stays on disk for inspection.
pub async fn normalize(muxer: &dyn Muxer, path: &Path) -> Result<PathBuf> {
    if is_mkv(path) {
        debug!("Already MKV: {}", path.display());
        return Ok(path.to_path_buf());
    }

    if !path.exists() {
        return Err(Error::conversion(path, "source file does not exist"));
    }

    let output = path.with_extension("mkv");
    info!("Converting {} to MKV", path.display());

    let result = muxer
        .remux(path, &output)
        .await
        .map_err(|e| Error::conversion(path, format!("could not run remux: {}", e)))?;

    if !result.success() {
        return Err(Error::conversion(
            path,
            format!(
                "remux exited with code {}: {}",
                result.exit_code.unwrap_or(-1),
                result.stderr_tail(3)
            ),
        ));
    }

    match std::fs::metadata(&output) {
        Ok(meta) if meta.len() > 0 => {
            info!("✅ Converted to {}", output.display());
            Ok(output)
        }
        Ok(_) => Err(Error::conversion(path, format!("output {} is empty", output.display()))),
        Err(_) => Err(Error::conversion(path, format!("output {} was not created", output.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{touch, FakeMuxer};

    #[tokio::test]
    async fn test_mkv_is_returned_without_io() {
        let muxer = FakeMuxer::new();
        let path = Path::new("/nonexistent/Show.S01E02.en.MKV");
        let out = normalize(&muxer, path).await.unwrap();
        assert_eq!(out, path);
        assert!(muxer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_avi_is_remuxed_to_sibling_mkv() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "Movie (2020).vo.avi");
        let muxer = FakeMuxer::new();

        let out = normalize(&muxer, &src).await.unwrap();
        assert_eq!(out, dir.path().join("Movie (2020).vo.mkv"));
        assert!(out.exists());
        assert!(src.exists());
        assert_eq!(muxer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let muxer = FakeMuxer::new();
        let err = normalize(&muxer, Path::new("/nonexistent/a.mp4")).await.unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        assert!(muxer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.mp4");
        let muxer = FakeMuxer { fail_remux: true, ..Default::default() };

        let err = normalize(&muxer, &src).await.unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        assert!(err.to_string().contains("exited with code 1"));
        assert!(dir.path().join("a.mkv").exists());
    }

    #[tokio::test]
    async fn test_empty_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.mp4");
        let muxer = FakeMuxer { empty_output: true, ..Default::default() };

        let err = normalize(&muxer, &src).await.unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[tokio::test]
    async fn test_existing_target_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.mp4");
        std::fs::write(dir.path().join("a.mkv"), b"keep me").unwrap();
        let muxer = FakeMuxer::new();

        assert!(normalize(&muxer, &src).await.is_err());
        assert_eq!(std::fs::read(dir.path().join("a.mkv")).unwrap(), b"keep me");
    }
}
