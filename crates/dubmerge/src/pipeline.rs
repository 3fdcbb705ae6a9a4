use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use log::{error, info};
use crate::config::MergeConfig;
use crate::error::Result;
use crate::ffmpeg::{FfmpegMuxer, Muxer};
use crate::ffprobe::{FfprobeProbe, StreamProbe};
use crate::pairing::MatchedPair;
use crate::{merge, normalize, validate};

/// Outcome of running one pair through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub vo_path: PathBuf,
    pub es_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub success: bool,
    pub message: String,
}

impl MergeResult {
    pub fn failed(pair: &MatchedPair, output_path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            vo_path: pair.vo_path.clone(),
            es_path: pair.es_path.clone(),
            output_path,
            success: false,
            message: message.into(),
        }
    }
}

/// Normalize, merge and finalize, wired to a muxer and a stream probe
#[derive(Clone)]
pub struct Pipeline {
    muxer: Arc<dyn Muxer>,
    probe: Arc<dyn StreamProbe>,
}

impl Pipeline {
    pub fn new(muxer: Arc<dyn Muxer>, probe: Arc<dyn StreamProbe>) -> Self {
        Self { muxer, probe }
    }

    /// Pipeline using the ffmpeg/ffprobe binaries from the configuration
    pub fn from_config(cfg: &MergeConfig) -> Self {
        Self::new(
            Arc::new(FfmpegMuxer::new(&cfg.ffmpeg_bin)),
            Arc::new(FfprobeProbe::new(&cfg.ffprobe_bin)),
        )
    }

    pub async fn normalize(&self, path: &Path) -> Result<PathBuf> {
        normalize::normalize(self.muxer.as_ref(), path).await
    }

    pub async fn merge(&self, vo_mkv: &Path, es_mkv: &Path, destination: Option<&Path>) -> Result<PathBuf> {
        merge::merge(self.muxer.as_ref(), vo_mkv, es_mkv, destination).await
    }

    pub async fn finalize(&self, output: &Path, es_path: &Path, vo_path: Option<&Path>) -> Result<()> {
        validate::finalize(self.probe.as_ref(), output, es_path, vo_path).await
    }

    /// Run one pair end to end; failures are captured in the returned result
    pub async fn process_pair(&self, pair: &MatchedPair, destination: Option<&Path>) -> MergeResult {
        let mut output = None;
        match self.run_stages(pair, destination, &mut output).await {
            Ok(()) => {
                let merged = output.clone().unwrap_or_default();
                info!("✅ {}: merged into {}", pair.key, merged.display());
                MergeResult {
                    vo_path: pair.vo_path.clone(),
                    es_path: pair.es_path.clone(),
                    message: format!("Merged into {}", merged.display()),
                    output_path: output,
                    success: true,
                }
            }
            Err(e) => {
                error!("❌ {}: {}", pair.key, e);
                MergeResult::failed(pair, output, e.to_string())
            }
        }
    }

    async fn run_stages(
        &self,
        pair: &MatchedPair,
        destination: Option<&Path>,
        output: &mut Option<PathBuf>,
    ) -> Result<()> {
        // Step 1: Container normalization
        let vo_mkv = self.normalize(&pair.vo_path).await?;
        let es_mkv = self.normalize(&pair.es_path).await?;

        // Step 2: Merge
        let merged = self.merge(&vo_mkv, &es_mkv, destination).await?;
        *output = Some(merged.clone());

        // Step 3: Validate, then delete sources
        self.finalize(&merged, &pair.es_path, Some(&pair.vo_path)).await?;

        // Step 4: Conversion leftovers
        let intermediates: Vec<&Path> = [vo_mkv.as_path(), es_mkv.as_path()]
            .into_iter()
            .filter(|p| *p != pair.vo_path && *p != pair.es_path)
            .collect();
        validate::discard_intermediates(&intermediates, &merged);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{touch, FakeMuxer, FakeProbe};

    fn pipeline(muxer: FakeMuxer, audio: usize) -> (Pipeline, Arc<FakeMuxer>) {
        let muxer = Arc::new(muxer);
        let p = Pipeline::new(muxer.clone(), Arc::new(FakeProbe::with_audio(audio)));
        (p, muxer)
    }

    fn pair(key: &str, vo: PathBuf, es: PathBuf) -> MatchedPair {
        MatchedPair { key: key.to_string(), vo_path: vo, es_path: es }
    }

    #[tokio::test]
    async fn test_episode_pair_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let vo = touch(dir.path(), "Show.S01E02.en.mkv");
        let es = touch(dir.path(), "Show.S01E02.es.mkv");
        let (p, muxer) = pipeline(FakeMuxer::new(), 2);

        let result = p.process_pair(&pair("S01E02", vo.clone(), es.clone()), None).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.output_path, Some(dir.path().join("Show.S01E02.en.es.mkv")));
        assert!(!vo.exists());
        assert!(!es.exists());
        assert_eq!(muxer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_avi_source_is_converted_and_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let vo = touch(dir.path(), "Movie (2020).vo.avi");
        let es = touch(dir.path(), "Movie.2020.es.mkv");
        let (p, muxer) = pipeline(FakeMuxer::new(), 2);

        let result = p.process_pair(&pair("Movie (2020).vo", vo.clone(), es.clone()), None).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.output_path, Some(dir.path().join("Movie (2020).vo.en.es.mkv")));
        assert!(!vo.exists());
        assert!(!es.exists());
        assert!(!dir.path().join("Movie (2020).vo.mkv").exists());
        assert_eq!(muxer.calls()[0], format!("remux {}", vo.display()));
    }

    #[tokio::test]
    async fn test_single_audio_stream_keeps_sources() {
        let dir = tempfile::tempdir().unwrap();
        let vo = touch(dir.path(), "Show.S01E02.en.mkv");
        let es = touch(dir.path(), "Show.S01E02.es.mkv");
        let (p, _) = pipeline(FakeMuxer::new(), 1);

        let result = p.process_pair(&pair("S01E02", vo.clone(), es.clone()), None).await;
        assert!(!result.success);
        assert!(result.message.contains("1 audio stream"));
        assert!(result.output_path.is_some());
        assert!(vo.exists() && es.exists());
    }

    #[tokio::test]
    async fn test_conversion_failure_stops_before_merge() {
        let dir = tempfile::tempdir().unwrap();
        let vo = touch(dir.path(), "a.en.mp4");
        let es = touch(dir.path(), "a.es.mkv");
        let (p, muxer) = pipeline(FakeMuxer { fail_remux: true, ..Default::default() }, 2);

        let result = p.process_pair(&pair("a", vo.clone(), es.clone()), None).await;
        assert!(!result.success);
        assert!(result.message.starts_with("conversion failed"));
        assert!(result.output_path.is_none());
        assert_eq!(muxer.calls().len(), 1);
        assert!(vo.exists() && es.exists());
    }

    #[tokio::test]
    async fn test_destination_directory() {
        let dir = tempfile::tempdir().unwrap();
        let vo = touch(dir.path(), "TV/Show.S01E02.en.mkv");
        let es = touch(dir.path(), "TV/Show.S01E02.es.mkv");
        let dest = dir.path().join("Merged");
        let (p, _) = pipeline(FakeMuxer::new(), 2);

        let result = p.process_pair(&pair("S01E02", vo, es), Some(&dest)).await;
        assert!(result.success);
        assert!(dest.join("Show.S01E02.en.es.mkv").exists());
    }
}
