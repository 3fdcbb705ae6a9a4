use std::path::{Path, PathBuf};
use std::collections::HashMap;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use log::debug;
use crate::error::{Error, Result};

/// Stream list as printed by `ffprobe -show_streams`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FFProbeStream {
    #[serde(default)]
    pub index: i32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

impl FFProbeStream {
    pub fn is_audio(&self) -> bool {
        self.codec_type.as_deref() == Some("audio")
    }

    /// Language tag, if the container carries one
    pub fn language(&self) -> Option<&str> {
        self.tags
            .as_ref()
            .and_then(|t| t.get("language"))
            .map(String::as_str)
    }
}

/// Number of audio-typed streams
pub fn audio_stream_count(streams: &[FFProbeStream]) -> usize {
    streams.iter().filter(|s| s.is_audio()).count()
}

/// Lists the streams of a media file
#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn streams(&self, path: &Path) -> Result<Vec<FFProbeStream>>;
}

/// `StreamProbe` backed by the ffprobe binary
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_bin: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self { ffprobe_bin: ffprobe_bin.into() }
    }

    fn build_args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl StreamProbe for FfprobeProbe {
    async fn streams(&self, path: &Path) -> Result<Vec<FFProbeStream>> {
        if !path.exists() {
            return Err(Error::probe(path, "file does not exist"));
        }

        let args = Self::build_args(path);
        debug!("Executing FFprobe: {} {}", self.ffprobe_bin.display(), args.join(" "));

        let output = Command::new(&self.ffprobe_bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::probe(path, format!("failed to run {}: {}", self.ffprobe_bin.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::probe(
                path,
                format!("ffprobe exited with code {}: {}", output.status.code().unwrap_or(-1), stderr.trim()),
            ));
        }

        parse_streams(&output.stdout).map_err(|e| Error::probe(path, format!("invalid ffprobe JSON: {}", e)))
    }
}

/// Parse ffprobe JSON into its stream list
pub fn parse_streams(json: &[u8]) -> std::result::Result<Vec<FFProbeStream>, serde_json::Error> {
    let data: FFProbeData = serde_json::from_slice(json)?;
    Ok(data.streams)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "tags": {"language": "eng"}},
            {"index": 2, "codec_type": "audio", "codec_name": "ac3", "tags": {"language": "spa"}},
            {"index": 3, "codec_type": "subtitle", "codec_name": "subrip"}
        ]
    }"#;

    #[test]
    fn test_parse_and_count_audio() {
        let streams = parse_streams(SAMPLE.as_bytes()).unwrap();
        assert_eq!(streams.len(), 4);
        assert_eq!(audio_stream_count(&streams), 2);
        assert_eq!(streams[1].language(), Some("eng"));
        assert_eq!(streams[2].language(), Some("spa"));
        assert_eq!(streams[0].language(), None);
    }

    #[test]
    fn test_missing_streams_key_is_empty() {
        let streams = parse_streams(b"{}").unwrap();
        assert!(streams.is_empty());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_streams(b"not json").is_err());
    }

    #[test]
    fn test_args_end_with_path() {
        let args = FfprobeProbe::build_args(Path::new("/m/a b.mkv"));
        assert_eq!(args.last().map(String::as_str), Some("/m/a b.mkv"));
        assert!(args.contains(&"-show_streams".to_string()));
    }

    #[tokio::test]
    async fn test_missing_file_is_probe_error() {
        let probe = FfprobeProbe::new("ffprobe");
        let err = probe.streams(Path::new("/nonexistent/out.mkv")).await.unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
    }
}
