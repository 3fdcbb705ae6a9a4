use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the dubbed-audio merger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Authorized media root; every touched path must live below it
    pub media_root: PathBuf,
    /// Path to ffmpeg binary (stream copy and muxing)
    pub ffmpeg_bin: PathBuf,
    /// Path to ffprobe binary (stream inspection)
    pub ffprobe_bin: PathBuf,
    /// Default output directory for merged files (None = next to the VO file)
    pub destination: Option<PathBuf>,
    /// Minimum similarity between VO and ES group keys (exclusive)
    pub group_similarity_threshold: f64,
    /// Minimum similarity between VO and ES file names (exclusive)
    pub file_similarity_threshold: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl MergeConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            media_root: PathBuf::from("/mnt/nfs/media"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            destination: None,
            group_similarity_threshold: 0.6,
            file_similarity_threshold: 0.5,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// Override fields from MEDIA_ROOT, FFMPEG_BIN and FFPROBE_BIN when set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = non_empty("MEDIA_ROOT") {
            self.media_root = PathBuf::from(root);
        }
        if let Some(bin) = non_empty("FFMPEG_BIN") {
            self.ffmpeg_bin = PathBuf::from(bin);
        }
        if let Some(bin) = non_empty("FFPROBE_BIN") {
            self.ffprobe_bin = PathBuf::from(bin);
        }
    }

    /// Reject configurations the pairing engine and sandbox cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.media_root.is_absolute() {
            anyhow::bail!("media_root must be an absolute path: {}", self.media_root.display());
        }
        for (name, value) in [
            ("group_similarity_threshold", self.group_similarity_threshold),
            ("file_similarity_threshold", self.file_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = MergeConfig::load_config(Some(Path::new("/nonexistent/dubmerge.toml"))).unwrap();
        assert_eq!(cfg.media_root, PathBuf::from("/mnt/nfs/media"));
        assert_eq!(cfg.group_similarity_threshold, 0.6);
        assert_eq!(cfg.file_similarity_threshold, 0.5);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dubmerge.toml");
        std::fs::write(&path, "media_root = \"/srv/media\"\nffmpeg_bin = \"/opt/ffmpeg\"\n").unwrap();

        let cfg = MergeConfig::load_config(Some(&path)).unwrap();
        assert_eq!(cfg.media_root, PathBuf::from("/srv/media"));
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(cfg.ffprobe_bin, PathBuf::from("ffprobe"));
        assert!(cfg.destination.is_none());
    }

    #[test]
    fn test_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dubmerge.json");
        std::fs::write(&path, r#"{"destination": "/srv/media/merged", "file_similarity_threshold": 0.7}"#).unwrap();

        let cfg = MergeConfig::load_config(Some(&path)).unwrap();
        assert_eq!(cfg.destination, Some(PathBuf::from("/srv/media/merged")));
        assert_eq!(cfg.file_similarity_threshold, 0.7);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "media_root = [").unwrap();

        let err = MergeConfig::load_config(Some(&path)).unwrap_err();
        assert!(format!("{}", err).contains("broken.toml"));
    }

    #[test]
    fn test_env_overrides_ignore_empty_values() {
        let env: HashMap<&str, &str> = [("MEDIA_ROOT", "/data/media"), ("FFMPEG_BIN", "  ")]
            .into_iter()
            .collect();
        let mut cfg = MergeConfig::default_config();
        cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.media_root, PathBuf::from("/data/media"));
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_validate_thresholds_and_root() {
        assert!(MergeConfig::default_config().validate().is_ok());

        let cfg = MergeConfig { group_similarity_threshold: 1.5, ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = MergeConfig { media_root: PathBuf::from("media"), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
