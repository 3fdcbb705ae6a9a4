use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;
use log::{debug, info};
use crate::config::MergeConfig;
use crate::error::Result;

/// Captured result of one external tool run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last few stderr lines, enough to explain a failure in a result message
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Stream-copy operations the pipeline needs from a media tool
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Copy every stream of `input` into a new container at `output`
    async fn remux(&self, input: &Path, output: &Path) -> Result<ToolOutput>;

    /// Video and audio from `vo`, audio from `es`, tagged eng/spa, into `output`
    async fn mux_dubbed_audio(&self, vo: &Path, es: &Path, output: &Path) -> Result<ToolOutput>;
}

/// `Muxer` backed by the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    ffmpeg_bin: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self { ffmpeg_bin: ffmpeg_bin.into() }
    }

    async fn execute(&self, args: Vec<String>) -> Result<ToolOutput> {
        debug!("Executing FFmpeg: {} {}", self.ffmpeg_bin.display(), args.join(" "));

        let output = Command::new(&self.ffmpeg_bin).args(&args).output().await?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn remux(&self, input: &Path, output: &Path) -> Result<ToolOutput> {
        self.execute(CommandBuilder::remux(input, output)).await
    }

    async fn mux_dubbed_audio(&self, vo: &Path, es: &Path, output: &Path) -> Result<ToolOutput> {
        self.execute(CommandBuilder::mux_dubbed_audio(vo, es, output)).await
    }
}

/// Builds ffmpeg argument lists; `-n` makes ffmpeg refuse to overwrite an existing output
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn remux(input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-n".into()];
        args.push("-i".into());
        args.push(path_arg(input));
        args.extend(["-map", "0", "-c", "copy"].map(String::from));
        args.push(path_arg(output));
        args
    }

    pub fn mux_dubbed_audio(vo: &Path, es: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-n".into()];

        // Step 1: Inputs, original first
        args.push("-i".into());
        args.push(path_arg(vo));
        args.push("-i".into());
        args.push(path_arg(es));

        // Step 2: Stream selection
        args.extend(["-map", "0:v", "-map", "0:a", "-map", "1:a"].map(String::from));

        // Step 3: Copy everything, no re-encoding
        args.extend(["-c", "copy"].map(String::from));

        // Step 4: Language tags on the output audio streams
        args.extend(["-metadata:s:a:0", "language=eng", "-metadata:s:a:1", "language=spa"].map(String::from));

        args.push(path_arg(output));
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// FFmpeg version information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FFmpegVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FFmpegVersion {
    /// Parse version from the first line of `-version` output
    /// Example: "ffmpeg version 6.1.1-3ubuntu5" -> 6.1.1
    pub fn parse(version_str: &str) -> anyhow::Result<Self> {
        let version_part = version_str
            .split_whitespace()
            .find(|s| s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
            .ok_or_else(|| anyhow!("No version number found in: {}", version_str))?;

        let mut numbers = version_part
            .split(|c: char| !c.is_ascii_digit())
            .take_while(|p| !p.is_empty());

        let major = numbers
            .next()
            .ok_or_else(|| anyhow!("Invalid version format: {}", version_str))?
            .parse::<u32>()
            .with_context(|| format!("Failed to parse major version from: {}", version_part))?;
        let minor = numbers.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let patch = numbers.next().and_then(|p| p.parse().ok()).unwrap_or(0);

        Ok(FFmpegVersion { major, minor, patch })
    }
}

impl std::fmt::Display for FFmpegVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Detected ffmpeg/ffprobe installation
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub ffmpeg_version: FFmpegVersion,
    pub ffprobe_version: FFmpegVersion,
}

impl FfmpegTools {
    /// Check that both configured tools run and report a version
    pub async fn detect(cfg: &MergeConfig) -> anyhow::Result<Self> {
        let ffmpeg_version = detect_version(&cfg.ffmpeg_bin).await?;
        let ffprobe_version = detect_version(&cfg.ffprobe_bin).await?;

        info!(
            "🎬 Using ffmpeg {} ({}) and ffprobe {} ({})",
            ffmpeg_version,
            cfg.ffmpeg_bin.display(),
            ffprobe_version,
            cfg.ffprobe_bin.display()
        );

        Ok(Self {
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
            ffprobe_bin: cfg.ffprobe_bin.clone(),
            ffmpeg_version,
            ffprobe_version,
        })
    }
}

async fn detect_version(bin: &Path) -> anyhow::Result<FFmpegVersion> {
    let output = Command::new(bin)
        .arg("-version")
        .output()
        .await
        .with_context(|| format!("Failed to execute {}. Ensure it is installed and on PATH.", bin.display()))?;

    if !output.status.success() {
        anyhow::bail!("{} -version exited with code {}", bin.display(), output.status.code().unwrap_or(-1));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout
        .lines()
        .next()
        .ok_or_else(|| anyhow!("Empty output from {} -version", bin.display()))?;

    FFmpegVersion::parse(first_line)
}
