use std::path::{Path, PathBuf};
use async_trait::async_trait;
use parking_lot::Mutex;
use crate::error::{Error, Result};
use crate::ffmpeg::{Muxer, ToolOutput};
use crate::ffprobe::{FFProbeStream, StreamProbe};

/// Deterministic stand-in for ffmpeg: writes small files instead of muxing
#[derive(Default)]
pub struct FakeMuxer {
    pub fail_remux: bool,
    pub fail_mux: bool,
    /// Exit 0 but leave a zero-length output behind
    pub empty_output: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn write_output(&self, output: &Path, body: &[u8], fail: bool) -> Result<ToolOutput> {
        if output.exists() {
            return Ok(failed(format!("File '{}' already exists. Exiting.", output.display())));
        }
        if fail {
            std::fs::write(output, b"partial")?;
            return Ok(failed("Conversion failed!".to_string()));
        }
        let body: &[u8] = if self.empty_output { b"" } else { body };
        std::fs::write(output, body)?;
        Ok(ToolOutput { exit_code: Some(0), ..Default::default() })
    }
}

fn failed(stderr: String) -> ToolOutput {
    ToolOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr,
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    async fn remux(&self, input: &Path, output: &Path) -> Result<ToolOutput> {
        self.calls.lock().push(format!("remux {}", input.display()));
        if !input.exists() {
            return Ok(failed(format!("{}: No such file or directory", input.display())));
        }
        self.write_output(output, b"remuxed", self.fail_remux)
    }

    async fn mux_dubbed_audio(&self, vo: &Path, es: &Path, output: &Path) -> Result<ToolOutput> {
        self.calls.lock().push(format!("mux {} {}", vo.display(), es.display()));
        self.write_output(output, b"merged", self.fail_mux)
    }
}

/// Reports one video stream and a fixed number of audio streams for any existing file
pub struct FakeProbe {
    pub audio_streams: usize,
    pub fail: bool,
}

impl FakeProbe {
    pub fn with_audio(audio_streams: usize) -> Self {
        Self { audio_streams, fail: false }
    }
}

#[async_trait]
impl StreamProbe for FakeProbe {
    async fn streams(&self, path: &Path) -> Result<Vec<FFProbeStream>> {
        if self.fail || !path.exists() {
            return Err(Error::probe(path, "fake probe failure"));
        }
        let mut streams = vec![FFProbeStream {
            index: 0,
            codec_type: Some("video".to_string()),
            ..Default::default()
        }];
        for i in 0..self.audio_streams {
            streams.push(FFProbeStream {
                index: i as i32 + 1,
                codec_type: Some("audio".to_string()),
                ..Default::default()
            });
        }
        Ok(streams)
    }
}

/// Create a small file (and its parents) under `root`
pub fn touch(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"media").unwrap();
    path
}
