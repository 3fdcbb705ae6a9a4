pub mod config;
pub mod error;
pub mod sandbox;
pub mod classifier;
pub mod scan;
pub mod pairing;
pub mod ffmpeg;
pub mod ffprobe;
pub mod normalize;
pub mod merge;
pub mod validate;
pub mod pipeline;
pub mod job;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use config::MergeConfig;
pub use error::{Error, Result};
pub use sandbox::Sandbox;
pub use classifier::{EpisodeKey, LanguageRole, MediaFile};
pub use pairing::{MatchedPair, PairingOptions};
pub use ffmpeg::{FfmpegMuxer, FfmpegTools, Muxer, ToolOutput};
pub use ffprobe::{FFProbeStream, FfprobeProbe, StreamProbe};
pub use pipeline::{MergeResult, Pipeline};
pub use job::{InMemoryJobStore, Job, JobMode, JobStatus, JobStore};
pub use runner::{JobRunner, SubmittedJob};
