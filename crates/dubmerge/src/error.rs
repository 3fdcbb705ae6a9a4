use std::path::PathBuf;

/// Result type alias using the library error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while pairing, merging and cleaning up media files
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable search root or no pairs were supplied
    #[error("no valid paths within the media root")]
    NoValidPaths,

    /// Container normalization failed
    #[error("conversion failed for {}: {message}", path.display())]
    Conversion { path: PathBuf, message: String },

    /// Muxing the dubbed audio track failed
    #[error("merge failed for {}: {message}", path.display())]
    Merge { path: PathBuf, message: String },

    /// The stream-inspection tool could not be run or its output parsed
    #[error("probe failed for {}: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    /// Merged output does not carry both audio tracks
    #[error("validation failed: {} has only {audio_streams} audio stream(s)", path.display())]
    ValidationFailed { path: PathBuf, audio_streams: usize },

    /// Path lies outside the authorized media root
    #[error("path {} is outside the media root {}", path.display(), root.display())]
    SandboxViolation { path: PathBuf, root: PathBuf },

    /// Deleting a source file after validation failed
    #[error("failed to delete {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A series or season filter could not be compiled
    #[error("invalid search filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn conversion(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn merge(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Merge {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }
}
