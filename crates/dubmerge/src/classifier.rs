use std::fmt;
use std::path::{Path, PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Container extensions eligible for pairing
pub const MEDIA_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi"];

/// Filename markers, matched case-insensitively against the full file name
const VO_DOTTED_MARKERS: &[&str] = &[".en.", ".eng.", ".english."];
const ES_DOTTED_MARKERS: &[&str] = &[".es.", ".esp.", ".spanish."];

/// Standalone filename tokens
const VO_TOKENS: &[&str] = &["vose", "vo"];
const ES_TOKENS: &[&str] = &["español", "esp"];

/// Directory name vocabulary
const VO_DIR_TOKENS: &[&str] = &["english", "vo", "original"];
const ES_DIR_TOKENS: &[&str] = &["spanish", "es", "español"];

// Name.S01E02.rest
static SXXEXX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[.\s_\-\[(])s(\d{1,3})e(\d{1,4})(?:[^0-9]|$)").unwrap());

// Name.1x02.rest
static NXNN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[.\s_\-\[(])(\d{1,2})x(\d{1,3})(?:[^0-9]|$)").unwrap());

// .../Season 1/.../Episode 2
static SEASON_FOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)season\s*(\d+).*?(?:episode|ep|e)\s*(\d+)").unwrap());

static SEPARATOR_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ _-]+").unwrap());
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w.]").unwrap());
static DOT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").unwrap());

/// Language role of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageRole {
    /// Original-language release
    Vo,
    /// Spanish dubbed release
    Es,
}

/// What the role decision was based on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleEvidence {
    Filename,
    Directory,
    /// Nothing matched; defaulted to VO
    Default,
}

/// Canonical season/episode identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Episode information extracted from a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub series: Option<String>,
    pub key: EpisodeKey,
}

/// A classified media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Lowercased container extension
    pub extension: String,
    pub role: LanguageRole,
    pub evidence: RoleEvidence,
    pub episode: Option<EpisodeInfo>,
}

impl MediaFile {
    /// Classify a path; returns None for non-eligible extensions
    pub fn classify(path: &Path) -> Option<Self> {
        let extension = eligible_extension(path)?;
        let (role, evidence) = infer_role(path);
        if evidence == RoleEvidence::Default {
            log::debug!("No language marker for {}, assuming VO", path.display());
        }

        Some(Self {
            path: path.to_path_buf(),
            extension,
            role,
            evidence,
            episode: extract_episode(path),
        })
    }

    pub fn is_episode(&self) -> bool {
        self.episode.is_some()
    }
}

/// Lowercased extension if it is one of MEDIA_EXTENSIONS
pub fn eligible_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

/// Infer language role: filename markers, then ancestor directories, then VO
pub fn infer_role(path: &Path) -> (LanguageRole, RoleEvidence) {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if let Some(role) = role_from_filename(file_name) {
        return (role, RoleEvidence::Filename);
    }

    // Nearest ancestor first
    if let Some(parent) = path.parent() {
        for dir in parent.ancestors() {
            let name = match dir.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if let Some(role) = role_from_tokens(name, VO_DIR_TOKENS, ES_DIR_TOKENS) {
                return (role, RoleEvidence::Directory);
            }
        }
    }

    (LanguageRole::Vo, RoleEvidence::Default)
}

fn role_from_filename(file_name: &str) -> Option<LanguageRole> {
    let lower = file_name.to_lowercase();

    // Dotted markers are the strongest signal
    if VO_DOTTED_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(LanguageRole::Vo);
    }
    if ES_DOTTED_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(LanguageRole::Es);
    }

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    role_from_tokens(stem, VO_TOKENS, ES_TOKENS)
}

fn role_from_tokens(text: &str, vo: &[&str], es: &[&str]) -> Option<LanguageRole> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| vo.contains(t)) {
        Some(LanguageRole::Vo)
    } else if tokens.iter().any(|t| es.contains(t)) {
        Some(LanguageRole::Es)
    } else {
        None
    }
}

/// Extract episode information; first matching pattern wins
pub fn extract_episode(path: &Path) -> Option<EpisodeInfo> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");

    // Pattern 1: Name.S01E02
    if let Some(caps) = SXXEXX_RE.captures(stem) {
        let season = caps[1].parse().ok()?;
        let episode = caps[2].parse().ok()?;
        // group 1 starts right after the 'S'
        let prefix_end = caps.get(1).map(|m| m.start() - 1).unwrap_or(0);
        return Some(EpisodeInfo {
            series: series_from_prefix(&stem[..prefix_end]),
            key: EpisodeKey { season, episode },
        });
    }

    // Pattern 2: Name.1x02
    if let Some(caps) = NXNN_RE.captures(stem) {
        let season = caps[1].parse().ok()?;
        let episode = caps[2].parse().ok()?;
        let prefix_end = caps.get(1).map(|m| m.start()).unwrap_or(0);
        return Some(EpisodeInfo {
            series: series_from_prefix(&stem[..prefix_end]),
            key: EpisodeKey { season, episode },
        });
    }

    // Pattern 3: Season folder with an episode marker somewhere below it
    let full = path.to_string_lossy();
    if let Some(caps) = SEASON_FOLDER_RE.captures(&full) {
        let season = caps[1].parse().ok()?;
        let episode = caps[2].parse().ok()?;
        let series = path
            .ancestors()
            .nth(2)
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|s| s.to_string());
        return Some(EpisodeInfo {
            series,
            key: EpisodeKey { season, episode },
        });
    }

    None
}

fn series_from_prefix(prefix: &str) -> Option<String> {
    let name = prefix
        .split(|c: char| c == '.' || c == '_' || c == '-' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Normalize a filename: separators become dots, other punctuation is dropped
///
/// `"Movie (2020) - VO.AVI"` becomes `"Movie.2020.VO.avi"`.
pub fn normalize_filename(filename: &str) -> String {
    let path = Path::new(filename);
    let base = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();

    let normalized = SEPARATOR_RUN_RE.replace_all(base, ".");
    let normalized = NON_WORD_RE.replace_all(&normalized, "");
    let normalized = DOT_RUN_RE.replace_all(&normalized, ".");
    let normalized = normalized.trim_matches('.');

    format!("{}{}", normalized, extension)
}
