use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use log::{debug, info};
use crate::classifier::{self, EpisodeKey, LanguageRole, MediaFile};
use crate::config::MergeConfig;
use crate::error::Result;
use crate::scan::{self, SearchFilter};

// Prefix before the first episode-style token
static GROUP_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)(?:\.s\d+|\.e\d+|\.\d+x\d+)").unwrap());

/// A VO file and the ES file whose audio will be merged into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub key: String,
    pub vo_path: PathBuf,
    pub es_path: PathBuf,
}

/// Similarity thresholds for the fuzzy phase
#[derive(Debug, Clone, Copy)]
pub struct PairingOptions {
    pub group_threshold: f64,
    pub file_threshold: f64,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            group_threshold: 0.6,
            file_threshold: 0.5,
        }
    }
}

impl From<&MergeConfig> for PairingOptions {
    fn from(cfg: &MergeConfig) -> Self {
        Self {
            group_threshold: cfg.group_similarity_threshold,
            file_threshold: cfg.file_similarity_threshold,
        }
    }
}

/// Scan the roots, filter, classify and pair VO/ES files
///
/// Roots must already be validated against the media root by the caller.
pub fn pair(
    roots: &[PathBuf],
    series: Option<&str>,
    season: Option<u32>,
    options: PairingOptions,
) -> Result<BTreeMap<String, MatchedPair>> {
    let filter = SearchFilter::new(series, season)?;
    let files = scan::scan_media(roots, &filter);
    Ok(pair_files(&files, options))
}

/// Pair an already-enumerated file list
///
/// Files are processed in lexicographic path order so repeated runs over the
/// same tree produce the same pairs.
pub fn pair_files(files: &[PathBuf], options: PairingOptions) -> BTreeMap<String, MatchedPair> {
    let mut sorted: Vec<&PathBuf> = files.iter().collect();
    sorted.sort();
    sorted.dedup();

    let classified: Vec<MediaFile> = sorted
        .into_iter()
        .filter_map(|p| MediaFile::classify(p))
        .collect();

    let (vo_files, es_files): (Vec<&MediaFile>, Vec<&MediaFile>) =
        classified.iter().partition(|f| f.role == LanguageRole::Vo);

    info!("Found {} VO files and {} ES files", vo_files.len(), es_files.len());

    let mut matched = BTreeMap::new();
    let mut used: HashSet<&Path> = HashSet::new();

    // Exact phase: join on episode key; first VO per key in path order, closest ES candidate
    let vo_keys = candidates_per_key(&vo_files);
    let es_keys = candidates_per_key(&es_files);

    for (key, vo_candidates) in &vo_keys {
        let Some(es_candidates) = es_keys.get(key) else { continue };
        let Some(&vo_file) = vo_candidates.first() else { continue };
        if let Some(es_file) = closest_counterpart(vo_file, es_candidates) {
            let (vo_path, es_path) = (vo_file.path.as_path(), es_file.path.as_path());
            debug!("Exact match {}: {} <-> {}", key, vo_path.display(), es_path.display());
            matched.insert(
                key.to_string(),
                MatchedPair {
                    key: key.to_string(),
                    vo_path: vo_path.to_path_buf(),
                    es_path: es_path.to_path_buf(),
                },
            );
            used.insert(vo_path);
            used.insert(es_path);
        }
    }

    // Fuzzy phase over everything still unmatched
    let remaining_vo: Vec<&Path> = vo_files
        .iter()
        .map(|f| f.path.as_path())
        .filter(|p| !used.contains(p))
        .collect();
    let remaining_es: Vec<&Path> = es_files
        .iter()
        .map(|f| f.path.as_path())
        .filter(|p| !used.contains(p))
        .collect();

    for pair in fuzzy_match(&remaining_vo, &remaining_es, options) {
        let key = if matched.contains_key(&pair.key) {
            pair.vo_path.to_string_lossy().to_string()
        } else {
            pair.key.clone()
        };
        matched.insert(key.clone(), MatchedPair { key, ..pair });
    }

    info!("Found {} complete matches (both VO and ES)", matched.len());
    matched
}

fn candidates_per_key<'a>(files: &[&'a MediaFile]) -> BTreeMap<EpisodeKey, Vec<&'a MediaFile>> {
    let mut keys: BTreeMap<EpisodeKey, Vec<&'a MediaFile>> = BTreeMap::new();
    for &file in files {
        if let Some(info) = &file.episode {
            keys.entry(info.key).or_default().push(file);
        }
    }
    keys
}

/// Candidate of the same series first, then one from the same directory, then path order
fn closest_counterpart<'a>(vo: &MediaFile, candidates: &[&'a MediaFile]) -> Option<&'a MediaFile> {
    let vo_series = series_of(vo);
    let vo_dir = vo.path.parent();

    candidates
        .iter()
        .copied()
        .min_by_key(|es| {
            let same_series = match (vo_series.as_deref(), series_of(es).as_deref()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            let same_dir = vo_dir.is_some() && es.path.parent() == vo_dir;
            (!same_series, !same_dir)
        })
}

fn series_of(file: &MediaFile) -> Option<String> {
    file.episode
        .as_ref()
        .and_then(|e| e.series.as_deref())
        .map(str::to_lowercase)
}

/// Greedy group-then-file matching; an ES file is consumed by the first VO file that picks it
fn fuzzy_match(vo: &[&Path], es: &[&Path], options: PairingOptions) -> Vec<MatchedPair> {
    let vo_groups = group_by_key(vo);
    let mut es_groups = group_by_key(es);
    let mut pairs = Vec::new();

    for (group_key, vo_members) in &vo_groups {
        let mut best_group: Option<usize> = None;
        let mut best_similarity = 0.0;
        for (idx, (es_key, _)) in es_groups.iter().enumerate() {
            let sim = similarity(group_key, es_key);
            if sim > best_similarity && sim > options.group_threshold {
                best_similarity = sim;
                best_group = Some(idx);
            }
        }

        let Some(group_idx) = best_group else {
            debug!("No ES group for VO group '{}'", group_key);
            continue;
        };

        for vo_path in vo_members {
            let vo_name = comparable_name(vo_path);
            let candidates = &mut es_groups[group_idx].1;

            let mut best_file: Option<usize> = None;
            let mut best_file_similarity = 0.0;
            for (idx, es_path) in candidates.iter().enumerate() {
                let sim = similarity(&vo_name, &comparable_name(es_path));
                if sim > best_file_similarity && sim > options.file_threshold {
                    best_file_similarity = sim;
                    best_file = Some(idx);
                }
            }

            if let Some(idx) = best_file {
                let es_path = candidates.remove(idx);
                debug!(
                    "Fuzzy match ({:.2}): {} <-> {}",
                    best_file_similarity,
                    vo_path.display(),
                    es_path.display()
                );
                let key = vo_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                pairs.push(MatchedPair {
                    key,
                    vo_path: vo_path.to_path_buf(),
                    es_path: es_path.to_path_buf(),
                });
            }
        }
    }

    pairs
}

/// Groups in first-encountered order
fn group_by_key<'a>(files: &[&'a Path]) -> Vec<(String, Vec<&'a Path>)> {
    let mut groups: Vec<(String, Vec<&'a Path>)> = Vec::new();
    for &path in files {
        let key = group_key(path);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(path),
            None => groups.push((key, vec![path])),
        }
    }
    groups
}

/// Series/movie grouping key from the normalized file name
pub fn group_key(path: &Path) -> String {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let normalized = classifier::normalize_filename(file_name);

    let key = match GROUP_PREFIX_RE.captures(&normalized) {
        Some(caps) => caps[1].to_string(),
        None => normalized.split('.').next().unwrap_or("").to_string(),
    };
    key.to_lowercase()
}

/// Normalized, lowercased base name without extension
fn comparable_name(path: &Path) -> String {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let normalized = classifier::normalize_filename(file_name);
    Path::new(&normalized)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&normalized)
        .to_lowercase()
}

/// Normalized edit-distance similarity in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    1.0 - (levenshtein_distance(a, b) as f64 / max_len as f64)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}
