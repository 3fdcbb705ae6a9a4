use std::path::{Path, PathBuf};
use regex::{Regex, RegexBuilder};
use walkdir::WalkDir;
use log::{debug, info, warn};
use crate::classifier;
use crate::error::Result;

// Compiled-size cap for user-supplied filter patterns
const FILTER_SIZE_LIMIT: usize = 1 << 20;

/// Series and season filters applied before classification
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    series: Option<Regex>,
    season: Option<Regex>,
}

impl SearchFilter {
    pub fn new(series: Option<&str>, season: Option<u32>) -> Result<Self> {
        let series = match series.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(build_filter(&regex::escape(s))?),
            None => None,
        };
        // Season tokens must start a word so "s2" inside other names does not count
        let season = match season {
            Some(n) => Some(build_filter(&format!(
                r"(?:^|[^a-z0-9])s0*{n}(?:[^0-9]|$)|season\s*{n}(?:[^0-9]|$)|(?:^|[^a-z0-9]){n}x\d+",
                n = n
            ))?),
            None => None,
        };
        Ok(Self { series, season })
    }

    /// True when the file name or its containing directory path satisfies every active filter
    pub fn matches(&self, path: &Path) -> bool {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let dir = path.parent().map(|p| p.to_string_lossy()).unwrap_or_default();

        let check = |re: &Option<Regex>| match re {
            Some(re) => re.is_match(file_name) || re.is_match(&dir),
            None => true,
        };
        check(&self.series) && check(&self.season)
    }
}

fn build_filter(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(FILTER_SIZE_LIMIT)
        .build()?)
}

/// Recursively collect eligible media files under the roots, sorted by path
pub fn scan_media(roots: &[PathBuf], filter: &SearchFilter) -> Vec<PathBuf> {
    let mut results = Vec::new();
    let mut files_checked = 0;
    let mut filtered_out = 0;

    for root in roots {
        if !root.exists() {
            warn!("Search root does not exist: {}", root.display());
            continue;
        }

        info!("Scanning directory: {}", root.display());

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            files_checked += 1;

            if classifier::eligible_extension(path).is_none() {
                continue;
            }

            if !filter.matches(path) {
                filtered_out += 1;
                debug!("Filtered out: {}", path.display());
                continue;
            }

            debug!("Found media file: {}", path.display());
            results.push(path.to_path_buf());
        }
    }

    results.sort();
    results.dedup();

    info!(
        "Scan complete: checked {} files, {} filtered out, {} media files kept",
        files_checked, filtered_out, results.len()
    );
    results
}
