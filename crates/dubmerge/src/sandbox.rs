use std::path::{Component, Path, PathBuf};
use log::warn;
use crate::error::{Error, Result};

/// Authorized media root; paths outside it are never handed to a subprocess
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: normalize_lexically(&root.into()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True for the root itself or any path below it, after resolving `.` and `..`
    pub fn contains(&self, path: &Path) -> bool {
        normalize_lexically(path).starts_with(&self.root)
    }

    pub fn check(&self, path: &Path) -> Result<()> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(Error::SandboxViolation {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
        }
    }

    /// Keep only search roots inside the sandbox; fails when none remain
    pub fn filter_roots(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut valid = Vec::new();
        for path in paths {
            if self.contains(path) {
                valid.push(path.clone());
            } else {
                warn!("Path {} is outside the media root and will be ignored", path.display());
            }
        }

        if valid.is_empty() {
            return Err(Error::NoValidPaths);
        }
        Ok(valid)
    }
}

/// Resolve `.` and `..` components without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // never climb above the filesystem root
                if !matches!(out.components().next_back(), None | Some(Component::RootDir | Component::Prefix(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
