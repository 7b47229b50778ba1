use log::warn;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Asset root does not exist: {path}")]
    MissingRoot { path: PathBuf },

    #[error("Asset root is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

/// Which files under the asset root count as gallery candidates.
#[derive(Debug, Clone)]
pub struct AssetFilter {
    extensions: HashSet<String>,
    exclusions: Vec<String>,
}

impl AssetFilter {
    pub fn new(extensions: &[String], exclusions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclusions: exclusions.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Extension and file name are both compared case-insensitively.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&ext.to_lowercase()) {
            return false;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        !self.exclusions.iter().any(|marker| name.contains(marker))
    }
}

/// Recursively walk `root`, returning candidate image paths in sorted order.
pub fn select_assets(root: &Path, filter: &AssetFilter) -> Result<Vec<PathBuf>, SelectError> {
    if !root.exists() {
        return Err(SelectError::MissingRoot {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(SelectError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };

        // Directory links are not descended into, but a link to a file
        // counts as that file.
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        if filter.accepts(entry.path()) {
            candidates.push(entry.into_path());
        }
    }

    candidates.sort();
    candidates.dedup();
    Ok(candidates)
}
