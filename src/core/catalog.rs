use serde::{Deserialize, Serialize, Serializer};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to create catalog directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write catalog {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode catalog: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Malformed catalog {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One accepted image as it appears in the generated catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub file: String,
    pub name: String,
    pub region: String,
    pub category: String,
    pub status: String,
    #[serde(rename = "launchDate")]
    pub launch_date: String,
    pub caption: String,
    #[serde(serialize_with = "serialize_similarity")]
    pub similarity: f64,
}

/// Round to four decimal places, the precision the catalog stores.
///
/// Ties are decided on the binary value after scaling and go away from zero
/// (`f64::round`). A score such as `0.00065`, stored as slightly less than
/// that decimal, still scales to exactly `6.5` and becomes `0.0007`.
pub fn round_similarity(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

fn serialize_similarity<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_similarity(*score))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSummary {
    pub path: PathBuf,
    pub records: usize,
    pub bytes: usize,
    pub digest: blake3::Hash,
}

/// Path of `file` relative to the asset root's parent, joined with `/`, so a
/// gallery at `src/assets/gallery` yields entries like `gallery/paris.jpg`.
pub fn catalog_relative_path(asset_root: &Path, file: &Path) -> String {
    let base = asset_root.parent().unwrap_or(asset_root);
    let relative = file.strip_prefix(base).unwrap_or(file);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode the full catalog as pretty JSON with a trailing newline.
pub fn encode_catalog(records: &[CatalogRecord]) -> Result<Vec<u8>, CatalogError> {
    let mut bytes = serde_json::to_vec_pretty(records)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write the catalog through a temporary file in the target directory and
/// rename it into place, so `path` holds either the old or the complete new
/// catalog.
pub fn write_catalog(path: &Path, records: &[CatalogRecord]) -> Result<CatalogSummary, CatalogError> {
    let bytes = encode_catalog(records)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|source| CatalogError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let write_err = |source| CatalogError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(CatalogSummary {
        path: path.to_path_buf(),
        records: records.len(),
        bytes: bytes.len(),
        digest: blake3::hash(&bytes),
    })
}

pub fn read_catalog(path: &Path) -> Result<Vec<CatalogRecord>, CatalogError> {
    let raw = fs::read(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| CatalogError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
