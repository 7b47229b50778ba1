use crate::core::cycler::{DEFAULT_LAUNCH_STRIDE, DEFAULT_LAUNCH_WINDOWS, DEFAULT_STATUS_CYCLE};
use crate::core::destination::{Destination, default_destinations};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ASSET_ROOT: &str = "src/assets/gallery";
pub const DEFAULT_OUTPUT: &str = "src/data/destinations.generated.json";
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Travel photo of {name}";

/// Side length of the perceptual-hash grid; 16 gives a 256-bit fingerprint.
pub const DEFAULT_HASH_SIZE: u32 = 16;

/// Maximum Hamming distance at which two fingerprints count as the same image.
pub const DEFAULT_DEDUP_THRESHOLD: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Command line of an external model runner, see `services::command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCommandConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub asset_root: PathBuf,
    pub output: PathBuf,
    pub image_extensions: Vec<String>,
    pub exclude_substrings: Vec<String>,
    pub hash_size: u32,
    pub dedup_threshold: u32,
    pub prompt_template: String,
    pub destinations: Vec<Destination>,
    pub status_cycle: Vec<String>,
    pub launch_windows: Vec<String>,
    pub launch_stride: usize,
    pub jobs: usize,
    pub skip_unreadable: bool,
    pub model: Option<ModelCommandConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            exclude_substrings: vec!["logo".into(), "card".into()],
            hash_size: DEFAULT_HASH_SIZE,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            destinations: default_destinations(),
            status_cycle: DEFAULT_STATUS_CYCLE.iter().map(|s| s.to_string()).collect(),
            launch_windows: DEFAULT_LAUNCH_WINDOWS.iter().map(|s| s.to_string()).collect(),
            launch_stride: DEFAULT_LAUNCH_STRIDE,
            jobs: 1,
            skip_unreadable: false,
            model: None,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from `path` when given, otherwise use the defaults.
    /// Keys missing from the file keep their default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that don't depend on the models. An empty destination list is
    /// reported by the matcher instead, which owns that invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_size < 2 {
            return Err(invalid(format!(
                "hash_size must be at least 2, got {}",
                self.hash_size
            )));
        }
        if !self.prompt_template.contains("{name}") {
            return Err(invalid(format!(
                "prompt_template {:?} has no {{name}} placeholder",
                self.prompt_template
            )));
        }
        if self.jobs == 0 {
            return Err(invalid("jobs must be at least 1".to_string()));
        }
        if self.image_extensions.is_empty() {
            return Err(invalid("image_extensions is empty".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}
