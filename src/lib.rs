pub mod config;
pub mod core;
pub mod services;

pub use config::{CatalogConfig, ConfigError};
pub use crate::core::catalog::{CatalogRecord, CatalogSummary};
pub use crate::core::destination::Destination;
pub use crate::core::pipeline::{CatalogPipeline, CatalogRun, Gatekeeper, PipelineError};
