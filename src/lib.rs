//! Danmaku-Harvester: a polite comment-stream harvester
//!
//! This crate fetches time-sliced binary comment segments ("danmaku") for a
//! catalog of videos, persists them as per-video artifacts, and decodes them
//! into flat tabular records for analysis.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod decoder;
pub mod identity;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Danmaku-Harvester operations
///
/// Only configuration, catalog, checkpoint and output failures surface here.
/// Per-segment and per-video failures are recorded in the video's metadata
/// sidecar instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid header value in identity: {0}")]
    InvalidHeader(String),
}

/// Result type alias for Danmaku-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{load_catalog, SkipReason, VideoTask};
pub use config::Config;
pub use decoder::{decode_segment, CommentRecord, FormatError};
pub use identity::{Identity, IdentityRotator};
pub use state::VideoStatus;
