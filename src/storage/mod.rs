//! Storage module for persisting harvest data
//!
//! This module handles everything the fetch engine writes to disk:
//! - Per-video directories of raw segment payloads
//! - The per-video metadata sidecar
//! - The batch checkpoint used to resume an interrupted crawl

mod artifact;
mod checkpoint;

pub use artifact::{
    segment_file_name, segment_window, ArtifactStore, SegmentDescriptor, VideoMetadata,
    METADATA_FILE, SEGMENT_MINUTES,
};
pub use checkpoint::{Checkpoint, ProgressTracker};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Checkpoint regression: index {attempted} is behind {previous}")]
    CheckpointRegression { previous: usize, attempted: usize },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
