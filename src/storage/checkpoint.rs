//! Progress checkpoints for resumable crawls
//!
//! The coordinator records one checkpoint after every batch. A crash loses
//! at most the batch in flight.

use crate::catalog::CatalogError;
use crate::storage::artifact::write_atomic;
use crate::storage::{StorageError, StorageResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted resume point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Global catalog index of the last video in the last finished batch
    pub last_processed_index: usize,
    pub total_videos: usize,
    /// Cumulative count of completed videos
    pub success_count: usize,
    #[serde(default)]
    pub failed_count: usize,
    #[serde(default)]
    pub skipped_count: usize,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl Checkpoint {
    pub fn new(
        last_processed_index: usize,
        total_videos: usize,
        success_count: usize,
        failed_count: usize,
        skipped_count: usize,
        config_hash: Option<String>,
    ) -> Self {
        Self {
            last_processed_index,
            total_videos,
            success_count,
            failed_count,
            skipped_count,
            timestamp: Utc::now().to_rfc3339(),
            config_hash,
        }
    }

    /// Global index the next run should start from
    pub fn resume_index(&self) -> usize {
        self.last_processed_index + 1
    }
}

/// Single writer of the checkpoint file
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    last_index: Option<usize>,
}

impl ProgressTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_index: None,
        }
    }

    /// Reads the existing checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No checkpoint file exists (fresh crawl)
    /// * `Ok(Some(Checkpoint))` - The previous run's resume point
    /// * `Err(CatalogError)` - The file exists but cannot be read or parsed
    pub fn load(&self) -> Result<Option<Checkpoint>, CatalogError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CatalogError::Checkpoint {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CatalogError::Checkpoint {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Overwrites the checkpoint file with `checkpoint`
    ///
    /// Within one tracker's lifetime the recorded index never moves backwards.
    pub async fn record(&mut self, checkpoint: &Checkpoint) -> StorageResult<()> {
        if let Some(previous) = self.last_index {
            if checkpoint.last_processed_index < previous {
                return Err(StorageError::CheckpointRegression {
                    previous,
                    attempted: checkpoint.last_processed_index,
                });
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::io(parent, source))?;
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&self.path, &json).await?;
        self.last_index = Some(checkpoint.last_processed_index);

        tracing::debug!(
            "Checkpoint written: index {} of {}",
            checkpoint.last_processed_index,
            checkpoint.total_videos
        );
        Ok(())
    }
}
