//! Output handler traits and types
//!
//! This module defines the trait interface for tabular output handlers and
//! the record and summary types they consume.

use crate::decoder::CommentRecord;
use crate::storage::StorageError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during assembly and output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A decoded comment tagged with the video and segment it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedRecord {
    pub video_id: u64,
    pub title: String,
    pub content_id: Option<u64>,
    pub segment_index: u32,
    #[serde(flatten)]
    pub record: CommentRecord,
}

/// A segment the assembler could not decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentFailure {
    pub video_id: u64,
    pub segment_index: u32,
    pub file: PathBuf,
    pub reason: String,
}

/// Aggregate statistics over one assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblySummary {
    pub total_records: usize,
    /// Videos contributing at least one record
    pub distinct_videos: usize,
    pub average_per_video: f64,
    pub videos_scanned: usize,
    pub segments_decoded: usize,
    pub segments_failed: usize,
    pub failures: Vec<SegmentFailure>,
}

impl AssemblySummary {
    /// Recomputes the average from the record and video counts
    pub fn finish(&mut self) {
        self.average_per_video = if self.distinct_videos == 0 {
            0.0
        } else {
            self.total_records as f64 / self.distinct_videos as f64
        };
    }
}

/// Trait for tabular output handlers
pub trait OutputHandler {
    /// Writes every record, replacing any previous output
    ///
    /// # Arguments
    ///
    /// * `records` - Tagged records in assembly order
    fn write_records(&self, records: &[TaggedRecord]) -> OutputResult<()>;

    /// Writes the assembly summary alongside the records
    ///
    /// # Arguments
    ///
    /// * `summary` - Statistics of the assembly
    fn write_summary(&self, summary: &AssemblySummary) -> OutputResult<()>;

    /// Where the records end up
    fn location(&self) -> &Path;
}
