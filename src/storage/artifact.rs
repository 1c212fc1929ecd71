//! Per-video artifact storage
//!
//! Each video owns one directory under the data root, named by its numeric
//! id, holding `segment_<n>.bin` files and a `metadata.json` sidecar.
//! Directories are disjoint per video, so concurrent workers never contend.

use crate::state::{FailureRecord, VideoStatus};
use crate::storage::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the sidecar file inside each video directory
pub const METADATA_FILE: &str = "metadata.json";

/// Duration of one segment window, in minutes
pub const SEGMENT_MINUTES: u32 = 6;

/// Where one persisted segment lives and what window it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// File reference; only the file name is used when reading back
    pub file: String,
    pub size: u64,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SegmentDescriptor {
    pub fn new(index: u32, size: u64, fetched_at: DateTime<Utc>) -> Self {
        let (start_time, end_time) = segment_window(index);
        Self {
            file: segment_file_name(index),
            size,
            start_time,
            end_time,
            fetched_at: Some(fetched_at),
        }
    }
}

/// Metadata sidecar for one video
///
/// Older artifacts used `aid`, `bvid`, `cid` and `fetch_time` as key names
/// and carried no status; both layouts are readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(alias = "aid")]
    pub video_id: u64,
    #[serde(alias = "bvid", default)]
    pub reference_id: Option<String>,
    #[serde(alias = "cid", default)]
    pub content_id: Option<u64>,
    #[serde(alias = "fetch_time", default)]
    pub fetched_at: String,
    #[serde(default = "completed")]
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
    #[serde(default)]
    pub segments: BTreeMap<u32, SegmentDescriptor>,
}

fn completed() -> VideoStatus {
    VideoStatus::Completed
}

impl VideoMetadata {
    /// Returns true if the persisted indices are exactly `1..=n`
    pub fn segments_contiguous(&self) -> bool {
        self.segments
            .keys()
            .copied()
            .eq(1..=self.segments.len() as u32)
    }
}

/// Returns the `segment_<n>.bin` file name for a segment index
pub fn segment_file_name(index: u32) -> String {
    format!("segment_{}.bin", index)
}

/// Returns the `M:00` start and end marks of a segment's window
pub fn segment_window(index: u32) -> (String, String) {
    let start = index.saturating_sub(1) * SEGMENT_MINUTES;
    (
        format!("{}:00", start),
        format!("{}:00", start + SEGMENT_MINUTES),
    )
}

/// Filesystem store for video artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn video_dir(&self, video_id: u64) -> PathBuf {
        self.root.join(video_id.to_string())
    }

    /// Creates the video's directory if needed
    pub async fn prepare_video(&self, video_id: u64) -> StorageResult<PathBuf> {
        let dir = self.video_dir(video_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::io(&dir, source))?;
        Ok(dir)
    }

    /// Writes one segment's raw bytes and returns its descriptor
    pub async fn write_segment(
        &self,
        video_id: u64,
        index: u32,
        bytes: &[u8],
    ) -> StorageResult<SegmentDescriptor> {
        let path = self.video_dir(video_id).join(segment_file_name(index));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::io(&path, source))?;
        Ok(SegmentDescriptor::new(index, bytes.len() as u64, Utc::now()))
    }

    /// Writes the sidecar; called once per video when its loop ends
    pub async fn write_metadata(&self, metadata: &VideoMetadata) -> StorageResult<PathBuf> {
        let dir = self.video_dir(metadata.video_id);
        let path = dir.join(METADATA_FILE);
        let json = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&path, &json).await?;
        Ok(path)
    }

    /// Lists video directories that carry a sidecar, sorted by name
    pub fn list_videos(&self) -> StorageResult<Vec<PathBuf>> {
        let entries =
            std::fs::read_dir(&self.root).map_err(|source| StorageError::io(&self.root, source))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::io(&self.root, source))?;
            let path = entry.path();
            if path.is_dir() && path.join(METADATA_FILE).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Reads the sidecar of a video directory
    pub fn read_metadata(dir: &Path) -> StorageResult<VideoMetadata> {
        let path = dir.join(METADATA_FILE);
        let content =
            std::fs::read_to_string(&path).map_err(|source| StorageError::io(&path, source))?;
        serde_json::from_str(&content).map_err(|source| StorageError::Metadata { path, source })
    }

    /// Resolves a descriptor's file against the video directory
    ///
    /// Only the file name is kept, so artifacts stay readable after the data
    /// root has been moved.
    pub fn segment_path(dir: &Path, descriptor: &SegmentDescriptor) -> PathBuf {
        let name = Path::new(&descriptor.file)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&descriptor.file));
        dir.join(name)
    }
}

/// Writes a file through a temporary sibling and a rename
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|source| StorageError::io(&tmp, source))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StorageError::io(path, source))
}
