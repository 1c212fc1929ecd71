//! Video catalog loading
//!
//! The catalog is produced by an external identifier resolver: a JSON object
//! mapping a video reference (usually its page URL) to the resolved entry.
//! Object order is significant, since a video's global index (used for
//! checkpoints and `start-index`) is its position in the file.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that make the catalog (or resume state) unusable at startup
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Catalog {path} is not a JSON object of video entries")]
    NotAnObject { path: PathBuf },

    #[error("Unreadable checkpoint {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },
}

/// One catalog entry, kept at its position in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTask {
    /// Global index: position of the entry in the catalog file
    pub index: usize,
    /// Numeric video id (`aid`); names the artifact directory
    pub numeric_id: Option<u64>,
    /// Stream identifier (`cid`) the segment endpoint is keyed by
    pub content_id: Option<u64>,
    pub title: String,
    /// Catalog key the entry was found under
    pub source_reference: String,
    /// External reference id (`bvid`)
    pub reference_id: Option<String>,
    /// Index of an earlier entry with the same numeric video id
    pub duplicate_of: Option<usize>,
}

/// Why a catalog entry is carried through a run without being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No numeric video id, so no artifact directory can be named
    MissingVideoId,
    /// Another entry already owns this video's artifact directory
    DuplicateVideoId { first_index: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVideoId => f.write_str("no numeric video id"),
            Self::DuplicateVideoId { first_index } => {
                write!(f, "same video id as entry {}", first_index)
            }
        }
    }
}

impl VideoTask {
    /// Returns the reason this entry must not be fetched, if any
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match (self.numeric_id, self.duplicate_of) {
            (None, _) => Some(SkipReason::MissingVideoId),
            (Some(_), Some(first_index)) => Some(SkipReason::DuplicateVideoId { first_index }),
            (Some(_), None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    aid: Option<u64>,
    #[serde(default)]
    bvid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cid_info: Option<CidInfo>,
}

#[derive(Debug, Deserialize)]
struct CidInfo {
    #[serde(default)]
    main_cid: Option<u64>,
    #[serde(default)]
    title: Option<String>,
}

/// Loads the catalog, preserving file order
///
/// Every entry is kept so that indices match file positions. Entries without
/// a numeric video id, and later entries repeating an earlier video id, are
/// marked so the fetch engine records them as skipped. Entries without a
/// content id are kept as well; the fetch engine skips them too.
pub fn load_catalog(path: &Path) -> Result<Vec<VideoTask>, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&content, path)
}

fn parse_catalog(content: &str, path: &Path) -> Result<Vec<VideoTask>, CatalogError> {
    let parse_err = |source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let value: serde_json::Value = serde_json::from_str(content).map_err(parse_err)?;
    let serde_json::Value::Object(map) = value else {
        return Err(CatalogError::NotAnObject {
            path: path.to_path_buf(),
        });
    };

    let mut tasks = Vec::with_capacity(map.len());
    let mut first_seen: HashMap<u64, usize> = HashMap::new();
    for (index, (reference, raw)) in map.into_iter().enumerate() {
        let entry: CatalogEntry = serde_json::from_value(raw).map_err(parse_err)?;

        let duplicate_of = match entry.aid {
            Some(aid) => match first_seen.get(&aid) {
                Some(&first) => {
                    tracing::warn!(
                        "Catalog entry {} ({}) repeats video {} from entry {}",
                        index,
                        reference,
                        aid,
                        first
                    );
                    Some(first)
                }
                None => {
                    first_seen.insert(aid, index);
                    None
                }
            },
            None => {
                tracing::warn!("Catalog entry {} ({}) has no numeric video id", index, reference);
                None
            }
        };

        let (content_id, resolved_title) = match entry.cid_info {
            Some(info) => (info.main_cid, info.title),
            None => (None, None),
        };

        let title = resolved_title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| entry.title.as_deref().map(strip_markup))
            .unwrap_or_default();

        tasks.push(VideoTask {
            index,
            numeric_id: entry.aid,
            content_id,
            title,
            source_reference: reference,
            reference_id: entry.bvid,
            duplicate_of,
        });
    }

    Ok(tasks)
}

/// Removes inline markup such as search-highlight tags from a title
pub fn strip_markup(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_tag = false;
    for c in title.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
