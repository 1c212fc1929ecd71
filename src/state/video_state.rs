/// Video state definitions for tracking fetch outcomes
///
/// Every video ends a run in exactly one of these states, and the state is
/// written into the video's metadata sidecar.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Terminal state of a video after its segment loop ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// The stream ended (short payload) or the segment limit was reached
    Completed,

    /// Retries were exhausted or a segment could not be stored
    Failed,

    /// The entry had no content id or could not be fetched at all
    /// (see `SkipReason`); nothing was requested
    Skipped,
}

impl VideoStatus {
    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a segment could not be obtained
///
/// Transport, server and client failures are retried; storage and abort
/// failures end the video immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    /// Connection, timeout or body-read failure
    #[error("transport error: {message}")]
    Transport { message: String },

    /// 5xx, or any other non-success status that is not client-class
    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    /// 4xx, usually the upstream throttling us
    #[error("client error: HTTP {status}")]
    Client { status: u16 },

    /// The segment could not be written to disk
    #[error("storage error: {message}")]
    Storage { message: String },

    /// The video's task ended abnormally
    #[error("task aborted: {message}")]
    Aborted { message: String },
}

impl FetchFailure {
    /// Returns true for failure classes the fetcher retries
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Server { .. } | Self::Client { .. }
        )
    }
}

/// Where and how a video's segment loop failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Segment index that could not be obtained
    pub segment_index: u32,
    /// Request attempts spent on that segment
    pub attempts: u32,
    pub failure: FetchFailure,
}
