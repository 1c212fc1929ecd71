//! State management for videos during a crawl
//!
//! This module contains the terminal states a video can reach and the
//! failure classes recorded when it does not complete.

mod video_state;

pub use video_state::{FailureRecord, FetchFailure, VideoStatus};
