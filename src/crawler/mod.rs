//! Fetch engine for comment segments
//!
//! This module contains the core harvesting logic, including:
//! - The shared rate governor bounding the aggregate request rate
//! - HTTP fetching with pacing, retries and end-of-stream detection
//! - Batch coordination, artifact writes and checkpointing

mod coordinator;
mod fetcher;
mod governor;

pub use coordinator::{CrawlOptions, CrawlReport, Coordinator, VideoReport};
pub use fetcher::{
    build_http_client, classify_status, Pacing, RetryPolicy, SegmentFetcher, SegmentOutcome,
};
pub use governor::{RateGovernor, DEFAULT_POLL_INTERVAL};
pub use crate::state::FetchFailure;

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the catalog and resolve the start index
/// 2. Build the HTTP client, identity pool and rate governor
/// 3. Fetch every video's segments in concurrent batches
/// 4. Write one checkpoint per batch
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration file
/// * `options` - Command-line run options
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Harvest finished; per-video failures are in the report
/// * `Err(HarvestError)` - Setup, checkpoint or I/O failure
pub async fn crawl(
    config: Config,
    config_hash: String,
    options: CrawlOptions,
) -> Result<CrawlReport, HarvestError> {
    let mut coordinator = Coordinator::new(config, config_hash, options)?;
    coordinator.run().await
}
