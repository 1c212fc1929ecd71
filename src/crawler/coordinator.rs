//! Crawl coordinator - batch orchestration of the fetch engine
//!
//! This module contains the main harvest loop, including:
//! - Resolving the start index (override, checkpoint, configuration)
//! - Running each batch of videos as concurrent tasks behind a join barrier
//! - The strictly sequential segment loop of a single video
//! - Writing the checkpoint after every batch

use crate::catalog::{load_catalog, CatalogError, SkipReason, VideoTask};
use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, Pacing, SegmentFetcher, SegmentOutcome};
use crate::crawler::governor::RateGovernor;
use crate::identity::IdentityRotator;
use crate::state::{FailureRecord, FetchFailure, VideoStatus};
use crate::storage::{ArtifactStore, Checkpoint, ProgressTracker, VideoMetadata};
use crate::HarvestError;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Run options supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Ignore any existing checkpoint
    pub fresh: bool,
    /// Start at this global index regardless of checkpoint or configuration
    pub start_index: Option<usize>,
}

/// Outcome of one catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
    /// Global index of the catalog entry
    pub index: usize,
    pub video_id: Option<u64>,
    pub status: VideoStatus,
    pub segments: usize,
    pub failure: Option<FailureRecord>,
    /// Set when the entry was never fetched
    pub skip_reason: Option<SkipReason>,
}

/// Totals for one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub total_videos: usize,
    pub start_index: usize,
    /// Videos handled by this run
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub segments_fetched: usize,
    /// Checkpoint written after the last batch, if any batch ran
    pub checkpoint: Option<Checkpoint>,
}

impl CrawlReport {
    fn record(&mut self, report: &VideoReport) {
        self.processed += 1;
        self.segments_fetched += report.segments;
        match report.status {
            VideoStatus::Completed => self.completed += 1,
            VideoStatus::Failed => self.failed += 1,
            VideoStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Per-video worker state shared by all tasks of a run
struct VideoWorker {
    fetcher: SegmentFetcher,
    store: ArtifactStore,
    rotator: Arc<IdentityRotator>,
    pacing: Pacing,
    max_segments: u32,
}

impl VideoWorker {
    /// Runs the segment loop for one video and writes its sidecar
    async fn crawl_video(&self, task: VideoTask) -> VideoReport {
        let video_id = match (task.skip_reason(), task.numeric_id) {
            (None, Some(video_id)) => video_id,
            (reason, _) => {
                let reason = reason.unwrap_or(SkipReason::MissingVideoId);
                tracing::warn!(
                    "Catalog entry {} ({}) skipped: {}",
                    task.index,
                    task.source_reference,
                    reason
                );
                return VideoReport {
                    index: task.index,
                    video_id: task.numeric_id,
                    status: VideoStatus::Skipped,
                    segments: 0,
                    failure: None,
                    skip_reason: Some(reason),
                };
            }
        };

        let mut metadata = VideoMetadata {
            title: task.title.clone(),
            video_id,
            reference_id: task.reference_id.clone(),
            content_id: task.content_id,
            fetched_at: Utc::now().to_rfc3339(),
            status: VideoStatus::Completed,
            failure: None,
            segments: BTreeMap::new(),
        };

        if let Err(e) = self.store.prepare_video(video_id).await {
            tracing::error!("Cannot create directory for video {}: {}", video_id, e);
            metadata.status = VideoStatus::Failed;
            metadata.failure = Some(FailureRecord {
                segment_index: 1,
                attempts: 0,
                failure: FetchFailure::Storage {
                    message: e.to_string(),
                },
            });
            return report_for(task.index, &metadata);
        }

        match task.content_id {
            Some(content_id) => self.fetch_segments(content_id, &mut metadata).await,
            None => {
                tracing::warn!(
                    "Video {} ({}) has no content id, skipping",
                    video_id,
                    task.source_reference
                );
                metadata.status = VideoStatus::Skipped;
            }
        }

        metadata.fetched_at = Utc::now().to_rfc3339();
        if let Err(e) = self.store.write_metadata(&metadata).await {
            tracing::error!("Failed to write metadata for video {}: {}", video_id, e);
            metadata.status = VideoStatus::Failed;
            metadata.failure = Some(FailureRecord {
                segment_index: metadata.segments.len() as u32 + 1,
                attempts: 0,
                failure: FetchFailure::Storage {
                    message: e.to_string(),
                },
            });
        }

        match metadata.status {
            VideoStatus::Completed => tracing::info!(
                "Video {} completed with {} segments",
                metadata.video_id,
                metadata.segments.len()
            ),
            VideoStatus::Failed => tracing::warn!(
                "Video {} failed after {} segments",
                metadata.video_id,
                metadata.segments.len()
            ),
            VideoStatus::Skipped => {}
        }

        report_for(task.index, &metadata)
    }

    async fn fetch_segments(&self, content_id: u64, metadata: &mut VideoMetadata) {
        let video_id = metadata.video_id;
        let headers = match self.rotator.next().to_header_map() {
            Ok(headers) => headers,
            Err(e) => {
                metadata.status = VideoStatus::Failed;
                metadata.failure = Some(FailureRecord {
                    segment_index: 1,
                    attempts: 0,
                    failure: FetchFailure::Aborted {
                        message: e.to_string(),
                    },
                });
                return;
            }
        };

        for index in 1..=self.max_segments {
            self.pacing.pause().await;

            match self
                .fetcher
                .fetch_segment(content_id, video_id, index, &headers)
                .await
            {
                SegmentOutcome::Continue(bytes) => {
                    match self.store.write_segment(video_id, index, &bytes).await {
                        Ok(descriptor) => {
                            tracing::debug!(
                                "Video {} segment {} stored ({} bytes)",
                                video_id,
                                index,
                                descriptor.size
                            );
                            metadata.segments.insert(index, descriptor);
                        }
                        Err(e) => {
                            metadata.status = VideoStatus::Failed;
                            metadata.failure = Some(FailureRecord {
                                segment_index: index,
                                attempts: 1,
                                failure: FetchFailure::Storage {
                                    message: e.to_string(),
                                },
                            });
                            return;
                        }
                    }
                }
                SegmentOutcome::StreamEnded => return,
                SegmentOutcome::Failed { failure, attempts } => {
                    metadata.status = VideoStatus::Failed;
                    metadata.failure = Some(FailureRecord {
                        segment_index: index,
                        attempts,
                        failure,
                    });
                    return;
                }
            }
        }

        tracing::debug!(
            "Video {} reached the segment limit of {}",
            video_id,
            self.max_segments
        );
    }
}

fn report_for(index: usize, metadata: &VideoMetadata) -> VideoReport {
    VideoReport {
        index,
        video_id: Some(metadata.video_id),
        status: metadata.status,
        segments: metadata.segments.len(),
        failure: metadata.failure.clone(),
        skip_reason: None,
    }
}

/// Main harvest coordinator
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    options: CrawlOptions,
    tasks: Vec<VideoTask>,
    worker: Arc<VideoWorker>,
    tracker: ProgressTracker,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, stored in checkpoints
    /// * `options` - Command-line run options
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Catalog loaded and HTTP client built
    /// * `Err(HarvestError)` - Catalog, identity or client setup failed
    pub fn new(
        config: Config,
        config_hash: String,
        options: CrawlOptions,
    ) -> Result<Self, HarvestError> {
        let tasks = load_catalog(Path::new(&config.paths.catalog))?;
        tracing::info!("Loaded {} catalog entries from {}", tasks.len(), config.paths.catalog);

        let rotator = Arc::new(IdentityRotator::from_entries(&config.identities)?);
        let governor = Arc::new(RateGovernor::new(config.crawler.effective_rate()));
        let client = build_http_client(&config.crawler, config.relay.as_ref())?;
        let fetcher = SegmentFetcher::new(client, &config, governor)?;

        let worker = Arc::new(VideoWorker {
            fetcher,
            store: ArtifactStore::new(&config.paths.data_dir),
            rotator,
            pacing: Pacing::from_config(&config.crawler),
            max_segments: config.crawler.max_segments,
        });
        let tracker = ProgressTracker::new(&config.paths.checkpoint);

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            options,
            tasks,
            worker,
            tracker,
        })
    }

    /// Determines where this run starts and which counts it carries forward
    ///
    /// Precedence: explicit override, then the checkpoint (unless fresh), then
    /// the configured start index.
    pub fn resolve_start(&self) -> Result<(usize, Option<Checkpoint>), CatalogError> {
        if let Some(index) = self.options.start_index {
            tracing::info!("Starting at index {} (command line)", index);
            return Ok((index, None));
        }

        if !self.options.fresh {
            if let Some(checkpoint) = self.tracker.load()? {
                if checkpoint.config_hash.as_deref().is_some_and(|h| h != self.config_hash) {
                    tracing::warn!(
                        "Checkpoint was written under a different configuration; resuming anyway"
                    );
                }
                tracing::info!(
                    "Resuming from checkpoint at index {} ({} succeeded so far)",
                    checkpoint.resume_index(),
                    checkpoint.success_count
                );
                return Ok((checkpoint.resume_index(), Some(checkpoint)));
            }
        }

        Ok((self.config.crawler.start_index, None))
    }

    /// Runs the harvest over the catalog from the resolved start index
    ///
    /// Videos are processed in batches of `concurrency`; a batch completes
    /// before the next starts, and the checkpoint is written after each batch.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let (start, resumed) = self.resolve_start()?;
        let total = self.tasks.len();
        let mut report = CrawlReport {
            total_videos: total,
            start_index: start,
            ..CrawlReport::default()
        };

        if start >= total {
            tracing::info!(
                "Start index {} is at or past the end of the catalog ({} videos), nothing to do",
                start,
                total
            );
            return Ok(report);
        }

        tokio::fs::create_dir_all(&self.config.paths.data_dir).await?;

        let (base_success, base_failed, base_skipped) = resumed
            .as_ref()
            .map(|c| (c.success_count, c.failed_count, c.skipped_count))
            .unwrap_or_default();

        let batch_size = self.config.crawler.concurrency.max(1) as usize;
        let batches = (total - start).div_ceil(batch_size);
        let started = Instant::now();

        tracing::info!(
            "Harvesting {} videos from index {} in {} batches of {}",
            total - start,
            start,
            batches,
            batch_size
        );

        for (batch_no, chunk) in self.tasks[start..].chunks(batch_size).enumerate() {
            let batch_reports = run_batch(&self.worker, chunk).await;
            let batch_ok = batch_reports.iter().filter(|r| r.status.is_success()).count();
            for video in &batch_reports {
                report.record(video);
            }

            let checkpoint = Checkpoint::new(
                start + report.processed - 1,
                total,
                base_success + report.completed,
                base_failed + report.failed,
                base_skipped + report.skipped,
                Some(self.config_hash.clone()),
            );
            self.tracker.record(&checkpoint).await?;
            report.checkpoint = Some(checkpoint);

            tracing::info!(
                "Batch {}/{}: {}/{} succeeded, {} of {} videos done, {:.1}s elapsed",
                batch_no + 1,
                batches,
                batch_ok,
                chunk.len(),
                start + report.processed,
                total,
                started.elapsed().as_secs_f64()
            );
        }

        tracing::info!(
            "Harvest finished: {} processed, {} completed, {} failed, {} skipped",
            report.processed,
            report.completed,
            report.failed,
            report.skipped
        );

        Ok(report)
    }
}

/// Runs one batch and waits for every task in it
///
/// A task that panics is reported as a failed video; its siblings are
/// unaffected.
async fn run_batch(worker: &Arc<VideoWorker>, chunk: &[VideoTask]) -> Vec<VideoReport> {
    let mut set = JoinSet::new();
    let mut pending: HashMap<usize, VideoTask> = HashMap::new();

    for task in chunk {
        pending.insert(task.index, task.clone());
        let worker = worker.clone();
        let task = task.clone();
        set.spawn(async move { worker.crawl_video(task).await });
    }

    let mut reports = Vec::with_capacity(chunk.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(report) => {
                pending.remove(&report.index);
                reports.push(report);
            }
            Err(e) => tracing::error!("Video task ended abnormally: {}", e),
        }
    }

    for (index, task) in pending {
        let failure = FailureRecord {
            segment_index: 1,
            attempts: 0,
            failure: FetchFailure::Aborted {
                message: "worker task panicked".to_string(),
            },
        };
        if let (Some(video_id), None) = (task.numeric_id, task.skip_reason()) {
            let metadata = VideoMetadata {
                title: task.title,
                video_id,
                reference_id: task.reference_id,
                content_id: task.content_id,
                fetched_at: Utc::now().to_rfc3339(),
                status: VideoStatus::Failed,
                failure: Some(failure.clone()),
                segments: BTreeMap::new(),
            };
            if let Err(e) = worker.store.write_metadata(&metadata).await {
                tracing::warn!("Could not record aborted video {}: {}", video_id, e);
            }
        }
        reports.push(VideoReport {
            index,
            video_id: task.numeric_id,
            status: VideoStatus::Failed,
            segments: 0,
            failure: Some(failure),
            skip_reason: None,
        });
    }

    reports
}
