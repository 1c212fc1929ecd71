//! HTTP fetcher for comment segments
//!
//! This module handles all requests to the segment endpoint, including:
//! - Building the shared HTTP client (timeout, compression, optional relay)
//! - Pacing jitter between consecutive segments of a video
//! - Retry logic with linear backoff per failure class
//! - Status classification and end-of-stream detection

use crate::config::{ClientErrorPolicy, Config, CrawlerConfig, RelayCredentials};
use crate::crawler::governor::RateGovernor;
use crate::state::FetchFailure;
use crate::ConfigError;
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Result of fetching one segment index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// A full payload; persist it and advance to the next index
    Continue(Vec<u8>),

    /// The stream has no more segments
    StreamEnded,

    /// Retries were exhausted
    Failed { failure: FetchFailure, attempts: u32 },
}

/// Builds the HTTP client shared by every worker
///
/// # Arguments
///
/// * `config` - Crawler settings (request timeout)
/// * `relay` - Optional relay; all requests are tunnelled through it
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client or proxy
pub fn build_http_client(
    config: &CrawlerConfig,
    relay: Option<&RelayCredentials>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(config.request_timeout())
        .gzip(true)
        .brotli(true);

    if let Some(relay) = relay {
        tracing::info!("Routing requests through relay {}", relay.proxy_url());
        builder = builder.proxy(relay.to_proxy()?);
    }

    builder.build()
}

/// Maps a response status to a failure class
///
/// Returns `None` for success statuses. Anything that is neither 2xx nor
/// 4xx counts as server-class.
pub fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    if status.is_success() {
        None
    } else if status.is_client_error() {
        Some(FetchFailure::Client {
            status: status.as_u16(),
        })
    } else {
        Some(FetchFailure::Server {
            status: status.as_u16(),
        })
    }
}

/// Attempt limit and backoff bases per failure class
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub transport_backoff: Duration,
    pub server_backoff: Duration,
    pub client_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            transport_backoff: Duration::from_millis(config.transport_backoff_ms),
            server_backoff: Duration::from_millis(config.server_backoff_ms),
            client_backoff: Duration::from_millis(config.client_backoff_ms),
        }
    }

    /// Linear backoff: the class base times the 1-based attempt number
    pub fn backoff_for(&self, failure: &FetchFailure, attempt: u32) -> Duration {
        let base = match failure {
            FetchFailure::Client { .. } => self.client_backoff,
            FetchFailure::Server { .. } => self.server_backoff,
            _ => self.transport_backoff,
        };
        base * attempt
    }
}

/// Jittered delay applied before each segment of a video
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);
        Self { min_ms, max_ms }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Draws a delay uniformly from `[min, max]`
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    pub async fn pause(&self) {
        if self.max_ms == 0 {
            return;
        }
        let delay = self.sample(&mut rand::thread_rng());
        tokio::time::sleep(delay).await;
    }
}

/// Fetches single segments with governor, retries and classification
pub struct SegmentFetcher {
    client: Client,
    endpoint: Url,
    governor: Arc<RateGovernor>,
    retry: RetryPolicy,
    threshold: usize,
    client_error_policy: ClientErrorPolicy,
}

impl SegmentFetcher {
    /// Creates a fetcher for the configured endpoint
    pub fn new(
        client: Client,
        config: &Config,
        governor: Arc<RateGovernor>,
    ) -> Result<Self, ConfigError> {
        let raw = format!(
            "{}{}",
            config.endpoint.base_url.trim_end_matches('/'),
            config.endpoint.segment_path
        );
        let endpoint =
            Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))?;

        Ok(Self {
            client,
            endpoint,
            governor,
            retry: RetryPolicy::from_config(&config.crawler),
            threshold: config.crawler.segment_threshold,
            client_error_policy: config.crawler.client_error_policy,
        })
    }

    /// Builds the request URL for one segment
    pub fn segment_url(&self, content_id: u64, numeric_id: u64, index: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("type", "1")
            .append_pair("oid", &content_id.to_string())
            .append_pair("pid", &numeric_id.to_string())
            .append_pair("segment_index", &index.to_string());
        url
    }

    /// Fetches one segment, retrying per the retry policy
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx, body ≤ threshold | StreamEnded |
    /// | 2xx, body > threshold | Continue |
    /// | Transport error | Retry, transport base × attempt |
    /// | 4xx | Retry, client base × attempt |
    /// | Other non-2xx | Retry, server base × attempt |
    ///
    /// Every attempt takes a governor token. No backoff follows the last attempt.
    pub async fn fetch_segment(
        &self,
        content_id: u64,
        numeric_id: u64,
        index: u32,
        headers: &HeaderMap,
    ) -> SegmentOutcome {
        let url = self.segment_url(content_id, numeric_id, index);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.governor.acquire().await;

            let failure = match self.attempt(&url, headers).await {
                Ok(body) if body.len() <= self.threshold => {
                    tracing::debug!(
                        "Segment {} of video {} is {} bytes, stream ended",
                        index,
                        numeric_id,
                        body.len()
                    );
                    return SegmentOutcome::StreamEnded;
                }
                Ok(body) => return SegmentOutcome::Continue(body),
                Err(failure) => failure,
            };

            if attempt >= self.retry.max_attempts {
                tracing::warn!(
                    "Segment {} of video {} failed after {} attempts: {}",
                    index,
                    numeric_id,
                    attempt,
                    failure
                );
                if matches!(failure, FetchFailure::Client { .. })
                    && self.client_error_policy == ClientErrorPolicy::EndStream
                {
                    return SegmentOutcome::StreamEnded;
                }
                return SegmentOutcome::Failed {
                    failure,
                    attempts: attempt,
                };
            }

            let backoff = self.retry.backoff_for(&failure, attempt);
            tracing::debug!(
                "Segment {} of video {} attempt {} failed ({}), retrying in {:?}",
                index,
                numeric_id,
                attempt,
                failure,
                backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn attempt(&self, url: &Url, headers: &HeaderMap) -> Result<Vec<u8>, FetchFailure> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(transport_failure)?;

        if let Some(failure) = classify_status(response.status()) {
            return Err(failure);
        }

        let body = response.bytes().await.map_err(transport_failure)?;
        Ok(body.to_vec())
    }
}

fn transport_failure(e: reqwest::Error) -> FetchFailure {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    FetchFailure::Transport { message }
}
