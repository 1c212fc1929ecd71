use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Main configuration structure for Danmaku-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    pub paths: PathsConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub relay: Option<RelayCredentials>,
    /// Replaces the built-in identity pool when non-empty
    #[serde(default)]
    pub identities: Vec<IdentityEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Global catalog index to start from when no checkpoint is resumed
    #[serde(rename = "start-index", default)]
    pub start_index: usize,

    /// Number of videos processed concurrently (also the batch size)
    #[serde(rename = "concurrency", default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum attempts per segment request
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on segment indices requested per video
    #[serde(rename = "max-segments", default = "default_max_segments")]
    pub max_segments: u32,

    /// Per-attempt request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Lower bound of the pacing delay before each segment (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the pacing delay before each segment (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Aggregate requests per second; defaults to `concurrency`
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: Option<f64>,

    /// Payloads of this many bytes or fewer mark the end of a stream
    #[serde(rename = "segment-threshold", default = "default_segment_threshold")]
    pub segment_threshold: usize,

    /// Backoff base after a transport failure (milliseconds)
    #[serde(rename = "transport-backoff-ms", default = "default_transport_backoff")]
    pub transport_backoff_ms: u64,

    /// Backoff base after a server-class status (milliseconds)
    #[serde(rename = "server-backoff-ms", default = "default_server_backoff")]
    pub server_backoff_ms: u64,

    /// Backoff base after a client-class status (milliseconds)
    #[serde(rename = "client-backoff-ms", default = "default_client_backoff")]
    pub client_backoff_ms: u64,

    /// What exhausted client-class failures mean for the stream
    #[serde(rename = "client-error-policy", default)]
    pub client_error_policy: ClientErrorPolicy,
}

impl CrawlerConfig {
    /// Effective aggregate request rate (requests per second)
    pub fn effective_rate(&self) -> f64 {
        self.rate_limit.unwrap_or(self.concurrency as f64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            max_segments: default_max_segments(),
            request_timeout_secs: default_request_timeout(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            rate_limit: None,
            segment_threshold: default_segment_threshold(),
            transport_backoff_ms: default_transport_backoff(),
            server_backoff_ms: default_server_backoff(),
            client_backoff_ms: default_client_backoff(),
            client_error_policy: ClientErrorPolicy::default(),
        }
    }
}

/// How a client-class failure that outlives its retries is interpreted
///
/// Upstream answers 4xx both for throttling and for some out-of-range
/// segment requests, so the meaning is left to the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientErrorPolicy {
    /// Record the video as failed at that segment
    #[default]
    Fail,
    /// Treat the segment as the end of the stream
    EndStream,
}

/// Upstream endpoint serving the comment segments
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    #[serde(rename = "segment-path", default = "default_segment_path")]
    pub segment_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            segment_path: default_segment_path(),
        }
    }
}

/// Input and working-file locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Video catalog produced by the identifier resolver
    pub catalog: String,

    /// Root directory holding one artifact directory per video
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Progress checkpoint file
    pub checkpoint: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the tabular output file
    pub path: String,

    #[serde(default)]
    pub format: OutputFormat,
}

/// Tabular output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

/// Credentials for the optional upstream relay (tunnel proxy)
#[derive(Clone, Deserialize)]
pub struct RelayCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl RelayCredentials {
    /// Proxy URL without the credentials embedded
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Builds the reqwest proxy with basic authentication attached
    pub fn to_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        Ok(reqwest::Proxy::all(self.proxy_url())?.basic_auth(&self.username, &self.password))
    }
}

impl fmt::Debug for RelayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One request identity from the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEntry {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    #[serde(default = "default_referer")]
    pub referer: String,

    #[serde(default = "default_accept")]
    pub accept: String,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    #[serde(rename = "cache-control", default = "default_cache_control")]
    pub cache_control: String,
}

fn default_concurrency() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_segments() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    10
}

fn default_min_delay() -> u64 {
    180
}

fn default_max_delay() -> u64 {
    220
}

fn default_segment_threshold() -> usize {
    40
}

fn default_transport_backoff() -> u64 {
    1000
}

fn default_server_backoff() -> u64 {
    1000
}

fn default_client_backoff() -> u64 {
    2000
}

fn default_base_url() -> String {
    "https://api.bilibili.com".to_string()
}

fn default_segment_path() -> String {
    "/x/v2/dm/web/seg.so".to_string()
}

pub(crate) fn default_referer() -> String {
    "https://www.bilibili.com/".to_string()
}

pub(crate) fn default_accept() -> String {
    "application/json, text/plain, */*".to_string()
}

pub(crate) fn default_accept_language() -> String {
    "zh-CN,zh;q=0.9,en;q=0.8".to_string()
}

pub(crate) fn default_cache_control() -> String {
    "no-cache".to_string()
}
