//! Configuration module for Danmaku-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use danmaku_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Batches of {} videos", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClientErrorPolicy, Config, CrawlerConfig, EndpointConfig, IdentityEntry, OutputConfig,
    OutputFormat, PathsConfig, RelayCredentials,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
