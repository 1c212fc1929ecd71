//! Danmaku-Harvester main entry point
//!
//! This is the command-line interface for the comment-stream harvester.

use anyhow::Context;
use clap::Parser;
use danmaku_harvester::config::{load_config_with_hash, Config};
use danmaku_harvester::crawler::{crawl, CrawlOptions};
use danmaku_harvester::decoder::decode_segment;
use danmaku_harvester::output::{export, print_crawl_report, print_summary};
use danmaku_harvester::{load_catalog, IdentityRotator};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Danmaku-Harvester: a polite comment-stream harvester
///
/// Fetches time-sliced comment segments for every video in a catalog,
/// stores them as per-video artifacts, and assembles the decoded comments
/// into one table.
#[derive(Parser, Debug)]
#[command(name = "danmaku-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A polite comment-stream harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "inspect")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore the checkpoint and start from the configured index
    #[arg(long, conflicts_with = "start_index")]
    fresh: bool,

    /// Start at this global catalog index
    #[arg(long, value_name = "N")]
    start_index: Option<usize>,

    /// Validate config and catalog and show what would be fetched
    #[arg(long, conflicts_with_all = ["assemble", "inspect"])]
    dry_run: bool,

    /// Decode all stored segments into the configured output and exit
    #[arg(long, conflicts_with_all = ["dry_run", "inspect"])]
    assemble: bool,

    /// Decode a single segment file and print its first records
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "assemble"])]
    inspect: Option<PathBuf>,

    /// Number of records shown by --inspect
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Some(file) = &cli.inspect {
        return handle_inspect(file, cli.limit);
    }

    let config_path = cli
        .config
        .as_deref()
        .context("a configuration file is required")?;

    tracing::info!("Loading configuration from: {}", config_path.display());
    let (config, config_hash) = load_config_with_hash(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.assemble {
        handle_assemble(&config)
    } else {
        let options = CrawlOptions {
            fresh: cli.fresh,
            start_index: cli.start_index,
        };
        handle_crawl(config, config_hash, options).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("danmaku_harvester=info,warn"),
            1 => EnvFilter::new("danmaku_harvester=debug,info"),
            2 => EnvFilter::new("danmaku_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and catalog without fetching
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Danmaku-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency (batch size): {}", config.crawler.concurrency);
    println!("  Rate limit: {:.1} req/s", config.crawler.effective_rate());
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Max segments per video: {}", config.crawler.max_segments);
    println!(
        "  Pacing delay: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!(
        "  Client error policy: {:?}",
        config.crawler.client_error_policy
    );

    println!("\nEndpoint:");
    println!(
        "  {}{}",
        config.endpoint.base_url, config.endpoint.segment_path
    );
    match &config.relay {
        Some(relay) => println!("  Relay: {} (user {})", relay.proxy_url(), relay.username),
        None => println!("  Relay: none"),
    }

    let rotator = IdentityRotator::from_entries(&config.identities)?;
    println!("\nIdentities: {}", rotator.len());

    println!("\nPaths:");
    println!("  Catalog: {}", config.paths.catalog);
    println!("  Data directory: {}", config.paths.data_dir);
    println!("  Checkpoint: {}", config.paths.checkpoint);
    println!(
        "  Output: {} ({:?})",
        config.output.path, config.output.format
    );

    let tasks = load_catalog(Path::new(&config.paths.catalog))?;
    let unfetchable = tasks.iter().filter(|t| t.skip_reason().is_some()).count();
    let missing = tasks
        .iter()
        .filter(|t| t.skip_reason().is_none() && t.content_id.is_none())
        .count();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Catalog holds {} entries ({} without a content id and {} without a usable video id would be skipped)",
        tasks.len(),
        missing,
        unfetchable
    );

    Ok(())
}

/// Handles the --assemble mode: decodes every artifact into the output table
fn handle_assemble(config: &Config) -> anyhow::Result<()> {
    println!("Data directory: {}", config.paths.data_dir);
    println!("Output: {}\n", config.output.path);

    let summary = export(Path::new(&config.paths.data_dir), &config.output)
        .context("assembly failed")?;
    print_summary(&summary);

    Ok(())
}

/// Handles the --inspect mode: decodes one segment file
fn handle_inspect(file: &Path, limit: usize) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let records = decode_segment(&bytes)
        .with_context(|| format!("{} is not a valid segment", file.display()))?;

    println!("{}: {} bytes, {} records\n", file.display(), bytes.len(), records.len());
    for record in records.iter().take(limit) {
        println!(
            "  [{:>8.2}s] mode={} size={} color=#{:06X} {}",
            record.offset_secs(),
            record.display_mode,
            record.font_size,
            record.color,
            record.text
        );
    }
    if records.len() > limit {
        println!("  ... and {} more", records.len() - limit);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh harvest (ignoring checkpoint)");
    } else {
        tracing::info!("Starting harvest (will resume from checkpoint if present)");
    }

    let report = crawl(config, config_hash, options)
        .await
        .context("harvest failed")?;
    print_crawl_report(&report);

    Ok(())
}
