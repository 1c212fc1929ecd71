//! Output module for assembling and exporting decoded comments
//!
//! This module handles:
//! - Assembling tagged records from every persisted artifact
//! - Exporting records as CSV or into a SQLite database
//! - Rendering run and assembly statistics

mod assembler;
mod csv_output;
mod sqlite_output;
pub mod stats;
mod traits;

pub use assembler::{assemble, Assembly};
pub use csv_output::{escape_field, CsvOutputHandler};
pub use sqlite_output::SqliteOutputHandler;
pub use stats::{print_crawl_report, print_summary};
pub use traits::{
    AssemblySummary, OutputError, OutputHandler, OutputResult, SegmentFailure, TaggedRecord,
};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;

/// Builds the handler for the configured output format
pub fn handler_for(config: &OutputConfig) -> Box<dyn OutputHandler> {
    match config.format {
        OutputFormat::Csv => Box::new(CsvOutputHandler::new(&config.path)),
        OutputFormat::Sqlite => Box::new(SqliteOutputHandler::new(&config.path)),
    }
}

/// Assembles all artifacts under `data_dir` and writes them out
///
/// # Arguments
///
/// * `data_dir` - Root directory of the per-video artifacts
/// * `config` - Output path and format
///
/// # Returns
///
/// * `Ok(AssemblySummary)` - Records and summary written
/// * `Err(OutputError)` - Listing the data root or writing output failed
pub fn export(data_dir: &Path, config: &OutputConfig) -> OutputResult<AssemblySummary> {
    let assembly = assemble(data_dir)?;
    let handler = handler_for(config);

    handler.write_records(&assembly.records)?;
    handler.write_summary(&assembly.summary)?;
    tracing::info!(
        "Wrote {} records to {}",
        assembly.summary.total_records,
        handler.location().display()
    );

    Ok(assembly.summary)
}
