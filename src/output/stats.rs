//! Console reporting for harvest runs and assemblies
//!
//! This module renders run and assembly statistics for the terminal.

use crate::crawler::CrawlReport;
use crate::output::traits::AssemblySummary;

/// Renders a harvest report as text
pub fn format_crawl_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    out.push_str("=== Harvest Report ===\n\n");
    out.push_str(&format!("  Catalog size: {}\n", report.total_videos));
    out.push_str(&format!("  Started at index: {}\n", report.start_index));
    out.push_str(&format!("  Videos processed: {}\n", report.processed));
    out.push_str(&format!("  Completed: {}\n", report.completed));
    out.push_str(&format!("  Failed: {}\n", report.failed));
    out.push_str(&format!("  Skipped: {}\n", report.skipped));
    out.push_str(&format!("  Segments fetched: {}\n", report.segments_fetched));

    if let Some(checkpoint) = &report.checkpoint {
        out.push_str(&format!(
            "\n  Checkpoint: index {} ({} succeeded in total)\n",
            checkpoint.last_processed_index, checkpoint.success_count
        ));
    }

    let success_rate = if report.processed > 0 {
        (report.completed as f64 / report.processed as f64) * 100.0
    } else {
        0.0
    };
    out.push_str(&format!(
        "\nSuccess Rate: {:.1}% ({} / {} videos)\n",
        success_rate, report.completed, report.processed
    ));

    out
}

/// Prints a harvest report to stdout
pub fn print_crawl_report(report: &CrawlReport) {
    print!("{}", format_crawl_report(report));
}

/// Renders an assembly summary as text
///
/// At most `max_failures` segment failures are listed individually.
pub fn format_summary(summary: &AssemblySummary, max_failures: usize) -> String {
    let mut out = String::new();

    out.push_str("=== Assembly Summary ===\n\n");
    out.push_str(&format!("  Total records: {}\n", summary.total_records));
    out.push_str(&format!("  Videos with records: {}\n", summary.distinct_videos));
    out.push_str(&format!(
        "  Average records per video: {:.2}\n",
        summary.average_per_video
    ));
    out.push_str(&format!("  Videos scanned: {}\n", summary.videos_scanned));
    out.push_str(&format!("  Segments decoded: {}\n", summary.segments_decoded));
    out.push_str(&format!("  Segments failed: {}\n", summary.segments_failed));

    if !summary.failures.is_empty() {
        out.push_str("\nFailed Segments:\n");
        for failure in summary.failures.iter().take(max_failures) {
            out.push_str(&format!(
                "  - video {} segment {}: {}\n",
                failure.video_id, failure.segment_index, failure.reason
            ));
        }
        if summary.failures.len() > max_failures {
            out.push_str(&format!(
                "  ... and {} more\n",
                summary.failures.len() - max_failures
            ));
        }
    }

    out
}

/// Prints an assembly summary to stdout
pub fn print_summary(summary: &AssemblySummary) {
    print!("{}", format_summary(summary, 20));
}
