//! CSV output handler
//!
//! Writes UTF-8 with a byte-order mark so spreadsheet tools detect the
//! encoding, and quotes fields per RFC 4180. The summary goes to a
//! `<stem>.summary.json` file next to the CSV.

use crate::output::traits::{AssemblySummary, OutputHandler, OutputResult, TaggedRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADER: [&str; 15] = [
    "video_id",
    "title",
    "content_id",
    "segment_index",
    "id",
    "offset_ms",
    "offset_secs",
    "text",
    "display_mode",
    "font_size",
    "color",
    "post_time",
    "weight",
    "pool",
    "author_hash",
];

/// CSV output handler
pub struct CsvOutputHandler {
    path: PathBuf,
}

impl CsvOutputHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the summary file written beside the CSV
    pub fn summary_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.path.with_file_name(format!("{}.summary.json", stem))
    }
}

impl OutputHandler for CsvOutputHandler {
    fn write_records(&self, records: &[TaggedRecord]) -> OutputResult<()> {
        create_parent(&self.path)?;
        let mut out = BufWriter::new(File::create(&self.path)?);

        out.write_all(BOM)?;
        writeln!(out, "{}", HEADER.join(","))?;

        for tagged in records {
            let r = &tagged.record;
            let row = [
                tagged.video_id.to_string(),
                escape_field(&tagged.title),
                tagged
                    .content_id
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                tagged.segment_index.to_string(),
                r.id.to_string(),
                r.offset_ms.to_string(),
                format!("{:.3}", r.offset_secs()),
                escape_field(&r.text),
                r.display_mode.to_string(),
                r.font_size.to_string(),
                r.color.to_string(),
                r.post_time.to_string(),
                r.weight.to_string(),
                r.pool.to_string(),
                escape_field(&r.author_hash),
            ];
            writeln!(out, "{}", row.join(","))?;
        }

        out.flush()?;
        Ok(())
    }

    fn write_summary(&self, summary: &AssemblySummary) -> OutputResult<()> {
        let path = self.summary_path();
        create_parent(&path)?;
        std::fs::write(&path, serde_json::to_vec_pretty(summary)?)?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Quotes a field if it contains a delimiter, quote or line break
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
