//! SQLite-based output handler implementation
//!
//! This module writes assembled records into a `comments` table and the
//! assembly statistics into a single-row `summary` table. Each export
//! replaces the previous contents.

use crate::output::traits::{AssemblySummary, OutputHandler, OutputResult, TaggedRecord};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = r#"
DROP TABLE IF EXISTS comments;
DROP TABLE IF EXISTS summary;

CREATE TABLE comments (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    content_id INTEGER,
    segment_index INTEGER NOT NULL,
    comment_id INTEGER NOT NULL,
    offset_ms INTEGER NOT NULL,
    text TEXT NOT NULL,
    display_mode INTEGER NOT NULL,
    font_size INTEGER NOT NULL,
    color INTEGER NOT NULL,
    post_time INTEGER NOT NULL,
    weight INTEGER NOT NULL,
    pool INTEGER NOT NULL,
    author_hash TEXT NOT NULL
);

CREATE INDEX idx_comments_video ON comments(video_id, segment_index);

CREATE TABLE summary (
    total_records INTEGER NOT NULL,
    distinct_videos INTEGER NOT NULL,
    average_per_video REAL NOT NULL,
    videos_scanned INTEGER NOT NULL,
    segments_decoded INTEGER NOT NULL,
    segments_failed INTEGER NOT NULL,
    generated_at TEXT NOT NULL
);
"#;

/// SQLite output handler
///
/// Records are written inside one transaction.
pub struct SqliteOutputHandler {
    path: PathBuf,
}

impl SqliteOutputHandler {
    /// Creates a new SQLite output handler
    ///
    /// # Arguments
    ///
    /// * `path` - Database file; created if missing
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> OutputResult<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(&self.path)?)
    }
}

impl OutputHandler for SqliteOutputHandler {
    fn write_records(&self, records: &[TaggedRecord]) -> OutputResult<()> {
        let mut conn = self.open()?;
        conn.execute_batch(SCHEMA_SQL)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO comments (video_id, title, content_id, segment_index, comment_id,
                     offset_ms, text, display_mode, font_size, color, post_time, weight, pool,
                     author_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;

            for tagged in records {
                let r = &tagged.record;
                stmt.execute(params![
                    tagged.video_id as i64,
                    tagged.title,
                    tagged.content_id.map(|c| c as i64),
                    tagged.segment_index,
                    r.id,
                    r.offset_ms,
                    r.text,
                    r.display_mode,
                    r.font_size,
                    r.color,
                    r.post_time,
                    r.weight,
                    r.pool,
                    r.author_hash,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }

    fn write_summary(&self, summary: &AssemblySummary) -> OutputResult<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM summary", [])?;
        conn.execute(
            "INSERT INTO summary (total_records, distinct_videos, average_per_video,
                 videos_scanned, segments_decoded, segments_failed, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.total_records as i64,
                summary.distinct_videos as i64,
                summary.average_per_video,
                summary.videos_scanned as i64,
                summary.segments_decoded as i64,
                summary.segments_failed as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
