//! Integration tests for record assembly and export
//!
//! Artifacts are laid out on disk the way the fetch engine writes them, then
//! assembled and exported through both output formats.

use danmaku_harvester::config::{OutputConfig, OutputFormat};
use danmaku_harvester::decoder::encode_segment;
use danmaku_harvester::output::{assemble, export};
use danmaku_harvester::state::VideoStatus;
use danmaku_harvester::storage::{segment_file_name, SegmentDescriptor, VideoMetadata};
use danmaku_harvester::CommentRecord;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

fn comments(prefix: &str, count: usize) -> Vec<CommentRecord> {
    (0..count)
        .map(|i| CommentRecord {
            id: i as i64 + 1,
            offset_ms: (i as i32 + 1) * 750,
            text: format!("{} #{}", prefix, i),
            display_mode: 1,
            font_size: 25,
            color: 0xFFFFFF,
            post_time: 1_700_000_000 + i as i64,
            author_hash: format!("{:08x}", i),
            ..CommentRecord::default()
        })
        .collect()
}

/// Writes one video's artifact: each payload becomes `segment_<n>.bin`
fn write_video(root: &Path, video_id: u64, title: &str, payloads: &[Vec<u8>]) {
    let dir = root.join(video_id.to_string());
    std::fs::create_dir_all(&dir).unwrap();

    let mut segments = BTreeMap::new();
    for (i, payload) in payloads.iter().enumerate() {
        let index = i as u32 + 1;
        std::fs::write(dir.join(segment_file_name(index)), payload).unwrap();
        segments.insert(
            index,
            SegmentDescriptor::new(index, payload.len() as u64, chrono::Utc::now()),
        );
    }

    let metadata = VideoMetadata {
        title: title.to_string(),
        video_id,
        reference_id: None,
        content_id: Some(video_id * 10),
        fetched_at: chrono::Utc::now().to_rfc3339(),
        status: VideoStatus::Completed,
        failure: None,
        segments,
    };
    std::fs::write(
        dir.join("metadata.json"),
        serde_json::to_vec_pretty(&metadata).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_truncated_segment_excluded_siblings_kept() {
    let tmp = TempDir::new().unwrap();

    let good_first = encode_segment(&comments("first", 3));
    let mut truncated = encode_segment(&comments("second", 2));
    truncated.truncate(truncated.len() - 5);
    let good_third = encode_segment(&comments("third", 4));
    write_video(tmp.path(), 11, "Mixed", &[good_first, truncated, good_third]);

    let assembly = assemble(tmp.path()).unwrap();

    assert_eq!(assembly.records.len(), 7);
    assert_eq!(assembly.summary.segments_decoded, 2);
    assert_eq!(assembly.summary.segments_failed, 1);
    assert_eq!(assembly.summary.failures[0].segment_index, 2);
    assert_eq!(assembly.summary.failures[0].video_id, 11);

    let segments: Vec<u32> = assembly.records.iter().map(|r| r.segment_index).collect();
    assert_eq!(segments, vec![1, 1, 1, 3, 3, 3, 3]);
    assert_eq!(assembly.records[0].record.text, "first #0");
    assert_eq!(assembly.records[3].record.text, "third #0");
}

#[test]
fn test_summary_counts_and_order() {
    let tmp = TempDir::new().unwrap();

    write_video(tmp.path(), 2, "Second", &[encode_segment(&comments("b", 2))]);
    write_video(
        tmp.path(),
        1,
        "First",
        &[
            encode_segment(&comments("a1", 3)),
            encode_segment(&comments("a2", 1)),
        ],
    );
    // a video whose only segment decodes to nothing
    write_video(tmp.path(), 3, "Quiet", &[Vec::new()]);

    let assembly = assemble(tmp.path()).unwrap();
    let summary = &assembly.summary;

    assert_eq!(summary.total_records, 6);
    assert_eq!(summary.distinct_videos, 2);
    assert_eq!(summary.videos_scanned, 3);
    assert!((summary.average_per_video - 3.0).abs() < f64::EPSILON);

    let videos: Vec<u64> = assembly.records.iter().map(|r| r.video_id).collect();
    assert_eq!(videos, vec![1, 1, 1, 1, 2, 2]);
    assert_eq!(assembly.records[0].title, "First");
    assert_eq!(assembly.records[0].content_id, Some(10));
}

#[test]
fn test_missing_segment_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    write_video(
        tmp.path(),
        5,
        "Gone",
        &[
            encode_segment(&comments("kept", 2)),
            encode_segment(&comments("lost", 2)),
        ],
    );
    std::fs::remove_file(tmp.path().join("5").join("segment_2.bin")).unwrap();

    let assembly = assemble(tmp.path()).unwrap();
    assert_eq!(assembly.records.len(), 2);
    assert_eq!(assembly.summary.segments_failed, 1);
}

#[test]
fn test_unreadable_sidecar_skips_video() {
    let tmp = TempDir::new().unwrap();
    write_video(tmp.path(), 1, "Fine", &[encode_segment(&comments("ok", 1))]);

    let broken = tmp.path().join("2");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("metadata.json"), "{ truncated").unwrap();

    let assembly = assemble(tmp.path()).unwrap();
    assert_eq!(assembly.summary.videos_scanned, 1);
    assert_eq!(assembly.records.len(), 1);
}

#[test]
fn test_empty_data_dir() {
    let tmp = TempDir::new().unwrap();
    let assembly = assemble(tmp.path()).unwrap();

    assert!(assembly.records.is_empty());
    assert_eq!(assembly.summary.distinct_videos, 0);
    assert_eq!(assembly.summary.average_per_video, 0.0);
}

#[test]
fn test_missing_data_dir_is_error() {
    let tmp = TempDir::new().unwrap();
    assert!(assemble(&tmp.path().join("absent")).is_err());
}

#[test]
fn test_export_csv() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("segments");
    write_video(&data, 42, "Title, quoted \"x\"", &[encode_segment(&comments("c", 2))]);

    let config = OutputConfig {
        path: tmp.path().join("out").join("all.csv").to_string_lossy().into_owned(),
        format: OutputFormat::Csv,
    };
    let summary = export(&data, &config).unwrap();
    assert_eq!(summary.total_records, 2);

    let bytes = std::fs::read(&config.path).unwrap();
    assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");
    let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("42,\"Title, quoted \"\"x\"\"\",420,1,"));

    assert!(tmp.path().join("out").join("all.summary.json").exists());
}

#[test]
fn test_export_sqlite() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("segments");
    write_video(&data, 7, "Seven", &[encode_segment(&comments("s", 3))]);
    write_video(&data, 8, "Eight", &[encode_segment(&comments("t", 1))]);

    let config = OutputConfig {
        path: tmp.path().join("comments.db").to_string_lossy().into_owned(),
        format: OutputFormat::Sqlite,
    };
    export(&data, &config).unwrap();

    let conn = rusqlite::Connection::open(&config.path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 4);

    let distinct: i64 = conn
        .query_row("SELECT distinct_videos FROM summary", [], |row| row.get(0))
        .unwrap();
    assert_eq!(distinct, 2);
}
