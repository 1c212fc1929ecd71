//! Integration tests for the fetch engine
//!
//! These tests use wiremock to stand in for the segment endpoint and drive
//! full harvest runs against a temporary data directory.

use danmaku_harvester::config::{
    ClientErrorPolicy, Config, CrawlerConfig, EndpointConfig, OutputConfig, OutputFormat,
    PathsConfig,
};
use danmaku_harvester::crawler::{crawl, CrawlOptions, Coordinator};
use danmaku_harvester::decoder::encode_segment;
use danmaku_harvester::state::{FetchFailure, VideoStatus};
use danmaku_harvester::storage::{ArtifactStore, Checkpoint, ProgressTracker};
use danmaku_harvester::CommentRecord;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEGMENT_PATH: &str = "/x/v2/dm/web/seg.so";

/// Creates a test configuration pointing at the mock server, with no pacing
/// and millisecond backoffs
fn create_test_config(server_uri: &str, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            concurrency: 2,
            max_retries: 3,
            max_segments: 10,
            min_delay_ms: 0,
            max_delay_ms: 0,
            rate_limit: Some(1000.0),
            transport_backoff_ms: 1,
            server_backoff_ms: 1,
            client_backoff_ms: 1,
            ..CrawlerConfig::default()
        },
        endpoint: EndpointConfig {
            base_url: server_uri.to_string(),
            segment_path: SEGMENT_PATH.to_string(),
        },
        paths: PathsConfig {
            catalog: dir.join("catalog.json").to_string_lossy().into_owned(),
            data_dir: dir.join("segments").to_string_lossy().into_owned(),
            checkpoint: dir.join("progress.json").to_string_lossy().into_owned(),
        },
        output: OutputConfig {
            path: dir.join("all_comments.csv").to_string_lossy().into_owned(),
            format: OutputFormat::Csv,
        },
        relay: None,
        identities: vec![],
    }
}

/// Writes a catalog of `(aid, cid)` entries in the given order
fn write_catalog(dir: &Path, videos: &[(u64, Option<u64>)]) {
    let mut catalog = serde_json::Map::new();
    for (aid, cid) in videos {
        let mut entry = serde_json::json!({
            "aid": aid,
            "bvid": format!("BV{}", aid),
            "title": format!("<em class=\"keyword\">Video</em> {}", aid),
        });
        if let Some(cid) = cid {
            entry["cid_info"] = serde_json::json!({
                "main_cid": cid,
                "title": format!("Video {}", aid),
            });
        }
        catalog.insert(format!("http://www.bilibili.com/video/av{}", aid), entry);
    }
    std::fs::write(
        dir.join("catalog.json"),
        serde_json::to_string_pretty(&catalog).unwrap(),
    )
    .unwrap();
}

/// A well-formed segment payload comfortably above the end-of-stream threshold
fn full_segment(tag: &str) -> Vec<u8> {
    let records: Vec<CommentRecord> = (0..3)
        .map(|i| CommentRecord {
            id: 1000 + i,
            offset_ms: 1000 * i as i32,
            text: format!("{} comment number {}", tag, i),
            display_mode: 1,
            font_size: 25,
            color: 0xFFFFFF,
            post_time: 1_700_000_000,
            author_hash: "a1b2c3d4".to_string(),
            ..CommentRecord::default()
        })
        .collect();
    let bytes = encode_segment(&records);
    assert!(bytes.len() > 40);
    bytes
}

async fn mount_segment(server: &MockServer, cid: u64, index: u32, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .and(query_param("oid", cid.to_string()))
        .and(query_param("segment_index", index.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn read_metadata(dir: &Path, aid: u64) -> danmaku_harvester::storage::VideoMetadata {
    ArtifactStore::read_metadata(&dir.join("segments").join(aid.to_string())).unwrap()
}

#[tokio::test]
async fn test_undersized_second_segment_ends_stream() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(100, Some(9100))]);

    mount_segment(&server, 9100, 1, full_segment("first")).await;
    mount_segment(&server, 9100, 2, vec![0u8; 12]).await;

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.segments_fetched, 1);

    let meta = read_metadata(tmp.path(), 100);
    assert_eq!(meta.status, VideoStatus::Completed);
    assert!(meta.failure.is_none());
    assert_eq!(meta.segments.keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(meta.segments[&1].start_time, "0:00");
    assert_eq!(meta.segments[&1].end_time, "6:00");
    assert_eq!(meta.title, "Video 100");

    let video_dir = tmp.path().join("segments").join("100");
    assert!(video_dir.join("segment_1.bin").exists());
    assert!(!video_dir.join("segment_2.bin").exists());

    // segment 3 is never requested
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_persistent_server_errors_fail_video() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(200, Some(9200))]);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 0);

    let meta = read_metadata(tmp.path(), 200);
    assert_eq!(meta.status, VideoStatus::Failed);
    assert!(meta.segments.is_empty());

    let failure = meta.failure.unwrap();
    assert_eq!(failure.segment_index, 1);
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.failure, FetchFailure::Server { status: 500 });
}

#[tokio::test]
async fn test_retry_recovers_after_transient_error() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(300, Some(9300))]);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .and(query_param("segment_index", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_segment(&server, 9300, 1, full_segment("retry")).await;
    mount_segment(&server, 9300, 2, Vec::new()).await;

    let config = create_test_config(&server.uri(), tmp.path());
    crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    let meta = read_metadata(tmp.path(), 300);
    assert_eq!(meta.status, VideoStatus::Completed);
    assert_eq!(meta.segments.len(), 1);
}

#[tokio::test]
async fn test_segment_indices_are_contiguous() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(400, Some(9400))]);

    for index in 1..=3 {
        mount_segment(&server, 9400, index, full_segment(&format!("seg{}", index))).await;
    }
    mount_segment(&server, 9400, 4, Vec::new()).await;

    let config = create_test_config(&server.uri(), tmp.path());
    crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    let meta = read_metadata(tmp.path(), 400);
    assert!(meta.segments_contiguous());
    assert_eq!(meta.segments.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(meta.segments[&3].start_time, "12:00");
}

#[tokio::test]
async fn test_segment_limit_completes_video() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(500, Some(9500))]);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(full_segment("endless")))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri(), tmp.path());
    config.crawler.max_segments = 2;
    crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    let meta = read_metadata(tmp.path(), 500);
    assert_eq!(meta.status, VideoStatus::Completed);
    assert_eq!(meta.segments.len(), 2);
}

#[tokio::test]
async fn test_missing_content_id_is_skipped_without_requests() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(600, None)]);

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert!(server.received_requests().await.unwrap().is_empty());

    let meta = read_metadata(tmp.path(), 600);
    assert_eq!(meta.status, VideoStatus::Skipped);
    assert!(meta.segments.is_empty());
    assert_eq!(meta.content_id, None);
}

#[tokio::test]
async fn test_requests_carry_identity_and_ids() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(700, Some(9700))]);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .and(query_param("type", "1"))
        .and(query_param("oid", "9700"))
        .and(query_param("pid", "700"))
        .and(query_param("segment_index", "1"))
        .and(header_exists("user-agent"))
        .and(header_exists("referer"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();
    assert_eq!(report.completed, 1);
}

#[tokio::test]
async fn test_client_error_policy() {
    for (policy, expected) in [
        (ClientErrorPolicy::Fail, VideoStatus::Failed),
        (ClientErrorPolicy::EndStream, VideoStatus::Completed),
    ] {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        write_catalog(tmp.path(), &[(800, Some(9800))]);

        mount_segment(&server, 9800, 1, full_segment("before throttle")).await;
        Mock::given(method("GET"))
            .and(path(SEGMENT_PATH))
            .and(query_param("segment_index", "2"))
            .respond_with(ResponseTemplate::new(412))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = create_test_config(&server.uri(), tmp.path());
        config.crawler.client_error_policy = policy;
        crawl(config, "hash".to_string(), CrawlOptions::default())
            .await
            .unwrap();

        let meta = read_metadata(tmp.path(), 800);
        assert_eq!(meta.status, expected, "policy {:?}", policy);
        assert_eq!(meta.segments.len(), 1);
        if expected == VideoStatus::Failed {
            assert_eq!(
                meta.failure.unwrap().failure,
                FetchFailure::Client { status: 412 }
            );
        }
    }
}

#[tokio::test]
async fn test_checkpoint_after_batches_and_resume() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let videos: Vec<(u64, Option<u64>)> = (1..=5).map(|i| (i, Some(9000 + i))).collect();
    write_catalog(tmp.path(), &videos);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config.clone(), "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.processed, 5);
    let checkpoint = report.checkpoint.unwrap();
    assert_eq!(checkpoint.last_processed_index, 4);
    assert_eq!(checkpoint.total_videos, 5);
    assert_eq!(checkpoint.success_count, 5);

    let stored = ProgressTracker::new(&config.paths.checkpoint)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(stored, checkpoint);

    // a second run finds nothing left to do
    let before = server.received_requests().await.unwrap().len();
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.start_index, 5);
    assert_eq!(server.received_requests().await.unwrap().len(), before);
}

#[tokio::test]
async fn test_resume_starts_after_checkpoint() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let videos: Vec<(u64, Option<u64>)> = (1..=5).map(|i| (i, Some(9000 + i))).collect();
    write_catalog(tmp.path(), &videos);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    ProgressTracker::new(&config.paths.checkpoint)
        .record(&Checkpoint::new(2, 5, 3, 0, 0, Some("hash".to_string())))
        .await
        .unwrap();

    let mut coordinator =
        Coordinator::new(config.clone(), "hash".to_string(), CrawlOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.start_index, 3);
    assert_eq!(report.processed, 2);

    let mut pids: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "pid")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    pids.sort();
    assert_eq!(pids, vec!["4".to_string(), "5".to_string()]);

    let checkpoint = report.checkpoint.unwrap();
    assert_eq!(checkpoint.last_processed_index, 4);
    assert_eq!(checkpoint.success_count, 5);

    // videos before the resume point were never touched
    let data = ArtifactStore::new(&config.paths.data_dir);
    assert!(!data.video_dir(1).exists());
    assert!(data.video_dir(4).exists());
}

fn write_raw_catalog(dir: &Path, catalog: serde_json::Value) {
    std::fs::write(
        dir.join("catalog.json"),
        serde_json::to_string_pretty(&catalog).unwrap(),
    )
    .unwrap();
}

async fn requested(server: &MockServer, key: &str) -> Vec<String> {
    let mut values: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    values.sort();
    values
}

fn catalog_with_missing_aid() -> serde_json::Value {
    serde_json::json!({
        "ref0": {"bvid": "BV0", "title": "no aid"},
        "ref1": {"aid": 11, "cid_info": {"main_cid": 110}},
        "ref2": {"aid": 22, "cid_info": {"main_cid": 220}}
    })
}

#[tokio::test]
async fn test_entry_without_video_id_is_skipped_in_place() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_raw_catalog(tmp.path(), catalog_with_missing_aid());

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_videos, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 2);
    assert_eq!(report.checkpoint.unwrap().last_processed_index, 2);
    assert_eq!(requested(&server, "pid").await, vec!["11", "22"]);
}

#[tokio::test]
async fn test_resume_counts_entries_without_video_id() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_raw_catalog(tmp.path(), catalog_with_missing_aid());

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    ProgressTracker::new(&config.paths.checkpoint)
        .record(&Checkpoint::new(0, 3, 0, 0, 1, None))
        .await
        .unwrap();

    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.start_index, 1);
    assert_eq!(report.processed, 2);
    assert_eq!(requested(&server, "pid").await, vec!["11", "22"]);

    let checkpoint = report.checkpoint.unwrap();
    assert_eq!(checkpoint.last_processed_index, 2);
    assert_eq!(checkpoint.skipped_count, 1);
}

#[tokio::test]
async fn test_repeated_video_id_fetched_once() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_raw_catalog(
        tmp.path(),
        serde_json::json!({
            "http://www.bilibili.com/video/av5": {"aid": 5, "cid_info": {"main_cid": 1}},
            "https://www.bilibili.com/video/av5": {"aid": 5, "cid_info": {"main_cid": 2}}
        }),
    );

    mount_segment(&server, 1, 1, full_segment("only")).await;
    mount_segment(&server, 1, 2, vec![0u8; 8]).await;

    let config = create_test_config(&server.uri(), tmp.path());
    let report = crawl(config, "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(requested(&server, "oid").await, vec!["1", "1"]);

    let meta = read_metadata(tmp.path(), 5);
    assert_eq!(meta.status, VideoStatus::Completed);
    assert_eq!(meta.content_id, Some(1));
    assert_eq!(meta.segments.len(), 1);
}

#[tokio::test]
async fn test_start_index_override_and_fresh() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let videos: Vec<(u64, Option<u64>)> = (1..=4).map(|i| (i, Some(9000 + i))).collect();
    write_catalog(tmp.path(), &videos);

    Mock::given(method("GET"))
        .and(path(SEGMENT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), tmp.path());
    ProgressTracker::new(&config.paths.checkpoint)
        .record(&Checkpoint::new(3, 4, 4, 0, 0, None))
        .await
        .unwrap();

    let override_options = CrawlOptions {
        fresh: false,
        start_index: Some(2),
    };
    let report = crawl(config.clone(), "hash".to_string(), override_options)
        .await
        .unwrap();
    assert_eq!(report.start_index, 2);
    assert_eq!(report.processed, 2);

    let fresh_options = CrawlOptions {
        fresh: true,
        start_index: None,
    };
    let report = crawl(config, "hash".to_string(), fresh_options)
        .await
        .unwrap();
    assert_eq!(report.start_index, 0);
    assert_eq!(report.processed, 4);
    assert_eq!(report.checkpoint.unwrap().success_count, 4);
}

#[tokio::test]
async fn test_start_index_past_catalog_does_nothing() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    write_catalog(tmp.path(), &[(1, Some(9001))]);

    let mut config = create_test_config(&server.uri(), tmp.path());
    config.crawler.start_index = 7;
    let report = crawl(config.clone(), "hash".to_string(), CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert!(report.checkpoint.is_none());
    assert!(!Path::new(&config.paths.checkpoint).exists());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_catalog_is_fatal() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    let config = create_test_config(&server.uri(), tmp.path());
    let result = crawl(config, "hash".to_string(), CrawlOptions::default()).await;
    assert!(matches!(
        result,
        Err(danmaku_harvester::HarvestError::Catalog(_))
    ));
}
