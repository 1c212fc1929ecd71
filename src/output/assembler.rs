//! Record assembly from persisted artifacts
//!
//! Walks every video directory under the data root, decodes each stored
//! segment in index order and tags the records with their origin. A segment
//! that cannot be read or decoded is reported and skipped; the rest of the
//! video is kept.

use crate::decoder::decode_segment;
use crate::output::traits::{AssemblySummary, OutputResult, SegmentFailure, TaggedRecord};
use crate::storage::ArtifactStore;
use std::path::Path;

/// Records and statistics produced by one assembly pass
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub records: Vec<TaggedRecord>,
    pub summary: AssemblySummary,
}

/// Assembles every artifact under `data_dir`
///
/// Videos are visited in directory-name order; within a video, records keep
/// segment order and in-segment order.
///
/// # Arguments
///
/// * `data_dir` - Root directory holding one directory per video
///
/// # Returns
///
/// * `Ok(Assembly)` - All decodable records plus the summary
/// * `Err(OutputError)` - The data root itself could not be listed
pub fn assemble(data_dir: &Path) -> OutputResult<Assembly> {
    let store = ArtifactStore::new(data_dir);
    let mut assembly = Assembly::default();

    for dir in store.list_videos()? {
        let metadata = match ArtifactStore::read_metadata(&dir) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", dir.display(), e);
                continue;
            }
        };
        assembly.summary.videos_scanned += 1;

        let before = assembly.records.len();
        for (&index, descriptor) in &metadata.segments {
            let path = ArtifactStore::segment_path(&dir, descriptor);

            let decoded = std::fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| decode_segment(&bytes).map_err(|e| e.to_string()));

            match decoded {
                Ok(records) => {
                    assembly.summary.segments_decoded += 1;
                    assembly
                        .records
                        .extend(records.into_iter().map(|record| TaggedRecord {
                            video_id: metadata.video_id,
                            title: metadata.title.clone(),
                            content_id: metadata.content_id,
                            segment_index: index,
                            record,
                        }));
                }
                Err(reason) => {
                    tracing::warn!(
                        "Video {} segment {} unusable: {}",
                        metadata.video_id,
                        index,
                        reason
                    );
                    assembly.summary.segments_failed += 1;
                    assembly.summary.failures.push(SegmentFailure {
                        video_id: metadata.video_id,
                        segment_index: index,
                        file: path,
                        reason,
                    });
                }
            }
        }

        let added = assembly.records.len() - before;
        if added > 0 {
            assembly.summary.distinct_videos += 1;
        }
        tracing::debug!("Video {}: {} records", metadata.video_id, added);
    }

    assembly.summary.total_records = assembly.records.len();
    assembly.summary.finish();

    tracing::info!(
        "Assembled {} records from {} videos ({} segments failed)",
        assembly.summary.total_records,
        assembly.summary.distinct_videos,
        assembly.summary.segments_failed
    );

    Ok(assembly)
}
