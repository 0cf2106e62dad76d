use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::materializer::{ClipArtifact, ClipMaterializer};
use super::pairing::PairingResolver;
use super::planner::plan_windows;
use crate::config::SegmentConfig;
use crate::video::VideoProcessor;

/// Batch outcome: every produced artifact plus the skip/failure counters the
/// logs summarize
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub videos_total: usize,
    pub videos_skipped: usize,
    pub clips_produced: usize,
    pub clips_failed: usize,
    pub intervals_skipped: usize,
    pub uncovered_seconds: f64,
    pub artifacts: Vec<ClipArtifact>,
}

/// Orchestrates pairing, window planning, and materialization over a batch of
/// trimmed videos.
///
/// Videos are processed sequentially: each materialization is a blocking
/// media re-encode that dominates wall time, so there is nothing to win by
/// interleaving windows of a single video, and one video's failure must never
/// abort the rest of the batch.
pub struct SegmentPipeline {
    config: SegmentConfig,
    video: VideoProcessor,
}

impl SegmentPipeline {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config,
            video: VideoProcessor::new(),
        }
    }

    pub async fn run(&self) -> Result<SegmentSummary> {
        let started = Instant::now();
        let materializer = ClipMaterializer::new(self.video.clone(), &self.config.output_dir);

        // Output root must be usable before any processing is attempted.
        materializer.ensure_dirs().await?;

        let resolver = PairingResolver::new(self.video.clone());
        let outcome = resolver
            .resolve_pairs(
                &self.config.raw_video_dir,
                &self.config.trimmed_video_dir,
                &self.config.caption_dir,
            )
            .await?;

        let mut summary = SegmentSummary {
            videos_total: outcome.pairs.len(),
            videos_skipped: outcome.missing_caption + outcome.inconsistent + outcome.unreadable,
            ..Default::default()
        };

        for pair in &outcome.pairs {
            let report = plan_windows(
                pair.trimmed_duration,
                &pair.timeline,
                self.config.interval_seconds,
            );

            info!(
                "📐 Planned {} windows for {} ({} intervals skipped, {:.3}s uncovered)",
                report.windows.len(),
                pair.trimmed_video.display(),
                report.skipped.len(),
                report.uncovered_seconds
            );
            summary.intervals_skipped += report.skipped.len();
            summary.uncovered_seconds += report.uncovered_seconds;

            for window in &report.windows {
                match materializer.materialize(&pair.trimmed_video, window).await {
                    Ok(artifact) => {
                        summary.clips_produced += 1;
                        summary.artifacts.push(artifact);
                    }
                    Err(e) => {
                        // One bad window must not sink the video or the batch.
                        warn!("{}", e);
                        summary.clips_failed += 1;
                    }
                }
            }
        }

        let manifest_path = self.config.output_dir.join("segment_results.json");
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(&manifest_path, json)
            .await
            .with_context(|| format!("failed to write manifest {}", manifest_path.display()))?;

        info!(
            "🎉 Segmentation finished in {:.2}s: {} clips from {} videos ({} failed windows, {} skipped videos)",
            started.elapsed().as_secs_f64(),
            summary.clips_produced,
            summary.videos_total,
            summary.clips_failed,
            summary.videos_skipped
        );

        Ok(summary)
    }
}
