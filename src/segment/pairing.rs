use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::captions::source::load_caption_source;
use crate::captions::CaptionTimeline;
use crate::errors::ClipperError;
use crate::video::VideoProcessor;

/// A trimmed video matched with its rebased caption timeline
#[derive(Debug, Clone)]
pub struct VideoCaptionPair {
    pub trimmed_video: PathBuf,
    pub trimmed_duration: f64,
    pub trim_offset: f64,
    pub timeline: CaptionTimeline,
}

/// Result of resolving a directory of trimmed videos, with counts of the
/// inputs that had to be skipped
#[derive(Debug, Default)]
pub struct PairingOutcome {
    pub pairs: Vec<VideoCaptionPair>,
    pub missing_caption: usize,
    pub inconsistent: usize,
    pub unreadable: usize,
}

/// Matches trimmed videos to their raw counterparts and caption sources by
/// filename convention, derives each pair's trim offset from the duration
/// difference, and rebases the caption timeline.
pub struct PairingResolver {
    video: VideoProcessor,
}

impl PairingResolver {
    pub fn new(video: VideoProcessor) -> Self {
        Self { video }
    }

    /// Resolve every trimmed video in `trimmed_dir`.
    ///
    /// Videos are visited in lexicographic filename order. A missing caption
    /// source or an inconsistent duration pair skips that video with a log
    /// line and never aborts the batch.
    pub async fn resolve_pairs(
        &self,
        raw_dir: &Path,
        trimmed_dir: &Path,
        caption_dir: &Path,
    ) -> Result<PairingOutcome> {
        let trimmed_videos = self
            .video
            .discover_videos(trimmed_dir)
            .with_context(|| format!("failed to list trimmed videos in {}", trimmed_dir.display()))?;

        let mut outcome = PairingOutcome::default();

        for trimmed_path in trimmed_videos {
            let file_name = trimmed_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = trimmed_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            let raw_path = raw_dir.join(&file_name);
            if !raw_path.exists() {
                warn!(
                    "{}",
                    ClipperError::MissingInput {
                        video: file_name.clone(),
                        what: "raw video".to_string(),
                    }
                );
                outcome.unreadable += 1;
                continue;
            }

            let caption_path = match find_caption_source(caption_dir, &stem) {
                Some(path) => path,
                None => {
                    warn!(
                        "{}",
                        ClipperError::MissingInput {
                            video: file_name.clone(),
                            what: "caption file".to_string(),
                        }
                    );
                    outcome.missing_caption += 1;
                    continue;
                }
            };

            let raw_duration = match self.video.probe_duration(&raw_path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skipping {}: {}", file_name, e);
                    outcome.unreadable += 1;
                    continue;
                }
            };
            let trimmed_duration = match self.video.probe_duration(&trimmed_path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skipping {}: {}", file_name, e);
                    outcome.unreadable += 1;
                    continue;
                }
            };

            let trim_offset = match compute_trim_offset(&file_name, raw_duration, trimmed_duration)
            {
                Ok(offset) => offset,
                Err(e) => {
                    error!("{}", e);
                    outcome.inconsistent += 1;
                    continue;
                }
            };

            let raw_timeline = match load_caption_source(&caption_path).await {
                Ok(timeline) => timeline,
                Err(e) => {
                    warn!("Skipping {}: {}", file_name, e);
                    outcome.unreadable += 1;
                    continue;
                }
            };

            let timeline = raw_timeline.shift_by(trim_offset);
            info!(
                "🔗 Paired {} (offset {:.3}s, {} captions retained of {})",
                file_name,
                trim_offset,
                timeline.len(),
                raw_timeline.len()
            );

            outcome.pairs.push(VideoCaptionPair {
                trimmed_video: trimmed_path,
                trimmed_duration,
                trim_offset,
                timeline,
            });
        }

        info!(
            "Resolved {} video/caption pairs ({} missing captions, {} inconsistent, {} unreadable)",
            outcome.pairs.len(),
            outcome.missing_caption,
            outcome.inconsistent,
            outcome.unreadable
        );
        Ok(outcome)
    }
}

/// Trim offset is the duration removed from the front of the raw broadcast.
/// A trimmed video longer than its raw counterpart has no valid offset and is
/// rejected rather than clamped.
pub fn compute_trim_offset(
    video: &str,
    raw_duration: f64,
    trimmed_duration: f64,
) -> std::result::Result<f64, ClipperError> {
    let offset = raw_duration - trimmed_duration;
    if offset < 0.0 {
        return Err(ClipperError::InconsistentPair {
            video: video.to_string(),
            raw: raw_duration,
            trimmed: trimmed_duration,
        });
    }
    Ok(offset)
}

/// Locate the caption source for a video stem: a service/plain JSON document
/// first, then a transcript CSV fallback.
pub fn find_caption_source(caption_dir: &Path, stem: &str) -> Option<PathBuf> {
    for ext in ["json", "csv"] {
        let candidate = caption_dir.join(format!("{}.{}", stem, ext));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
