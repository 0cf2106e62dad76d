use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::planner::{format_ts, SegmentWindow};
use crate::captions::CaptionTimeline;
use crate::errors::ClipperError;
use crate::video::VideoProcessor;

/// Persisted clip file and its paired caption file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipArtifact {
    pub video_path: PathBuf,
    pub caption_path: PathBuf,
    pub start: f64,
    pub end: f64,
}

/// Realizes planned windows as clip + caption artifact pairs under
/// `<output_root>/videos` and `<output_root>/subtitles`.
///
/// Filenames embed the source basename and the window's start/end timestamps
/// (`<base>_<start>_<end>`), so a clip and its caption file are co-nameable
/// without an index.
pub struct ClipMaterializer {
    video: VideoProcessor,
    clips_dir: PathBuf,
    subtitles_dir: PathBuf,
}

impl ClipMaterializer {
    pub fn new(video: VideoProcessor, output_root: &Path) -> Self {
        Self {
            video,
            clips_dir: output_root.join("videos"),
            subtitles_dir: output_root.join("subtitles"),
        }
    }

    /// Create the clip and subtitle output directories if absent
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.clips_dir, &self.subtitles_dir] {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    ClipperError::OutputNotWritable {
                        path: dir.clone(),
                        reason: e.to_string(),
                    }
                })?;
                info!("📂 Created output directory {}", dir.display());
            }
        }
        Ok(())
    }

    /// Cut one window from the trimmed video and write its caption subset.
    ///
    /// On a cut failure no artifact is recorded and the error surfaces to the
    /// driver; a half-written clip must never appear in the output manifest.
    pub async fn materialize(
        &self,
        trimmed_video: &Path,
        window: &SegmentWindow,
    ) -> Result<ClipArtifact> {
        let stem = trimmed_video
            .file_stem()
            .ok_or_else(|| anyhow!("trimmed video path has no file stem"))?
            .to_string_lossy();
        let base = clip_basename(&stem, window.start, window.end);

        let clip_path = self.clips_dir.join(format!("{}.mp4", base));
        let caption_path = self.subtitles_dir.join(format!("{}.json", base));

        debug!(
            "Cutting {} [{} - {}]",
            trimmed_video.display(),
            format_ts(window.start),
            format_ts(window.end)
        );

        self.video
            .cut_clip(trimmed_video, &clip_path, window.start, window.end)
            .await
            .map_err(|e| ClipperError::Materialization {
                clip: base.clone(),
                reason: e.to_string(),
            })?;

        write_caption_subset(&base, &window.captions, &caption_path, &clip_path).await?;

        info!(
            "🎬 Materialized {} ({:.3}s, {} captions)",
            base,
            window.end - window.start,
            window.captions.len()
        );

        Ok(ClipArtifact {
            video_path: clip_path,
            caption_path,
            start: window.start,
            end: window.end,
        })
    }
}

/// Deterministic `<basename>_<start>_<end>` artifact name
pub fn clip_basename(stem: &str, start: f64, end: f64) -> String {
    format!("{}_{}_{}", stem, format_ts(start), format_ts(end))
}

/// Write a window's caption subset next to its clip. If the write fails the
/// already-cut clip is removed, so artifacts only ever exist pairwise.
async fn write_caption_subset(
    base: &str,
    captions: &CaptionTimeline,
    caption_path: &Path,
    clip_path: &Path,
) -> Result<()> {
    if let Err(e) = captions.save_to_file(caption_path).await {
        let _ = tokio::fs::remove_file(clip_path).await;
        return Err(ClipperError::Materialization {
            clip: base.to_string(),
            reason: e.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::CaptionTimeline;
    use crate::segment::planner::SegmentWindow;

    #[test]
    fn test_clip_basename_is_stable() {
        assert_eq!(
            clip_basename("RNG_EDG_20230415_1", 0.0, 31.0),
            "RNG_EDG_20230415_1_0_31"
        );
        assert_eq!(
            clip_basename("RNG_EDG_20230415_1", 31.0, 62.533),
            "RNG_EDG_20230415_1_31_62.533"
        );
    }

    #[tokio::test]
    async fn test_ensure_dirs_creates_both_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ClipMaterializer::new(VideoProcessor::new(), dir.path());

        materializer.ensure_dirs().await.unwrap();
        assert!(dir.path().join("videos").is_dir());
        assert!(dir.path().join("subtitles").is_dir());

        // Second call is a no-op
        materializer.ensure_dirs().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_cut_produces_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ClipMaterializer::new(VideoProcessor::new(), dir.path());
        materializer.ensure_dirs().await.unwrap();

        let window = SegmentWindow {
            start: 0.0,
            end: 10.0,
            captions: CaptionTimeline::new(),
        };

        // Source does not exist, so ffmpeg (if present) fails; either way no
        // caption file may be left behind.
        let missing = dir.path().join("missing.mp4");
        let result = materializer.materialize(&missing, &window).await;
        assert!(result.is_err());
        assert!(!dir.path().join("subtitles/missing_0_10.json").exists());
    }

    #[tokio::test]
    async fn test_failed_caption_write_removes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let clip_path = dir.path().join("game_0_10.mp4");
        tokio::fs::write(&clip_path, b"clip").await.unwrap();

        // Caption path points into a directory that does not exist, so the
        // write fails after the cut already succeeded.
        let caption_path = dir.path().join("absent/game_0_10.json");
        let result =
            write_caption_subset("game_0_10", &CaptionTimeline::new(), &caption_path, &clip_path)
                .await;

        assert!(result.is_err());
        assert!(!clip_path.exists());
    }
}
