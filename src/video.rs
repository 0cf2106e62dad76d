use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::segment::planner::format_ts;

/// FFmpeg/ffprobe front-end for every media operation the pipeline needs:
/// duration probing, the lossless leading trim, per-window sub-clip cuts,
/// and keyframe grabs.
#[derive(Clone)]
pub struct VideoProcessor {
    supported_extensions: Vec<String>,
}

impl VideoProcessor {
    pub fn new() -> Self {
        Self {
            supported_extensions: vec![
                "mp4".to_string(),
                "mkv".to_string(),
                "flv".to_string(),
                "webm".to_string(),
            ],
        }
    }

    /// List video files directly inside `dir`, lexicographically sorted so
    /// repeated runs process them in the same order.
    pub fn discover_videos(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut videos: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| self.supported_extensions.contains(&ext.to_lowercase()))
                    .unwrap_or(false)
            })
            .collect();

        videos.sort();
        Ok(videos)
    }

    /// Query a video's duration in seconds via ffprobe
    pub async fn probe_duration(&self, video_path: &Path) -> Result<f64> {
        let output = tokio::process::Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(video_path)
            .output()
            .await
            .context("failed to spawn ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", video_path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        let probe: serde_json::Value = serde_json::from_str(&json_str)?;

        let duration: f64 = probe["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("no duration in ffprobe output for {}", video_path.display()))?;

        debug!("Probed {}: {:.3}s", video_path.display(), duration);
        Ok(duration)
    }

    /// Remove the leading `start_seconds` of a raw broadcast with a lossless
    /// container cut (`-c copy`), producing the match-only video.
    pub async fn trim_leading(
        &self,
        input: &Path,
        output: &Path,
        start_seconds: f64,
    ) -> Result<()> {
        info!(
            "✂️  Trimming {:.1}s of pre-match broadcast from {}",
            start_seconds,
            input.display()
        );

        let status = tokio::process::Command::new("ffmpeg")
            .arg("-ss")
            .arg(format_ts(start_seconds))
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-y"])
            .arg(output)
            .status()
            .await
            .context("failed to spawn ffmpeg")?;

        if !status.success() {
            return Err(anyhow!("ffmpeg trim failed for {}", input.display()));
        }

        Ok(())
    }

    /// Cut `[start, end]` out of a trimmed video into a new clip file.
    ///
    /// Re-encodes (unlike the leading trim) so cut points land exactly on the
    /// planned caption boundaries rather than the nearest keyframe.
    pub async fn cut_clip(&self, input: &Path, output: &Path, start: f64, end: f64) -> Result<()> {
        let status = tokio::process::Command::new("ffmpeg")
            .arg("-i")
            .arg(input)
            .arg("-ss")
            .arg(format_ts(start))
            .arg("-to")
            .arg(format_ts(end))
            .args(["-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac", "-y"])
            .arg(output)
            .status()
            .await
            .context("failed to spawn ffmpeg")?;

        if !status.success() {
            return Err(anyhow!(
                "ffmpeg cut [{} - {}] failed for {}",
                format_ts(start),
                format_ts(end),
                input.display()
            ));
        }

        Ok(())
    }

    /// Grab `count` frames evenly spread across a clip as JPEG keyframes
    pub async fn extract_keyframes(
        &self,
        video_path: &Path,
        output_dir: &Path,
        count: usize,
    ) -> Result<Vec<PathBuf>> {
        let duration = self.probe_duration(video_path).await?;
        let base_name = video_path
            .file_stem()
            .ok_or_else(|| anyhow!("video path has no file stem"))?
            .to_string_lossy()
            .to_string();

        tokio::fs::create_dir_all(output_dir).await?;

        let mut frames = Vec::new();
        for i in 0..count {
            // Sample mid-slice so a black opening frame is not frame zero
            let timestamp = duration * (i as f64 + 0.5) / count as f64;
            let frame_path = output_dir.join(format!("{}_{}.jpg", base_name, i));

            let status = tokio::process::Command::new("ffmpeg")
                .arg("-ss")
                .arg(format!("{:.3}", timestamp))
                .arg("-i")
                .arg(video_path)
                .args(["-vframes", "1", "-q:v", "2", "-y"])
                .arg(&frame_path)
                .status()
                .await
                .context("failed to spawn ffmpeg")?;

            if !status.success() {
                return Err(anyhow!(
                    "keyframe extraction failed for {} at {:.3}s",
                    video_path.display(),
                    timestamp
                ));
            }
            frames.push(frame_path);
        }

        info!(
            "🖼️  Extracted {} keyframes from {}",
            frames.len(),
            video_path.display()
        );
        Ok(frames)
    }
}

impl Default for VideoProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.mp4", "notes.txt", "c.flv"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/d.mp4"), b"").unwrap();

        let processor = VideoProcessor::new();
        let videos = processor.discover_videos(dir.path()).unwrap();

        let names: Vec<String> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        // Nested files and non-video files excluded, order lexicographic
        assert_eq!(names, vec!["a.mp4", "b.mp4", "c.flv"]);
    }

    #[test]
    fn test_discovery_of_missing_dir_is_empty() {
        let processor = VideoProcessor::new();
        let videos = processor
            .discover_videos(Path::new("/nonexistent/esports-clipper-test"))
            .unwrap();
        assert!(videos.is_empty());
    }
}
