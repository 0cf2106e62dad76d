use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::captions::source::{RawCaptionDocument, RawCaptionItem};
use crate::config::TranscriptionConfig;
use crate::segment::pairing::find_caption_source;
use crate::video::VideoProcessor;

/// Speech-recognition fallback for videos the captioning service has no
/// track for: runs a Whisper CLI and converts its segment output into the
/// same caption document shape the service delivers.
pub struct Transcriber {
    config: TranscriptionConfig,
    video: VideoProcessor,
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

impl Transcriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            config,
            video: VideoProcessor::new(),
        }
    }

    pub async fn is_available(&self) -> bool {
        tokio::process::Command::new(&self.config.command)
            .arg("--help")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Transcribe every video in `video_dir` that has no caption source yet.
    /// Per-video failures are logged and skipped. Returns how many caption
    /// documents were written.
    pub async fn transcribe_missing(&self, video_dir: &Path, caption_dir: &Path) -> Result<usize> {
        if !self.is_available().await {
            return Err(anyhow!(
                "transcription command '{}' not available",
                self.config.command
            ));
        }

        tokio::fs::create_dir_all(caption_dir).await?;
        let videos = self.video.discover_videos(video_dir)?;

        let mut written = 0;
        for video in videos {
            let stem = video
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if find_caption_source(caption_dir, &stem).is_some() {
                info!("Captions already present for {}, skipping", stem);
                continue;
            }

            match self.transcribe_video(&video, caption_dir).await {
                Ok(path) => {
                    info!("🎤 Transcribed {} -> {}", video.display(), path.display());
                    written += 1;
                }
                Err(e) => {
                    warn!("Transcription failed for {}: {}", video.display(), e);
                }
            }
        }

        Ok(written)
    }

    /// Run the Whisper CLI on one video and write the resulting caption
    /// document next to the service-fetched ones.
    pub async fn transcribe_video(&self, video: &Path, caption_dir: &Path) -> Result<PathBuf> {
        let stem = video
            .file_stem()
            .ok_or_else(|| anyhow!("video path has no file stem"))?
            .to_string_lossy()
            .to_string();

        let work_dir = tempfile::tempdir().context("failed to create transcription work dir")?;

        let mut cmd = tokio::process::Command::new(&self.config.command);
        cmd.arg(video)
            .arg("--model")
            .arg(&self.config.model)
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(work_dir.path());
        if let Some(language) = &self.config.language {
            cmd.arg("--language").arg(language);
        }

        let status = cmd.status().await.context("failed to spawn whisper")?;
        if !status.success() {
            return Err(anyhow!("whisper exited with {} for {}", status, video.display()));
        }

        let json_path = work_dir.path().join(format!("{}.json", stem));
        let data = tokio::fs::read_to_string(&json_path)
            .await
            .with_context(|| format!("whisper produced no output at {}", json_path.display()))?;

        let document = parse_whisper_output(&data)?;
        if document.body.is_empty() {
            warn!("Whisper found no speech in {}", video.display());
        }

        let target = caption_dir.join(format!("{}.json", stem));
        tokio::fs::write(&target, serde_json::to_string(&document)?).await?;
        Ok(target)
    }
}

/// Convert Whisper's JSON segment output into the service document shape
pub fn parse_whisper_output(data: &str) -> Result<RawCaptionDocument> {
    let output: WhisperOutput =
        serde_json::from_str(data).context("invalid whisper JSON output")?;

    let body = output
        .segments
        .into_iter()
        .map(|segment| RawCaptionItem {
            from: segment.start,
            to: segment.end,
            content: segment.text.trim().to_string(),
        })
        .collect();

    Ok(RawCaptionDocument { body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_output() {
        let json = r#"{
            "text": " full text",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.4, "text": " hello there"},
                {"id": 1, "start": 2.4, "end": 5.1, "text": " big baron call"}
            ],
            "language": "zh"
        }"#;

        let document = parse_whisper_output(json).unwrap();
        assert_eq!(document.body.len(), 2);
        assert_eq!(document.body[0].content, "hello there");
        assert_eq!(document.body[1].from, 2.4);
    }

    #[test]
    fn test_parse_whisper_output_without_segments() {
        let document = parse_whisper_output(r#"{"text": ""}"#).unwrap();
        assert!(document.body.is_empty());
    }

    #[test]
    fn test_parse_whisper_garbage_is_error() {
        assert!(parse_whisper_output("not json").is_err());
    }
}
