use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::records::MatchRecord;
use crate::video::VideoProcessor;

/// Turns raw broadcast downloads into match-only videos by cutting off each
/// record's pre-match lead-in with a lossless container cut.
pub struct TrimStage {
    video: VideoProcessor,
}

impl TrimStage {
    pub fn new(video: VideoProcessor) -> Self {
        Self { video }
    }

    /// Trim every game video of every record. Already-trimmed outputs,
    /// missing inputs, and records without a usable start point are skipped
    /// with a log line. Returns how many videos were trimmed.
    pub async fn trim_records(
        &self,
        records: &[MatchRecord],
        raw_dir: &Path,
        output_dir: &Path,
    ) -> Result<usize> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut trimmed = 0;
        for record in records {
            let start_point = match record.start_point {
                Some(s) if s > 0 => s,
                _ => {
                    warn!(
                        "No usable start point for {} ({}), skipping",
                        record.teams.join(" vs "),
                        record.date
                    );
                    continue;
                }
            };

            for game_number in 1..=record.game_parts.len() as u32 {
                let basename = record.basename(game_number);
                let input = raw_dir.join(format!("{}.mp4", basename));
                let output = output_dir.join(format!("{}.mp4", basename));

                if output.exists() {
                    info!("{} already trimmed, skipping", basename);
                    continue;
                }
                if !input.exists() {
                    warn!("Raw video {} not downloaded yet, skipping", input.display());
                    continue;
                }

                match self
                    .video
                    .trim_leading(&input, &output, start_point as f64)
                    .await
                {
                    Ok(()) => trimmed += 1,
                    Err(e) => {
                        warn!("Trim failed for {}: {}", basename, e);
                    }
                }
            }
        }

        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MatchRecord;

    fn record(start_point: Option<u32>) -> MatchRecord {
        MatchRecord {
            url: "https://example.com/v/1".to_string(),
            teams: vec!["RNG".to_string(), "EDG".to_string()],
            date: "20230415".to_string(),
            game_parts: vec![2, 3],
            start_point,
        }
    }

    #[tokio::test]
    async fn test_records_without_start_point_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let stage = TrimStage::new(VideoProcessor::new());

        let trimmed = stage
            .trim_records(
                &[record(None), record(Some(0))],
                dir.path(),
                &dir.path().join("out"),
            )
            .await
            .unwrap();

        assert_eq!(trimmed, 0);
    }

    #[tokio::test]
    async fn test_missing_raw_videos_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let stage = TrimStage::new(VideoProcessor::new());

        // Start point present, but no raw files downloaded
        let trimmed = stage
            .trim_records(&[record(Some(120))], dir.path(), &dir.path().join("out"))
            .await
            .unwrap();

        assert_eq!(trimmed, 0);
    }
}
