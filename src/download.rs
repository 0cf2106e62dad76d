use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::DownloadConfig;
use crate::records::MatchRecord;
use crate::retry::RetryPolicy;

/// Shells out to a `you-get`-style downloader tool, one invocation per game
/// part, with retries at this boundary only.
pub struct VideoDownloader {
    config: DownloadConfig,
    retry: RetryPolicy,
}

impl VideoDownloader {
    pub fn new(config: DownloadConfig, retry: RetryPolicy) -> Self {
        Self { config, retry }
    }

    /// Download every game part of a record into `output_dir`, skipping files
    /// that already exist. Returns how many files were downloaded.
    pub async fn download_record(&self, record: &MatchRecord, output_dir: &Path) -> Result<usize> {
        let tool = resolve_tool(&self.config.tool)
            .ok_or_else(|| anyhow!("downloader tool '{}' not found in PATH", self.config.tool))?;

        tokio::fs::create_dir_all(output_dir).await?;

        let mut downloaded = 0;
        for (game_number, part) in (1u32..).zip(record.game_parts.iter()) {
            let file_name = record.basename(game_number);
            let target = output_dir.join(format!("{}.mp4", file_name));
            if target.exists() {
                info!("{} already exists, skipping", target.display());
                continue;
            }

            let part_url = format!("{}?p={}", record.url, part);
            info!("⬇️  Downloading {} from {}", file_name, part_url);

            let result = self
                .retry
                .run("video download", || {
                    self.run_downloader(&tool, &part_url, &file_name, output_dir)
                })
                .await;

            match result {
                Ok(()) => downloaded += 1,
                Err(e) => {
                    warn!("Giving up on {}: {}", file_name, e);
                }
            }
        }

        Ok(downloaded)
    }

    async fn run_downloader(
        &self,
        tool: &Path,
        url: &str,
        file_name: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let status = tokio::process::Command::new(tool)
            .arg(format!("--format={}", self.config.format))
            .arg("--no-caption")
            .arg("--output-filename")
            .arg(file_name)
            .arg("--output-dir")
            .arg(output_dir)
            .arg(url)
            .status()
            .await?;

        if !status.success() {
            return Err(anyhow!("downloader exited with {} for {}", status, url));
        }
        Ok(())
    }
}

/// Locate an executable on PATH, honoring an absolute path as-is
pub fn resolve_tool(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return candidate.exists().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}
