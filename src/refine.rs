use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::captions::CaptionTimeline;
use crate::config::RefineConfig;
use crate::retry::RetryPolicy;

const SYSTEM_PROMPT: &str = "Your task is to rewrite the user's input into fluent, natural \
commentary. The input is a fragment of professional League of Legends match commentary, one \
line per spoken sentence, possibly from different speakers. Preserve esports terminology as-is, \
fix words that look like speech-recognition errors, and stay close to the real meaning of the \
commentary rather than drifting into written prose. Drop fragments that are too incomplete to \
salvage and keep the result concise. Output only the rewritten commentary, nothing else.";

const USER_PROMPT: &str = "Here is the commentary for this game:\n{subtitle_text}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// One refined clip caption, persisted as a JSONL line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineRecord {
    pub video_path: PathBuf,
    pub caption_path: PathBuf,
    pub text: String,
    pub refined_text: String,
}

/// Rewrites clip caption text into fluent commentary via an OpenAI-compatible
/// chat-completion endpoint, with append-only JSONL results and resume.
pub struct CaptionRefiner {
    client: Client,
    config: RefineConfig,
    retry: RetryPolicy,
}

impl CaptionRefiner {
    pub fn new(config: RefineConfig, retry: RetryPolicy) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("refinement API key required"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Refine every clip caption under `caption_dir` that is not yet in the
    /// results file. Results are appended and flushed per caption so an
    /// interrupted run resumes where it stopped. Returns how many captions
    /// were refined.
    pub async fn refine_directory(
        &self,
        caption_dir: &Path,
        video_dir: &Path,
        results_path: &Path,
    ) -> Result<usize> {
        let existing = load_results(results_path)?;
        let caption_files = list_caption_files(caption_dir);

        if let Some(parent) = results_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut results_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(results_path)
            .with_context(|| format!("failed to open results file {}", results_path.display()))?;

        let mut refined = 0;
        for caption_path in caption_files {
            if existing.iter().any(|r| r.caption_path == caption_path) {
                debug!("{} already refined, skipping", caption_path.display());
                continue;
            }

            let timeline = CaptionTimeline::load_from_file(&caption_path).await?;
            let text = timeline
                .entries()
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            let refined_text = match self
                .retry
                .run("caption refinement", || self.refine_text(&text))
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    warn!("Giving up on {}: {}", caption_path.display(), e);
                    continue;
                }
            };

            let record = RefineRecord {
                video_path: paired_video_path(&caption_path, video_dir),
                caption_path: caption_path.clone(),
                text,
                refined_text,
            };
            writeln!(results_file, "{}", serde_json::to_string(&record)?)?;
            results_file.flush()?;

            info!("✨ Refined {}", caption_path.display());
            refined += 1;
        }

        Ok(refined)
    }

    /// One chat-completion round trip for a block of caption text
    pub async fn refine_text(&self, subtitle_text: &str) -> Result<String> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: USER_PROMPT.replace("{subtitle_text}", subtitle_text),
            },
        ];

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            seed: self.config.seed,
        };

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("refinement API key not configured"))?;

        debug!("Sending refinement request to {}", self.config.endpoint);
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("refinement API error {}: {}", status, text));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .ok_or_else(|| anyhow!("empty response from refinement API"))?
            .message
            .content
            .clone();

        Ok(content)
    }
}

/// Load previously refined results; a missing file is an empty list
pub fn load_results(path: &Path) -> Result<Vec<RefineRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read results file {}", path.display()))?;

    let mut records = Vec::new();
    for (line_no, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: RefineRecord = serde_json::from_str(line)
            .with_context(|| format!("invalid result at {}:{}", path.display(), line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Clip caption files, lexicographically sorted for stable processing order
fn list_caption_files(caption_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(caption_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}

/// The clip video that pairs with a caption file, by the shared basename
pub fn paired_video_path(caption_path: &Path, video_dir: &Path) -> PathBuf {
    let stem = caption_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    video_dir.join(format!("{}.mp4", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_video_path() {
        let caption = Path::new("/data/out/subtitles/RNG_EDG_20230415_1_0_31.json");
        let video = paired_video_path(caption, Path::new("/data/out/videos"));
        assert_eq!(
            video,
            Path::new("/data/out/videos/RNG_EDG_20230415_1_0_31.mp4")
        );
    }

    #[test]
    fn test_load_results_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let record = RefineRecord {
            video_path: PathBuf::from("v.mp4"),
            caption_path: PathBuf::from("c.json"),
            text: "raw".to_string(),
            refined_text: "polished".to_string(),
        };
        std::fs::write(&path, format!("{}\n", serde_json::to_string(&record).unwrap())).unwrap();

        let loaded = load_results(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].refined_text, "polished");
    }

    #[test]
    fn test_load_results_missing_file() {
        assert!(load_results(Path::new("/nonexistent/results.jsonl"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_caption_listing_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_0_31.json", "a_0_28.json", "a_0_28.mp4"] {
            std::fs::write(dir.path().join(name), b"[]").unwrap();
        }

        let files = list_caption_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a_0_28.json", "b_0_31.json"]);
    }

    #[test]
    fn test_requires_api_key() {
        let mut config = crate::config::Config::default().refine;
        config.api_key = None;
        assert!(CaptionRefiner::new(config, RetryPolicy::default()).is_err());
    }
}
