use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retry::RetryPolicy;

/// Configuration for the esports clip pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Match discovery settings
    pub discovery: DiscoveryConfig,

    /// Raw video download settings
    pub download: DownloadConfig,

    /// Captioning service settings
    pub captions: CaptionsConfig,

    /// Speech-recognition fallback settings
    pub transcription: TranscriptionConfig,

    /// Caption refinement settings
    pub refine: RefineConfig,

    /// Segmentation and output settings
    pub segment: SegmentConfig,

    /// Retry behavior for external calls
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// JSON file listing the match page URLs to process
    pub video_list: PathBuf,

    /// JSONL store of discovered match records
    pub record_file: PathBuf,

    /// Season year, used to complete month/day dates from page titles
    pub season_year: i32,

    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Downloader executable (name on PATH or absolute path)
    pub tool: String,

    /// Stream format passed to the downloader
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsConfig {
    /// Base URL of the captioning service API
    pub api_base: String,

    /// Session cookie, required by the service for caption tracks
    pub cookie: Option<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper CLI executable
    pub command: String,

    /// Whisper model name
    pub model: String,

    /// Language hint; None lets Whisper detect it
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Chat-completion endpoint (OpenAI-compatible)
    pub endpoint: String,

    /// API key for the refinement endpoint
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (low keeps rewrites close to the input)
    pub temperature: f32,

    /// Sampling seed for reproducible rewrites
    pub seed: Option<u64>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// JSONL file refined results are appended to
    pub results_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Directory of raw broadcast downloads
    pub raw_video_dir: PathBuf,

    /// Directory of trimmed, match-only videos
    pub trimmed_video_dir: PathBuf,

    /// Directory of per-game caption documents
    pub caption_dir: PathBuf,

    /// Root for clip output (videos/ and subtitles/ subdirectories)
    pub output_dir: PathBuf,

    /// Minimum clip length in seconds
    pub interval_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per external call before giving up
    pub max_attempts: u32,

    /// Fixed delay between attempts in seconds
    pub backoff_seconds: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            std::time::Duration::from_secs(self.backoff_seconds),
        )
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        // Try to load from various locations
        let config_paths = [
            "esports-clipper.toml",
            "config/esports-clipper.toml",
            "~/.config/esports-clipper/config.toml",
            "/etc/esports-clipper/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Try environment variables
        if let Ok(config) = Self::from_env() {
            return Ok(config);
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Load configuration from environment variables.
    ///
    /// Fails when no `ESPORTS_CLIPPER_*` variable is set, so `load()` can
    /// report that no configuration source was found.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        let mut overridden = false;

        if let Ok(cookie) = std::env::var("ESPORTS_CLIPPER_COOKIE") {
            config.captions.cookie = Some(cookie);
            overridden = true;
        }

        if let Ok(api_key) = std::env::var("ESPORTS_CLIPPER_API_KEY") {
            config.refine.api_key = Some(api_key);
            overridden = true;
        }

        if let Ok(output_dir) = std::env::var("ESPORTS_CLIPPER_OUTPUT_DIR") {
            config.segment.output_dir = PathBuf::from(output_dir);
            overridden = true;
        }

        if let Ok(interval) = std::env::var("ESPORTS_CLIPPER_INTERVAL") {
            config.segment.interval_seconds = interval.parse().unwrap_or(30.0);
            overridden = true;
        }

        if !overridden {
            return Err(anyhow!("no ESPORTS_CLIPPER_* environment variables set"));
        }
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.segment.interval_seconds <= 0.0 {
            return Err(anyhow!("interval_seconds must be greater than 0"));
        }

        if self.retry.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be greater than 0"));
        }

        if self.download.tool.is_empty() {
            return Err(anyhow!("download tool must not be empty"));
        }

        if self.captions.api_base.is_empty() {
            return Err(anyhow!("captions api_base must not be empty"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Esports Clipper Configuration:\n\
            - Video List: {}\n\
            - Record File: {}\n\
            - Season Year: {}\n\
            - Downloader: {} ({})\n\
            - Clip Interval: {}s\n\
            - Output Directory: {}\n\
            - Captions Cookie Set: {}\n\
            - Refinement Key Set: {}",
            self.discovery.video_list.display(),
            self.discovery.record_file.display(),
            self.discovery.season_year,
            self.download.tool,
            self.download.format,
            self.segment.interval_seconds,
            self.segment.output_dir.display(),
            self.captions.cookie.is_some(),
            self.refine.api_key.is_some()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig {
                video_list: PathBuf::from("config/video_list.json"),
                record_file: PathBuf::from("records.jsonl"),
                season_year: 2023,
                request_timeout_seconds: 30,
            },
            download: DownloadConfig {
                tool: "you-get".to_string(),
                format: "dash-flv".to_string(),
            },
            captions: CaptionsConfig {
                api_base: "https://api.bilibili.com".to_string(),
                cookie: None,
                request_timeout_seconds: 30,
            },
            transcription: TranscriptionConfig {
                command: "whisper".to_string(),
                model: "medium".to_string(),
                language: Some("zh".to_string()),
            },
            refine: RefineConfig {
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: None,
                model: "gpt-3.5-turbo".to_string(),
                max_tokens: 512,
                temperature: 0.1, // Low temperature for consistent rewrites
                seed: Some(2023),
                timeout_seconds: 120,
                results_file: PathBuf::from("refine_results.jsonl"),
            },
            segment: SegmentConfig {
                raw_video_dir: PathBuf::from("data/raw"),
                trimmed_video_dir: PathBuf::from("data/trimmed"),
                caption_dir: PathBuf::from("data/captions"),
                output_dir: PathBuf::from("./output"),
                interval_seconds: 30.0,
            },
            retry: RetryConfig {
                max_attempts: 5,
                backoff_seconds: 30,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_season_year(mut self, year: i32) -> Self {
        self.config.discovery.season_year = year;
        self
    }

    pub fn with_interval(mut self, seconds: f64) -> Self {
        self.config.segment.interval_seconds = seconds;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.segment.output_dir = dir;
        self
    }

    pub fn with_cookie(mut self, cookie: String) -> Self {
        self.config.captions.cookie = Some(cookie);
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.refine.api_key = Some(api_key);
        self
    }

    pub fn with_downloader(mut self, tool: String, format: String) -> Self {
        self.config.download.tool = tool;
        self.config.download.format = format;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.segment.interval_seconds, 30.0);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.captions.cookie.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_season_year(2024)
            .with_interval(45.0)
            .with_cookie("SESSDATA=abc".to_string())
            .build();

        assert_eq!(config.discovery.season_year, 2024);
        assert_eq!(config.segment.interval_seconds, 45.0);
        assert_eq!(config.captions.cookie.as_deref(), Some("SESSDATA=abc"));
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let mut config = Config::default();
        config.segment.interval_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_requires_an_override() {
        // Single test keeps the env mutations sequential
        for var in [
            "ESPORTS_CLIPPER_COOKIE",
            "ESPORTS_CLIPPER_API_KEY",
            "ESPORTS_CLIPPER_OUTPUT_DIR",
            "ESPORTS_CLIPPER_INTERVAL",
        ] {
            std::env::remove_var(var);
        }
        assert!(Config::from_env().is_err());

        std::env::set_var("ESPORTS_CLIPPER_INTERVAL", "45");
        let config = Config::from_env().unwrap();
        assert_eq!(config.segment.interval_seconds, 45.0);
        std::env::remove_var("ESPORTS_CLIPPER_INTERVAL");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.segment.interval_seconds, config.segment.interval_seconds);
    }
}
