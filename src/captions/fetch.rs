use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use super::source::RawCaptionDocument;
use crate::config::CaptionsConfig;
use crate::records::MatchRecord;
use crate::retry::RetryPolicy;

/// Client for the captioning service: resolves a video id into its per-part
/// content ids, then downloads each part's caption document.
pub struct CaptionFetcher {
    client: Client,
    config: CaptionsConfig,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ViewResponse {
    data: Option<ViewData>,
}

#[derive(Debug, Deserialize)]
struct ViewData {
    aid: u64,
    pages: Vec<ViewPage>,
}

#[derive(Debug, Deserialize)]
struct ViewPage {
    cid: u64,
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    data: Option<PlayerData>,
}

#[derive(Debug, Deserialize)]
struct PlayerData {
    subtitle: Option<SubtitleInfo>,
}

#[derive(Debug, Deserialize)]
struct SubtitleInfo {
    #[serde(default)]
    subtitles: Vec<SubtitleTrack>,
}

#[derive(Debug, Deserialize)]
struct SubtitleTrack {
    subtitle_url: String,
}

impl CaptionFetcher {
    pub fn new(config: CaptionsConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Download caption documents for every game part of a record into
    /// `output_dir`, named by the shared basename convention. Parts without
    /// captions on the service are logged and skipped. Returns how many
    /// documents were written.
    pub async fn fetch_for_record(&self, record: &MatchRecord, output_dir: &Path) -> Result<usize> {
        let bvid = bvid_from_url(&record.url)
            .ok_or_else(|| anyhow!("cannot extract video id from {}", record.url))?;

        tokio::fs::create_dir_all(output_dir).await?;

        let (aid, cids) = self
            .retry
            .run("video id lookup", || self.lookup_ids(&bvid))
            .await?;

        let mut written = 0;
        for (game_number, part) in (1u32..).zip(record.game_parts.iter()) {
            let basename = record.basename(game_number);
            let target = output_dir.join(format!("{}.json", basename));
            if target.exists() {
                info!("{} already fetched, skipping", basename);
                continue;
            }

            let cid = match cids.get((*part as usize).saturating_sub(1)) {
                Some(cid) => *cid,
                None => {
                    error!("Part {} out of range for {} ({} parts)", part, bvid, cids.len());
                    continue;
                }
            };

            let document = self
                .retry
                .run("caption download", || self.fetch_document(cid, aid, &bvid))
                .await?;

            match document {
                Some(doc) => {
                    let json = serde_json::to_string(&doc)?;
                    tokio::fs::write(&target, json).await?;
                    info!("💬 Wrote {} caption entries to {}", doc.body.len(), target.display());
                    written += 1;
                }
                None => {
                    error!("No captions on the service for {} (cid {})", basename, cid);
                }
            }
        }

        Ok(written)
    }

    async fn lookup_ids(&self, bvid: &str) -> Result<(u64, Vec<u64>)> {
        let url = Url::parse_with_params(
            &format!("{}/x/web-interface/view", self.config.api_base),
            &[("bvid", bvid)],
        )?;

        let response: ViewResponse = self
            .request(url)
            .await
            .context("video id lookup failed")?;

        let data = response
            .data
            .ok_or_else(|| anyhow!("no data for video {}", bvid))?;
        let cids = data.pages.into_iter().map(|p| p.cid).collect();
        Ok((data.aid, cids))
    }

    /// Fetch one part's caption document; `Ok(None)` when the service has no
    /// caption track for it.
    async fn fetch_document(
        &self,
        cid: u64,
        aid: u64,
        bvid: &str,
    ) -> Result<Option<RawCaptionDocument>> {
        let url = Url::parse_with_params(
            &format!("{}/x/player/v2", self.config.api_base),
            &[
                ("cid", cid.to_string()),
                ("aid", aid.to_string()),
                ("bvid", bvid.to_string()),
            ],
        )?;

        let response: PlayerResponse = self.request(url).await.context("player lookup failed")?;

        let track_url = response
            .data
            .and_then(|d| d.subtitle)
            .and_then(|s| s.subtitles.into_iter().next())
            .map(|t| t.subtitle_url);

        let track_url = match track_url {
            Some(u) => normalize_track_url(&u),
            None => return Ok(None),
        };

        let document: RawCaptionDocument = self
            .request(Url::parse(&track_url)?)
            .await
            .context("caption document download failed")?;
        Ok(Some(document))
    }

    async fn request<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut request = self.client.get(url);
        if let Some(cookie) = &self.config.cookie {
            request = request.header("Cookie", cookie);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

/// The video id is the trailing path segment of the match URL
pub fn bvid_from_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(|s| s.to_string())
}

/// Track URLs come back protocol-relative
fn normalize_track_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}
