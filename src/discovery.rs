use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, warn};

use crate::records::{MatchRecord, RecordStore};
use crate::retry::RetryPolicy;

/// Scrapes match pages for the metadata the rest of the pipeline keys on:
/// team tags, match date, which playlist parts are actual games, and the
/// pre-match seek offset the player page advertises.
pub struct MatchScraper {
    client: Client,
    season_year: i32,
    retry: RetryPolicy,
}

impl MatchScraper {
    pub fn new(timeout_seconds: u64, season_year: i32, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            season_year,
            retry,
        }
    }

    /// Record metadata for every not-yet-recorded URL. Non-match pages are
    /// logged and skipped; returns how many records were appended.
    pub async fn discover(&self, urls: &[String], store: &RecordStore) -> Result<usize> {
        let mut appended = 0;

        for url in urls {
            if store.contains_url(url)? {
                info!("Already recorded, skipping {}", url);
                continue;
            }

            let page = match self
                .retry
                .run("match page fetch", || self.fetch_page(url))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Giving up on {}: {}", url, e);
                    continue;
                }
            };

            match self.parse_match_page(url, &page) {
                Some(record) => {
                    info!(
                        "🏆 Recorded {} vs {} on {} ({} games, start point {:?})",
                        record.teams[0],
                        record.teams[1],
                        record.date,
                        record.game_parts.len(),
                        record.start_point
                    );
                    store.append(&record)?;
                    appended += 1;
                }
                None => {
                    info!("{} is not a match broadcast, skipping", url);
                }
            }
        }

        Ok(appended)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;
        Ok(response.text().await?)
    }

    /// Parse one match page into a record, or `None` when the title does not
    /// look like a match broadcast.
    fn parse_match_page(&self, url: &str, html: &str) -> Option<MatchRecord> {
        let document = Html::parse_document(html);

        let title = page_title(&document)?;
        let (teams, date) = extract_teams_and_date(&title, self.season_year)?;

        let game_parts = game_part_numbers(&document);
        let start_point = start_point_seconds(&document);

        Some(MatchRecord {
            url: url.to_string(),
            teams,
            date,
            game_parts,
            start_point,
        })
    }
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>();
    // Site titles carry a suffix after an underscore
    let title = title.split('_').next().unwrap_or(&title).to_string();
    Some(title)
}

/// Pull `([TeamA], [TeamB])` and a normalized `YYYYMMDD` date out of a
/// broadcast title of the shape `4月15日 … RNG vs EDG`.
pub fn extract_teams_and_date(title: &str, season_year: i32) -> Option<(Vec<String>, String)> {
    let re = Regex::new(r"(\d{1,2})月(\d{1,2})日.*?([A-Za-z0-9]+)\s+vs\s+([A-Za-z0-9]+)").ok()?;
    let caps = re.captures(title)?;

    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(season_year, month, day)?;

    let teams = vec![caps[3].to_string(), caps[4].to_string()];
    Some((teams, date.format("%Y%m%d").to_string()))
}

/// A playlist part is a game when its title carries a `第N局` marker
pub fn has_game_marker(text: &str) -> bool {
    match Regex::new(r"第[一二三四五六七八九十\d]+局") {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// 1-based part numbers of the playlist entries that are actual games
fn game_part_numbers(document: &Html) -> Vec<u32> {
    let selector = match Selector::parse(".cur-list ul li") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .enumerate()
        .filter(|(_, li)| has_game_marker(&li.text().collect::<String>()))
        .map(|(idx, _)| idx as u32 + 1)
        .collect()
}

/// The player page marks the pre-match broadcast length as a `data-seek`
/// attribute on the progress bar thumbnail
fn start_point_seconds(document: &Html) -> Option<u32> {
    let selector = Selector::parse("img[data-seek]").ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("data-seek")?
        .parse()
        .ok()
}

/// Load the list of match page URLs to discover (a JSON array of strings)
pub async fn load_url_list(path: &std::path::Path) -> Result<Vec<String>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read URL list {}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| anyhow!("invalid URL list {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_teams_and_date() {
        let title = "4月15日 2023职业联赛春季赛 RNG vs EDG";
        let (teams, date) = extract_teams_and_date(title, 2023).unwrap();
        assert_eq!(teams, vec!["RNG", "EDG"]);
        assert_eq!(date, "20230415");
    }

    #[test]
    fn test_extract_rejects_non_match_title() {
        assert!(extract_teams_and_date("赛后采访合集", 2023).is_none());
        assert!(extract_teams_and_date("highlight reel", 2023).is_none());
    }

    #[test]
    fn test_extract_rejects_impossible_date() {
        assert!(extract_teams_and_date("2月30日 RNG vs EDG", 2023).is_none());
    }

    #[test]
    fn test_game_marker() {
        assert!(has_game_marker("第一局 RNG vs EDG"));
        assert!(has_game_marker("第2局"));
        assert!(!has_game_marker("赛前预热"));
    }

    #[test]
    fn test_parse_match_page() {
        let html = r#"<html><head><title>4月15日 春季赛 RNG vs EDG_site</title></head>
            <body>
              <div class="cur-list"><ul>
                <li>赛前预热</li>
                <li>第一局</li>
                <li>第二局</li>
              </ul></div>
              <img data-seek="312" src="x.png"/>
            </body></html>"#;

        let scraper = MatchScraper::new(5, 2023, RetryPolicy::new(1, Duration::from_secs(0)));
        let record = scraper
            .parse_match_page("https://example.com/v/1", html)
            .unwrap();

        assert_eq!(record.teams, vec!["RNG", "EDG"]);
        assert_eq!(record.date, "20230415");
        assert_eq!(record.game_parts, vec![2, 3]);
        assert_eq!(record.start_point, Some(312));
    }

    #[test]
    fn test_parse_non_match_page_is_none() {
        let html = "<html><head><title>赛后采访</title></head><body></body></html>";
        let scraper = MatchScraper::new(5, 2023, RetryPolicy::new(1, Duration::from_secs(0)));
        assert!(scraper.parse_match_page("https://example.com", html).is_none());
    }
}
