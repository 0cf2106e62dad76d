use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::timeline::{CaptionEntry, CaptionTimeline};

/// Caption document as delivered by the captioning service.
///
/// The service wraps the entries in a `body` array with `from`/`to`/`content`
/// fields; everything else in the payload is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCaptionDocument {
    pub body: Vec<RawCaptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCaptionItem {
    pub from: f64,
    pub to: f64,
    pub content: String,
}

impl RawCaptionDocument {
    pub fn into_timeline(self) -> CaptionTimeline {
        let entries = self
            .body
            .into_iter()
            .map(|item| CaptionEntry::new(item.from, item.to, item.content))
            .collect();
        CaptionTimeline::from_entries(entries)
    }

    pub fn from_timeline(timeline: &CaptionTimeline) -> Self {
        let body = timeline
            .entries()
            .iter()
            .map(|entry| RawCaptionItem {
                from: entry.start,
                to: entry.end,
                content: entry.text.clone(),
            })
            .collect();
        Self { body }
    }
}

/// Load a caption source file in any of the shapes the pipeline produces:
/// a service document (`{"body": [...]}`), a plain timeline array, or a
/// transcript CSV (`start,end,text` with a header line).
pub async fn load_caption_source(path: &Path) -> Result<CaptionTimeline> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read caption source {}", path.display()))?;

    if path.extension().and_then(|e| e.to_str()) == Some("csv") {
        return parse_transcript_csv(&data)
            .with_context(|| format!("invalid transcript CSV in {}", path.display()));
    }

    if let Ok(doc) = serde_json::from_str::<RawCaptionDocument>(&data) {
        return Ok(doc.into_timeline());
    }

    let timeline: CaptionTimeline = serde_json::from_str(&data)
        .with_context(|| format!("unrecognized caption format in {}", path.display()))?;
    Ok(timeline)
}

/// Parse a `start,end,text` transcript CSV into a timeline.
///
/// Text cells may be double-quoted (with `""` escaping) since commentary
/// lines routinely contain commas.
pub fn parse_transcript_csv(data: &str) -> Result<CaptionTimeline> {
    let mut entries = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        // Header line
        if line_no == 0 && line.starts_with("start,") {
            continue;
        }

        let (start_str, rest) = line
            .split_once(',')
            .with_context(|| format!("line {}: missing end column", line_no + 1))?;
        let (end_str, text_cell) = rest
            .split_once(',')
            .with_context(|| format!("line {}: missing text column", line_no + 1))?;

        let start: f64 = start_str
            .trim()
            .parse()
            .with_context(|| format!("line {}: invalid start timestamp", line_no + 1))?;
        let end: f64 = end_str
            .trim()
            .parse()
            .with_context(|| format!("line {}: invalid end timestamp", line_no + 1))?;

        entries.push(CaptionEntry::new(start, end, unquote_csv_cell(text_cell)));
    }

    Ok(CaptionTimeline::from_entries(entries))
}

fn unquote_csv_cell(cell: &str) -> String {
    let cell = cell.trim();
    if cell.len() >= 2 && cell.starts_with('"') && cell.ends_with('"') {
        cell[1..cell.len() - 1].replace("\"\"", "\"")
    } else {
        cell.to_string()
    }
}
