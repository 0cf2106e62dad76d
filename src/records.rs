use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metadata for one discovered match broadcast.
///
/// The derived basename `"{teamA}_{teamB}_{date}_{part}"` is the
/// filename-convention join every downstream stage relies on: raw videos,
/// trimmed videos, and caption files all share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match page URL
    pub url: String,
    /// The two team tags, in broadcast order
    pub teams: Vec<String>,
    /// Match date as YYYYMMDD
    pub date: String,
    /// 1-based playlist part numbers that are actual games
    pub game_parts: Vec<u32>,
    /// Pre-match seek offset in seconds advertised by the player page
    pub start_point: Option<u32>,
}

impl MatchRecord {
    /// Canonical basename for the `n`-th game of this match (1-based)
    pub fn basename(&self, game_number: u32) -> String {
        format!("{}_{}_{}", self.teams.join("_"), self.date, game_number)
    }
}

/// Append-only JSONL store of match records.
///
/// Discovery appends one line per match and flushes immediately, so an
/// interrupted run loses at most the record in flight and re-runs resume by
/// URL.
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load all records; a missing file is an empty store
    pub fn load(&self) -> Result<Vec<MatchRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read record file {}", self.path.display()))?;

        let mut records = Vec::new();
        for (line_no, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: MatchRecord = serde_json::from_str(line).with_context(|| {
                format!("invalid record at {}:{}", self.path.display(), line_no + 1)
            })?;
            records.push(record);
        }

        debug!("Loaded {} match records from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Whether a match URL has already been recorded
    pub fn contains_url(&self, url: &str) -> Result<bool> {
        Ok(self.load()?.iter().any(|r| r.url == url))
    }

    pub fn append(&self, record: &MatchRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open record file {}", self.path.display()))?;

        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MatchRecord {
        MatchRecord {
            url: "https://example.com/video/BV1xx".to_string(),
            teams: vec!["RNG".to_string(), "EDG".to_string()],
            date: "20230415".to_string(),
            game_parts: vec![2, 3, 4],
            start_point: Some(312),
        }
    }

    #[test]
    fn test_basename_convention() {
        let record = sample_record();
        assert_eq!(record.basename(1), "RNG_EDG_20230415_1");
        assert_eq!(record.basename(3), "RNG_EDG_20230415_3");
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("records.jsonl"));

        store.append(&sample_record()).unwrap();
        let mut second = sample_record();
        second.url = "https://example.com/video/BV2yy".to_string();
        store.append(&second).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].teams, vec!["RNG", "EDG"]);
        assert_eq!(records[1].url, "https://example.com/video/BV2yy");
    }

    #[test]
    fn test_contains_url_resume() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("records.jsonl"));

        assert!(!store.contains_url("https://example.com/video/BV1xx").unwrap());
        store.append(&sample_record()).unwrap();
        assert!(store.contains_url("https://example.com/video/BV1xx").unwrap());
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let store = RecordStore::new("/nonexistent/records.jsonl");
        assert!(store.load().unwrap().is_empty());
    }
}
