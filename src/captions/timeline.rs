use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Single caption line with timestamps in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Caption text
    pub text: String,
}

impl CaptionEntry {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Chronologically ordered caption entries for one video.
///
/// Insertion order is chronological order; callers supply chronologically
/// produced input. Timelines are never mutated after construction — shifting
/// and subsetting derive new timelines and leave the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptionTimeline {
    entries: Vec<CaptionEntry>,
}

impl CaptionTimeline {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_entries(entries: Vec<CaptionEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CaptionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebase this timeline to a trimmed video's clock.
    ///
    /// Entries that start before `trim_offset` have no corresponding frame in
    /// the trimmed video and are dropped. Surviving entries keep their text
    /// and order, with both timestamps shifted back by `trim_offset`, so
    /// every output start is non-negative. An offset of zero is the identity.
    pub fn shift_by(&self, trim_offset: f64) -> CaptionTimeline {
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.start >= trim_offset)
            .map(|entry| CaptionEntry {
                start: entry.start - trim_offset,
                end: entry.end - trim_offset,
                text: entry.text.clone(),
            })
            .collect();

        CaptionTimeline { entries }
    }

    /// Subset of entries whose `start` falls in `[from, to)`
    pub fn entries_starting_in(&self, from: f64, to: f64) -> CaptionTimeline {
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.start >= from && entry.start < to)
            .cloned()
            .collect();

        CaptionTimeline { entries }
    }

    /// Check entries for common issues, returning human-readable findings
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.start < 0.0 {
                issues.push(format!("Entry {}: negative start time", i + 1));
            }
            if entry.end < entry.start {
                issues.push(format!("Entry {}: end time before start time", i + 1));
            }
            if entry.text.trim().is_empty() {
                issues.push(format!("Entry {}: empty text", i + 1));
            }
        }

        for pair in self.entries.windows(2) {
            if pair[1].start < pair[0].start {
                issues.push(format!(
                    "Entries starting at {:.3} and {:.3}: out of chronological order",
                    pair[0].start, pair[1].start
                ));
            }
        }

        issues
    }

    /// Save as a JSON array of `{start, end, text}` objects
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self)?;
        tokio::fs::write(path.as_ref(), json)
            .await
            .with_context(|| format!("failed to write captions to {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Load from a JSON array of `{start, end, text}` objects
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("failed to read captions from {}", path.as_ref().display()))?;
        let timeline = serde_json::from_str(&data)
            .with_context(|| format!("invalid caption JSON in {}", path.as_ref().display()))?;
        Ok(timeline)
    }
}

impl<'a> IntoIterator for &'a CaptionTimeline {
    type Item = &'a CaptionEntry;
    type IntoIter = std::slice::Iter<'a, CaptionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_timeline() -> CaptionTimeline {
        CaptionTimeline::from_entries(vec![
            CaptionEntry::new(0.0, 5.0, "x"),
            CaptionEntry::new(130.0, 134.0, "y"),
        ])
    }

    #[test]
    fn test_shift_drops_pre_trim_entries() {
        let shifted = sample_timeline().shift_by(120.5);
        assert_eq!(
            shifted.entries(),
            &[CaptionEntry::new(9.5, 13.5, "y")]
        );
    }

    #[test]
    fn test_shift_zero_is_identity() {
        let timeline = sample_timeline();
        assert_eq!(timeline.shift_by(0.0), timeline);
    }

    #[test]
    fn test_shift_never_produces_negative_starts() {
        let timeline = CaptionTimeline::from_entries(vec![
            CaptionEntry::new(10.0, 12.0, "a"),
            CaptionEntry::new(29.9, 31.0, "b"),
            CaptionEntry::new(30.0, 33.0, "c"),
            CaptionEntry::new(45.0, 48.0, "d"),
        ]);
        let shifted = timeline.shift_by(30.0);

        assert_eq!(shifted.len(), 2);
        for entry in &shifted {
            assert!(entry.start >= 0.0);
        }
        assert_eq!(shifted.entries()[0], CaptionEntry::new(0.0, 3.0, "c"));
        assert_eq!(shifted.entries()[1], CaptionEntry::new(15.0, 18.0, "d"));
    }

    #[test]
    fn test_entries_starting_in_is_half_open() {
        let timeline = CaptionTimeline::from_entries(vec![
            CaptionEntry::new(5.0, 8.0, "a"),
            CaptionEntry::new(28.0, 31.0, "b"),
            CaptionEntry::new(30.0, 32.0, "c"),
        ]);
        let subset = timeline.entries_starting_in(0.0, 30.0);

        assert_eq!(subset.len(), 2);
        assert_eq!(subset.entries()[0].text, "a");
        assert_eq!(subset.entries()[1].text, "b");
    }

    #[test]
    fn test_validate_flags_bad_entries() {
        let timeline = CaptionTimeline::from_entries(vec![
            CaptionEntry::new(10.0, 5.0, "backwards"),
            CaptionEntry::new(2.0, 3.0, ""),
        ]);
        let issues = timeline.validate();

        assert!(issues.iter().any(|i| i.contains("end time before start")));
        assert!(issues.iter().any(|i| i.contains("empty text")));
        assert!(issues.iter().any(|i| i.contains("out of chronological order")));
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.json");
        let timeline = sample_timeline();

        tokio_test::block_on(async {
            timeline.save_to_file(&path).await.unwrap();
            let loaded = CaptionTimeline::load_from_file(&path).await.unwrap();
            assert_eq!(loaded, timeline);
        });
    }
}
