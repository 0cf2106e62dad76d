use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::captions::CaptionTimeline;

/// Planned time range of a trimmed video, bounded by caption timestamps.
///
/// Invariant: `start < end`, and `captions` is exactly the subset of the
/// shifted timeline whose entries start in `[start, start + interval)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentWindow {
    pub start: f64,
    pub end: f64,
    pub captions: CaptionTimeline,
}

/// Interval that produced no window because no caption starts inside it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkippedInterval {
    pub start: f64,
    pub end: f64,
}

/// Outcome of window planning for one video, including how much of the
/// video the emitted windows do not cover (skipped intervals plus the
/// dropped trailing remainder).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanReport {
    pub windows: Vec<SegmentWindow>,
    pub skipped: Vec<SkippedInterval>,
    pub uncovered_seconds: f64,
}

/// Partition a trimmed video into sequential caption-bounded windows.
///
/// The cursor starts at 0 and advances while a full `interval` still fits
/// before `video_duration`. Each window absorbs every caption that starts in
/// `[cursor, cursor + interval)` and ends at the latest end time among them
/// (capped at `video_duration`), so a caption whose end extends slightly past
/// the interval is never split across two windows. An interval with no
/// qualifying caption is skipped without emitting a window, and the trailing
/// remainder shorter than one interval is dropped.
///
/// Boundaries are rounded to millisecond precision so downstream cut points
/// and filenames are stable across runs.
pub fn plan_windows(
    video_duration: f64,
    timeline: &CaptionTimeline,
    interval: f64,
) -> PlanReport {
    let mut report = PlanReport::default();

    // A non-positive interval would keep the cursor from ever advancing.
    if interval <= 0.0 {
        warn!("Clip interval must be positive, got {}; nothing planned", interval);
        report.uncovered_seconds = round_ms(video_duration.max(0.0));
        return report;
    }

    let mut cursor: f64 = 0.0;
    let mut skipped_seconds: f64 = 0.0;

    while cursor + interval < video_duration {
        let lower = cursor;
        let upper = cursor + interval;

        let captions = timeline.entries_starting_in(lower, upper);
        let mut boundary = cursor;
        for entry in &captions {
            boundary = boundary.max(round_ms(entry.end.min(video_duration)));
        }

        if boundary <= cursor {
            debug!(
                "No captions start between {:.3}s and {:.3}s, skipping interval",
                lower, upper
            );
            report.skipped.push(SkippedInterval {
                start: round_ms(lower),
                end: round_ms(upper),
            });
            skipped_seconds += interval;
            cursor += interval;
            continue;
        }

        report.windows.push(SegmentWindow {
            start: round_ms(cursor),
            end: boundary,
            captions,
        });
        cursor = boundary;
    }

    // Skipped intervals plus the dropped tail are the uncovered portion.
    let tail = (video_duration - cursor).max(0.0);
    report.uncovered_seconds = round_ms(skipped_seconds + tail);

    report
}

/// Round a timestamp to millisecond precision
pub fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Render a millisecond-rounded timestamp for filenames: trailing zeros are
/// trimmed so `31.0` becomes `31` and `9.5330` becomes `9.533`.
pub fn format_ts(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as i64;
    if millis % 1000 == 0 {
        return (millis / 1000).to_string();
    }
    let mut rendered = format!("{:.3}", millis as f64 / 1000.0);
    while rendered.ends_with('0') {
        rendered.pop();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::CaptionEntry;

    fn timeline(entries: &[(f64, f64, &str)]) -> CaptionTimeline {
        CaptionTimeline::from_entries(
            entries
                .iter()
                .map(|(s, e, t)| CaptionEntry::new(*s, *e, *t))
                .collect(),
        )
    }

    #[test]
    fn test_window_absorbs_caption_past_interval_edge() {
        // Caption "b" starts at 28 (inside [0, 30)) but ends at 31, so the
        // first window stretches to 31 rather than splitting it mid-sentence.
        let captions = timeline(&[(5.0, 8.0, "a"), (28.0, 31.0, "b"), (60.0, 62.0, "c")]);
        let report = plan_windows(95.0, &captions, 30.0);

        assert_eq!(report.windows.len(), 2);

        let w1 = &report.windows[0];
        assert_eq!(w1.start, 0.0);
        assert_eq!(w1.end, 31.0);
        assert_eq!(w1.captions.len(), 2);

        let w2 = &report.windows[1];
        assert_eq!(w2.start, 31.0);
        assert_eq!(w2.end, 62.0);
        assert_eq!(w2.captions.len(), 1);
        assert_eq!(w2.captions.entries()[0].text, "c");

        // [62, 92) has no captions and is skipped; the 3s tail [92, 95) is
        // shorter than one interval and dropped.
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0], SkippedInterval { start: 62.0, end: 92.0 });
        assert_eq!(report.uncovered_seconds, 33.0);
    }

    #[test]
    fn test_windows_are_increasing_and_non_overlapping() {
        let captions = timeline(&[
            (1.0, 4.0, "a"),
            (10.0, 14.0, "b"),
            (33.0, 36.0, "c"),
            (36.5, 39.0, "d"),
            (70.0, 75.0, "e"),
        ]);
        let report = plan_windows(120.0, &captions, 30.0);

        for pair in report.windows.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
        for window in &report.windows {
            assert!(window.start < window.end);
        }
    }

    #[test]
    fn test_each_caption_assigned_to_exactly_one_window() {
        let captions = timeline(&[
            (1.0, 4.0, "a"),
            (10.0, 14.0, "b"),
            (33.0, 36.0, "c"),
            (36.5, 39.0, "d"),
            (70.0, 75.0, "e"),
        ]);
        let report = plan_windows(120.0, &captions, 30.0);

        let assigned: Vec<&str> = report
            .windows
            .iter()
            .flat_map(|w| w.captions.entries().iter().map(|e| e.text.as_str()))
            .collect();

        let mut deduped = assigned.clone();
        deduped.dedup();
        assert_eq!(assigned, deduped, "a caption was assigned twice");

        let last_end = report.windows.last().unwrap().end;
        for entry in &captions {
            if entry.start < last_end {
                assert!(
                    assigned.contains(&entry.text.as_str()),
                    "caption {:?} silently dropped",
                    entry.text
                );
            }
        }
    }

    #[test]
    fn test_empty_timeline_emits_no_windows() {
        let report = plan_windows(100.0, &CaptionTimeline::new(), 30.0);
        assert!(report.windows.is_empty());
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(report.uncovered_seconds, 100.0);
    }

    #[test]
    fn test_video_shorter_than_interval_emits_nothing() {
        let captions = timeline(&[(1.0, 2.0, "a")]);
        let report = plan_windows(20.0, &captions, 30.0);
        assert!(report.windows.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(report.uncovered_seconds, 20.0);
    }

    #[test]
    fn test_boundaries_rounded_to_milliseconds() {
        let captions = timeline(&[(0.5, 10.12345, "a")]);
        let report = plan_windows(60.0, &captions, 30.0);
        assert_eq!(report.windows[0].end, 10.123);
    }

    #[test]
    fn test_caption_end_capped_at_video_duration() {
        let captions = timeline(&[(25.0, 70.0, "runs long")]);
        let report = plan_windows(50.0, &captions, 30.0);
        assert_eq!(report.windows[0].end, 50.0);
    }

    #[test]
    fn test_non_positive_interval_plans_nothing() {
        let captions = timeline(&[(5.0, 8.0, "a"), (40.0, 44.0, "b")]);

        let report = plan_windows(95.0, &captions, 0.0);
        assert!(report.windows.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(report.uncovered_seconds, 95.0);

        let report = plan_windows(95.0, &captions, -30.0);
        assert!(report.windows.is_empty());
    }

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(0.0), "0");
        assert_eq!(format_ts(31.0), "31");
        assert_eq!(format_ts(62.5), "62.5");
        assert_eq!(format_ts(9.533), "9.533");
        assert_eq!(format_ts(9.5330001), "9.533");
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(10.12345), 10.123);
        assert_eq!(round_ms(10.1235), 10.124);
    }
}
