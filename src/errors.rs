use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the clipping pipeline.
///
/// Per-item errors (one video, one window) are contained by the driver and
/// converted into log records plus summary counters; they never unwind the
/// batch. Only `OutputNotWritable` is surfaced before any processing starts.
#[derive(Debug, Error)]
pub enum ClipperError {
    /// A required companion file (raw video, caption document) is absent.
    #[error("missing {what} for {video}")]
    MissingInput { video: String, what: String },

    /// The trimmed video is longer than its raw counterpart, so no valid
    /// trim offset exists. Flagged for manual inspection, never clamped.
    #[error("inconsistent pair for {video}: trimmed duration {trimmed:.3}s exceeds raw duration {raw:.3}s")]
    InconsistentPair {
        video: String,
        raw: f64,
        trimmed: f64,
    },

    /// A clip cut or caption write failed; the artifact is not recorded.
    #[error("failed to materialize clip {clip}: {reason}")]
    Materialization { clip: String, reason: String },

    /// The output root is unusable. Fatal, no partial processing.
    #[error("output directory {path} is not writable: {reason}")]
    OutputNotWritable { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistent_pair_message() {
        let err = ClipperError::InconsistentPair {
            video: "RNG_EDG_20230415_1.mp4".to_string(),
            raw: 40.0,
            trimmed: 50.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("50.000s"));
        assert!(msg.contains("exceeds raw duration 40.000s"));
    }

    #[test]
    fn test_missing_input_message() {
        let err = ClipperError::MissingInput {
            video: "a.mp4".to_string(),
            what: "caption file".to_string(),
        };
        assert_eq!(err.to_string(), "missing caption file for a.mp4");
    }
}
