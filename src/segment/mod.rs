//! Trim-and-segment alignment engine: pairs trimmed videos with rebased
//! caption timelines, plans caption-bounded windows, and materializes each
//! window as a clip + caption artifact pair.

pub mod driver;
pub mod materializer;
pub mod pairing;
pub mod planner;

pub use driver::{SegmentPipeline, SegmentSummary};
pub use materializer::{ClipArtifact, ClipMaterializer};
pub use pairing::{PairingOutcome, PairingResolver, VideoCaptionPair};
pub use planner::{plan_windows, PlanReport, SegmentWindow, SkippedInterval};
