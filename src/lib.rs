/// Esports Clipper
///
/// Turns full-length esports match broadcasts into a dataset of short,
/// subtitle-aligned clips: discover match pages, download and trim the
/// broadcasts, collect captions, then cut each game into clips whose
/// boundaries respect caption entries.

pub mod captions;
pub mod config;
pub mod discovery;
pub mod download;
pub mod errors;
pub mod records;
pub mod refine;
pub mod retry;
pub mod segment;
pub mod transcribe;
pub mod trim;
pub mod video;

// Re-export main types for easy access
pub use crate::captions::{CaptionEntry, CaptionFetcher, CaptionTimeline};
pub use crate::config::Config;
pub use crate::discovery::MatchScraper;
pub use crate::download::VideoDownloader;
pub use crate::errors::ClipperError;
pub use crate::records::{MatchRecord, RecordStore};
pub use crate::refine::CaptionRefiner;
pub use crate::retry::RetryPolicy;
pub use crate::segment::{PlanReport, SegmentPipeline, SegmentSummary, SegmentWindow};
pub use crate::transcribe::Transcriber;
pub use crate::trim::TrimStage;
pub use crate::video::VideoProcessor;
