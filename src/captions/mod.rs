pub mod fetch;
pub mod source;
pub mod timeline;

pub use fetch::CaptionFetcher;
pub use source::RawCaptionDocument;
pub use timeline::{CaptionEntry, CaptionTimeline};
