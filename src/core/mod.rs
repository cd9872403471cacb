//! Core coverage resolution modules

pub mod filename;
pub mod matcher;
pub mod processor;
pub mod search;
pub mod segments;

// Re-export main types
pub use filename::{parse_filename_time, ProductIdentity, ProductNameLayout, TimestampStrategy};
pub use matcher::CoverageMatcher;
pub use processor::{process_frame, CoverageReport, FrameOutcome, FrameProcessor, ReportSummary, WorkerContext};
pub use search::{AuxFileSearch, AuxSearchConfig, IdentityQuery, TimeRangeQuery};
pub use segments::{frame_segments, generate_segments};
