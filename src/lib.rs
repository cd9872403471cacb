//! sarcover: auxiliary file coverage for NISAR calibration frames
//!
//! For every frame of the track/frame grid, this library projects the frame's
//! in-cycle acquisition window onto each past repeat cycle and finds the
//! newest cycle for which an orbit ephemeris, a radar pointing file and an
//! RSLC image product all exist in the archive. The result feeds run-config
//! generation for downstream processing.

pub mod config;
pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use crate::types::{
    AuxCategory, AuxFiles, AuxSearchResult, CoverageError, CoverageMatch, CoverageOutcome, CoverageResult,
    FileMatch, Frame, FrameRecord, ImageBoundingBox, PassDirection, Segment, UnmatchedFrame, UnmatchedReason,
};

pub use crate::config::{PipelineConfig, StoreConfig};
pub use crate::core::{AuxFileSearch, AuxSearchConfig, CoverageMatcher, CoverageReport, FrameProcessor, WorkerContext};
pub use crate::io::{CycleSchedule, FrameCatalog, FrameSelection, ObjectStore};
