//! Binds a frame to the newest past segment with a complete auxiliary file set

use crate::core::search::{AuxFileSearch, AuxSearchConfig};
use crate::core::segments::generate_segments;
use crate::io::{CycleSchedule, ImageMetadataReader, ObjectStore};
use crate::types::{
    CoverageMatch, CoverageOutcome, CoverageResult, Frame, ImageBoundingBox, Segment, UnmatchedFrame,
    UnmatchedReason,
};
use chrono::{DateTime, Utc};

pub struct CoverageMatcher<'a> {
    search: AuxFileSearch<'a>,
    metadata: Option<&'a dyn ImageMetadataReader>,
}

impl<'a> CoverageMatcher<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a AuxSearchConfig) -> Self {
        Self {
            search: AuxFileSearch::new(store, config),
            metadata: None,
        }
    }

    /// Enrich matches with the RSLC bounding box read through `reader`
    pub fn with_metadata_reader(mut self, reader: &'a dyn ImageMetadataReader) -> Self {
        self.metadata = Some(reader);
        self
    }

    /// Resolve coverage for `frame` against the past cycles of `schedule`
    pub fn resolve(
        &self,
        frame: &Frame,
        schedule: &CycleSchedule,
        now: DateTime<Utc>,
    ) -> CoverageResult<CoverageOutcome> {
        let Some((start_cy, end_cy)) = frame.cycle_offsets() else {
            return Ok(CoverageOutcome::Unmatched(UnmatchedFrame::new(
                frame,
                &[],
                UnmatchedReason::MissingCycleOffsets,
            )));
        };
        let Some(segments) = generate_segments(start_cy, end_cy, schedule, now) else {
            return Ok(CoverageOutcome::Unmatched(UnmatchedFrame::new(
                frame,
                &[],
                UnmatchedReason::InvalidCycleOffsets,
            )));
        };
        self.match_segments(frame, &segments)
    }

    /// First segment, in the given order, for which every category resolves
    pub fn match_segments(&self, frame: &Frame, segments: &[Segment]) -> CoverageResult<CoverageOutcome> {
        for segment in segments {
            let result = self.search.find_aux_files(segment, frame.track, frame.frame)?;
            let missing = result.missing();

            match result.into_complete() {
                Some(files) => {
                    log::debug!("{} matched segment {}", frame.label(), segment);
                    let bounding_box = self.read_bounding_box(&files.rslc.path);
                    return Ok(CoverageOutcome::Matched(CoverageMatch {
                        segment: *segment,
                        files,
                        bounding_box,
                    }));
                }
                None => {
                    log::debug!("{} segment {} missing {:?}", frame.label(), segment, missing);
                }
            }
        }

        Ok(CoverageOutcome::Unmatched(UnmatchedFrame::new(
            frame,
            segments,
            UnmatchedReason::NoCoverage,
        )))
    }

    fn read_bounding_box(&self, rslc_uri: &str) -> Option<ImageBoundingBox> {
        let reader = self.metadata?;
        match reader.read_bounding_box(rslc_uri) {
            Ok(bbox) => Some(bbox),
            Err(e) => {
                log::warn!("Failed to read RSLC bounding box from {}: {}", rslc_uri, e);
                None
            }
        }
    }
}
