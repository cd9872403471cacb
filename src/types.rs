use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute mapping of a catalog record, kept verbatim for pass-through
pub type Attributes = Map<String, Value>;

/// Auxiliary file categories resolved for every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuxCategory {
    /// Precise orbit ephemeris (POE)
    Orbit,
    /// Radar pointing / attitude (NRP)
    Pointing,
    /// Range-Doppler single look complex image product
    Rslc,
}

impl AuxCategory {
    pub const ALL: [AuxCategory; 3] = [AuxCategory::Orbit, AuxCategory::Pointing, AuxCategory::Rslc];
}

impl std::fmt::Display for AuxCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuxCategory::Orbit => write!(f, "orbit"),
            AuxCategory::Pointing => write!(f, "pointing"),
            AuxCategory::Rslc => write!(f, "rslc"),
        }
    }
}

/// One cell of the fixed track/frame grid, normalized from a catalog record
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub track: Option<u32>,
    pub frame: Option<u32>,
    /// Acquisition window start, seconds after the start of a repeat cycle
    pub start_cy: Option<f64>,
    /// Acquisition window end, seconds after the start of a repeat cycle
    pub end_cy: Option<f64>,
    pub is_cal_val: bool,
    /// Every field of the source record, including the ones above
    pub attributes: Attributes,
}

impl Frame {
    /// Build a frame from typed values; the attribute map mirrors them
    pub fn new(track: u32, frame: u32, start_cy: f64, end_cy: f64) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("track".to_string(), Value::from(track));
        attributes.insert("frame".to_string(), Value::from(frame));
        attributes.insert("startCY".to_string(), Value::from(start_cy));
        attributes.insert("endCY".to_string(), Value::from(end_cy));

        Self {
            track: Some(track),
            frame: Some(frame),
            start_cy: Some(start_cy),
            end_cy: Some(end_cy),
            is_cal_val: false,
            attributes,
        }
    }

    /// `(startCY, endCY)` when both offsets are present
    pub fn cycle_offsets(&self) -> Option<(f64, f64)> {
        match (self.start_cy, self.end_cy) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Short human-readable identifier for log lines
    pub fn label(&self) -> String {
        let fmt = |v: Option<u32>| v.map(|v| format!("{:03}", v)).unwrap_or_else(|| "?".to_string());
        format!("track {} frame {}", fmt(self.track), fmt(self.frame))
    }
}

/// Concrete calendar window of one frame at one cycle epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Segment {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Orbit pass direction token of an image product name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassDirection {
    Ascending,
    Descending,
}

impl PassDirection {
    pub(crate) fn from_token(token: &str) -> Option<Self> {
        match token {
            "A" => Some(PassDirection::Ascending),
            "D" => Some(PassDirection::Descending),
            _ => None,
        }
    }
}

/// A resolved auxiliary file
///
/// Margins are in seconds: `start_margin = request_start - file_start`,
/// `end_margin = file_end - request_end`. Positive values mean the file
/// extends beyond the request on that side.
///
/// `cycle` and `pass_direction` are only set for image products whose name
/// carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMatch {
    pub path: String,
    pub file_start: Option<DateTime<Utc>>,
    pub file_end: Option<DateTime<Utc>>,
    pub start_margin: Option<i64>,
    pub end_margin: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_direction: Option<PassDirection>,
}

impl FileMatch {
    /// Match with a known file time span, margins computed against `window`
    pub fn spanning(
        path: String,
        file_start: DateTime<Utc>,
        file_end: DateTime<Utc>,
        window: &Segment,
    ) -> Self {
        Self {
            path,
            file_start: Some(file_start),
            file_end: Some(file_end),
            start_margin: Some((window.start - file_start).num_seconds()),
            end_margin: Some((file_end - window.end).num_seconds()),
            cycle: None,
            pass_direction: None,
        }
    }

    /// Match whose filename carried no usable time span
    pub fn untimed(path: String) -> Self {
        Self {
            path,
            file_start: None,
            file_end: None,
            start_margin: None,
            end_margin: None,
            cycle: None,
            pass_direction: None,
        }
    }

    /// Record the cycle and pass direction parsed from the product name
    pub fn with_acquisition(mut self, cycle: Option<u32>, pass_direction: Option<PassDirection>) -> Self {
        self.cycle = cycle;
        self.pass_direction = pass_direction;
        self
    }
}

/// Per-category results of one window search; `None` means nothing found
/// within the lookback horizon
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuxSearchResult {
    pub orbit: Option<FileMatch>,
    pub pointing: Option<FileMatch>,
    pub rslc: Option<FileMatch>,
}

impl AuxSearchResult {
    pub fn get(&self, category: AuxCategory) -> Option<&FileMatch> {
        match category {
            AuxCategory::Orbit => self.orbit.as_ref(),
            AuxCategory::Pointing => self.pointing.as_ref(),
            AuxCategory::Rslc => self.rslc.as_ref(),
        }
    }

    /// Categories that did not resolve
    pub fn missing(&self) -> Vec<AuxCategory> {
        AuxCategory::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_none())
            .collect()
    }

    /// All three files, only when every category resolved
    pub fn into_complete(self) -> Option<AuxFiles> {
        match (self.orbit, self.pointing, self.rslc) {
            (Some(orbit), Some(pointing), Some(rslc)) => Some(AuxFiles { orbit, pointing, rslc }),
            _ => None,
        }
    }
}

/// The complete auxiliary file set bound to one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxFiles {
    pub orbit: FileMatch,
    pub pointing: FileMatch,
    pub rslc: FileMatch,
}

/// Slant range extent and zero-Doppler times read from an RSLC product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBoundingBox {
    pub start_range: f64,
    pub end_range: f64,
    pub start_time: String,
    pub end_time: String,
}

/// Successful coverage of a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMatch {
    #[serde(rename = "matched_segment")]
    pub segment: Segment,
    pub files: AuxFiles,
    pub bounding_box: Option<ImageBoundingBox>,
}

/// Why a frame ended up without coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// `startCY` or `endCY` absent from the record
    MissingCycleOffsets,
    /// Offsets present but not placeable on the calendar (non-finite or
    /// overflowing)
    InvalidCycleOffsets,
    /// Every candidate segment was searched without a complete file set
    NoCoverage,
    /// The search itself failed (backend unreachable, worker panic)
    SearchFailed { message: String },
}

/// Diagnostic record for a frame without coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedFrame {
    pub track: Option<u32>,
    pub frame: Option<u32>,
    #[serde(rename = "startCY")]
    pub start_cy: Option<f64>,
    #[serde(rename = "endCY")]
    pub end_cy: Option<f64>,
    pub segments_examined: usize,
    /// Oldest segment start to newest segment end
    pub examined_range: Option<Segment>,
    pub reason: UnmatchedReason,
}

impl UnmatchedFrame {
    pub fn new(frame: &Frame, segments: &[Segment], reason: UnmatchedReason) -> Self {
        let examined_range = match (segments.last(), segments.first()) {
            (Some(oldest), Some(newest)) => Some(Segment::new(oldest.start, newest.end)),
            _ => None,
        };
        Self {
            track: frame.track,
            frame: frame.frame,
            start_cy: frame.start_cy,
            end_cy: frame.end_cy,
            segments_examined: segments.len(),
            examined_range,
            reason,
        }
    }
}

/// Coverage outcome of one frame
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageOutcome {
    Matched(CoverageMatch),
    Unmatched(UnmatchedFrame),
}

impl CoverageOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, CoverageOutcome::Matched(_))
    }

    pub fn as_match(&self) -> Option<&CoverageMatch> {
        match self {
            CoverageOutcome::Matched(m) => Some(m),
            CoverageOutcome::Unmatched(_) => None,
        }
    }
}

/// Serialized per-frame output: the original attributes plus `aux_coverage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(flatten)]
    pub attributes: Attributes,
    pub aux_coverage: CoverageMatch,
}

/// Error types for coverage resolution
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Listing s3://{bucket}/{prefix} failed: {message}")]
    Listing {
        bucket: String,
        prefix: String,
        message: String,
    },

    #[error("Object store unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl CoverageError {
    /// Whether the storage backend itself could not be reached, as opposed
    /// to a single prefix failing to list
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, CoverageError::BackendUnavailable(_))
    }
}

/// Result type for coverage operations
pub type CoverageResult<T> = Result<T, CoverageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_file_match_margins_are_signed() {
        let window = Segment::new(ts(0, 1, 40), ts(0, 2, 40));
        let m = FileMatch::spanning("s3://b/k".to_string(), ts(0, 1, 43), ts(0, 2, 37), &window);
        assert_eq!(m.start_margin, Some(-3));
        assert_eq!(m.end_margin, Some(-3));

        let m = FileMatch::spanning("s3://b/k".to_string(), ts(0, 0, 0), ts(1, 0, 0), &window);
        assert_eq!(m.start_margin, Some(100));
        assert_eq!(m.end_margin, Some(3440));
    }

    #[test]
    fn test_search_result_completeness() {
        let mut result = AuxSearchResult {
            orbit: Some(FileMatch::untimed("a".to_string())),
            pointing: None,
            rslc: Some(FileMatch::untimed("c".to_string())),
        };
        assert_eq!(result.missing(), vec![AuxCategory::Pointing]);
        assert!(result.clone().into_complete().is_none());

        result.pointing = Some(FileMatch::untimed("b".to_string()));
        let files = result.into_complete().expect("complete set");
        assert_eq!(files.pointing.path, "b");
    }

    #[test]
    fn test_unmatched_range_spans_oldest_to_newest() {
        let frame = Frame::new(28, 60, 100.0, 160.0);
        let newest = Segment::new(ts(0, 1, 40), ts(0, 2, 40));
        let oldest = Segment::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 40).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 40).unwrap(),
        );
        let unmatched = UnmatchedFrame::new(&frame, &[newest, oldest], UnmatchedReason::NoCoverage);
        assert_eq!(unmatched.segments_examined, 2);
        assert_eq!(unmatched.examined_range, Some(Segment::new(oldest.start, newest.end)));

        let empty = UnmatchedFrame::new(&frame, &[], UnmatchedReason::MissingCycleOffsets);
        assert_eq!(empty.examined_range, None);
    }

    #[test]
    fn test_coverage_match_uses_downstream_field_names() {
        let window = Segment::new(ts(0, 1, 40), ts(0, 2, 40));
        let file = FileMatch::untimed("s3://bucket/key".to_string());
        let record = FrameRecord {
            attributes: Frame::new(28, 60, 100.0, 160.0).attributes,
            aux_coverage: CoverageMatch {
                segment: window,
                files: AuxFiles { orbit: file.clone(), pointing: file.clone(), rslc: file },
                bounding_box: None,
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["track"], 28);
        assert!(value["aux_coverage"]["matched_segment"]["start"].is_string());
        assert_eq!(value["aux_coverage"]["files"]["orbit"]["path"], "s3://bucket/key");
        assert_eq!(value["aux_coverage"]["files"]["pointing"]["path"], "s3://bucket/key");
        assert!(value["aux_coverage"]["bounding_box"].is_null());
    }

    #[test]
    fn test_frame_label_pads_identifiers() {
        let frame = Frame::new(28, 60, 0.0, 1.0);
        assert_eq!(frame.label(), "track 028 frame 060");
    }
}
