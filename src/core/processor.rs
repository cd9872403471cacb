//! Fans coverage resolution out over a fixed-size worker pool
//!
//! Each worker owns one `WorkerContext` (object store client plus optional
//! metadata reader), built lazily the first time the worker picks up a frame
//! and reused for the rest of the run. Workers share nothing mutable; the
//! schedule and search configuration are borrowed read-only.

use crate::core::matcher::CoverageMatcher;
use crate::core::search::AuxSearchConfig;
use crate::core::segments::frame_segments;
use crate::io::{CycleSchedule, ImageMetadataReader, ObjectStore};
use crate::types::{
    CoverageError, CoverageOutcome, CoverageResult, Frame, FrameRecord, Segment, UnmatchedFrame,
    UnmatchedReason,
};
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Per-worker resources, never shared between workers
pub struct WorkerContext {
    pub store: Box<dyn ObjectStore>,
    pub metadata_reader: Option<Box<dyn ImageMetadataReader>>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("store", &self.store.describe())
            .field("metadata_reader", &self.metadata_reader.is_some())
            .finish()
    }
}

impl WorkerContext {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self {
            store,
            metadata_reader: None,
        }
    }

    pub fn with_metadata_reader(mut self, reader: Box<dyn ImageMetadataReader>) -> Self {
        self.metadata_reader = Some(reader);
        self
    }

    pub fn matcher<'a>(&'a self, config: &'a AuxSearchConfig) -> CoverageMatcher<'a> {
        let matcher = CoverageMatcher::new(self.store.as_ref(), config);
        match &self.metadata_reader {
            Some(reader) => matcher.with_metadata_reader(reader.as_ref()),
            None => matcher,
        }
    }
}

/// Builds one `WorkerContext`; called once up front and once per worker
pub type ContextFactory = dyn Fn() -> CoverageResult<WorkerContext> + Send + Sync;

/// A frame together with its coverage outcome
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub frame: Frame,
    pub outcome: CoverageOutcome,
}

/// Resolve one frame; never fails, failures become `SearchFailed`
pub fn process_frame(
    context: &WorkerContext,
    config: &AuxSearchConfig,
    frame: &Frame,
    schedule: &CycleSchedule,
    now: DateTime<Utc>,
) -> CoverageOutcome {
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        context.matcher(config).resolve(frame, schedule, now)
    }));

    let failure = |message: String| {
        CoverageOutcome::Unmatched(UnmatchedFrame::new(
            frame,
            &examined_segments(frame, schedule, now),
            UnmatchedReason::SearchFailed { message },
        ))
    };

    let outcome = match attempt {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => failure(e.to_string()),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            failure(format!("panic: {}", message))
        }
    };

    match &outcome {
        CoverageOutcome::Matched(m) => {
            log::debug!("{} matched {}", frame.label(), m.segment.start.to_rfc3339());
        }
        CoverageOutcome::Unmatched(u) => {
            let range = u
                .examined_range
                .map(|r| r.to_string())
                .unwrap_or_else(|| "(no segments)".to_string());
            log::warn!(
                "No coverage found for {}: startCY={:?}, endCY={:?}, segments_checked={}, segment_range={}, reason={:?}",
                frame.label(),
                frame.start_cy,
                frame.end_cy,
                u.segments_examined,
                range,
                u.reason
            );
        }
    }
    outcome
}

/// Segments reported for a failed frame; a panic here leaves the list empty
fn examined_segments(frame: &Frame, schedule: &CycleSchedule, now: DateTime<Utc>) -> Vec<Segment> {
    panic::catch_unwind(AssertUnwindSafe(|| frame_segments(frame, schedule, now))).unwrap_or_default()
}

/// Counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub matched: usize,
    pub missing_offsets: usize,
    pub invalid_offsets: usize,
    pub no_coverage: usize,
    pub search_failed: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} matched, {} without cycle offsets, {} with unusable cycle offsets, {} without coverage, {} failed",
            self.matched, self.missing_offsets, self.invalid_offsets, self.no_coverage, self.search_failed
        )
    }
}

/// Aggregated results; matched frames keep their catalog attributes
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub matched: Vec<FrameRecord>,
    pub unmatched: Vec<UnmatchedFrame>,
}

impl CoverageReport {
    pub fn from_outcomes<I: IntoIterator<Item = FrameOutcome>>(outcomes: I) -> Self {
        let mut report = Self::default();
        for FrameOutcome { frame, outcome } in outcomes {
            match outcome {
                CoverageOutcome::Matched(aux_coverage) => report.matched.push(FrameRecord {
                    attributes: frame.attributes,
                    aux_coverage,
                }),
                CoverageOutcome::Unmatched(unmatched) => report.unmatched.push(unmatched),
            }
        }
        report
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            matched: self.matched.len(),
            ..Default::default()
        };
        for u in &self.unmatched {
            match u.reason {
                UnmatchedReason::MissingCycleOffsets => summary.missing_offsets += 1,
                UnmatchedReason::InvalidCycleOffsets => summary.invalid_offsets += 1,
                UnmatchedReason::NoCoverage => summary.no_coverage += 1,
                UnmatchedReason::SearchFailed { .. } => summary.search_failed += 1,
            }
        }
        summary
    }
}

/// Runs the coverage matcher over every frame
pub struct FrameProcessor {
    factory: Arc<ContextFactory>,
    search: AuxSearchConfig,
    workers: usize,
}

impl FrameProcessor {
    pub fn new<F>(search: AuxSearchConfig, factory: F) -> Self
    where
        F: Fn() -> CoverageResult<WorkerContext> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            search,
            workers: default_workers(),
        }
    }

    /// Worker count; zero selects the available parallelism
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 { default_workers() } else { workers };
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every frame and aggregate the outcomes
    ///
    /// The first context is built, and every configured bucket checked
    /// through it, before any frame is touched; an unusable backend fails the
    /// run instead of every frame.
    pub fn run(
        &self,
        frames: Vec<Frame>,
        schedule: &CycleSchedule,
        now: DateTime<Utc>,
    ) -> CoverageResult<CoverageReport> {
        let first = (self.factory)()?;
        self.check_backend(&first)?;
        log::info!(
            "Processing {} frames with {} workers against {}",
            frames.len(),
            self.workers,
            first.store.describe()
        );

        let start_time = std::time::Instant::now();
        let outcomes = self.run_frames(first, frames, schedule, now)?;
        let report = CoverageReport::from_outcomes(outcomes);

        log::info!("Coverage search finished in {:?}: {}", start_time.elapsed(), report.summary());
        Ok(report)
    }

    fn check_backend(&self, context: &WorkerContext) -> CoverageResult<()> {
        let mut buckets = vec![
            self.search.orbit.bucket.as_str(),
            self.search.pointing.bucket.as_str(),
            self.search.rslc.bucket.as_str(),
        ];
        buckets.sort_unstable();
        buckets.dedup();

        for bucket in buckets {
            match context.store.check_access(bucket) {
                Ok(()) => log::debug!("Bucket {} is accessible", bucket),
                Err(e) if e.is_backend_unavailable() => return Err(e),
                Err(e) => log::warn!("Access check for bucket {} failed: {}", bucket, e),
            }
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn run_frames(
        &self,
        first: WorkerContext,
        frames: Vec<Frame>,
        schedule: &CycleSchedule,
        now: DateTime<Utc>,
    ) -> CoverageResult<Vec<FrameOutcome>> {
        use rayon::prelude::*;
        use std::sync::OnceLock;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("coverage-worker-{}", i))
            .build()
            .map_err(|e| CoverageError::Processing(format!("Failed to build worker pool: {}", e)))?;

        let contexts: Vec<OnceLock<Result<WorkerContext, String>>> =
            (0..self.workers).map(|_| OnceLock::new()).collect();
        // The up-front context serves worker 0
        let _ = contexts[0].set(Ok(first));

        let outcomes: Vec<FrameOutcome> = pool.install(|| {
            frames
                .into_par_iter()
                .map(|frame| {
                    let worker = rayon::current_thread_index().unwrap_or(0) % contexts.len();
                    let context = contexts[worker].get_or_init(|| {
                        log::debug!("Initializing context for worker {}", worker);
                        (self.factory)().map_err(|e| e.to_string())
                    });

                    let outcome = match context {
                        Ok(context) => process_frame(context, &self.search, &frame, schedule, now),
                        Err(message) => CoverageOutcome::Unmatched(UnmatchedFrame::new(
                            &frame,
                            &examined_segments(&frame, schedule, now),
                            UnmatchedReason::SearchFailed {
                                message: format!("worker context unavailable: {}", message),
                            },
                        )),
                    };
                    FrameOutcome { frame, outcome }
                })
                .collect()
        });
        Ok(outcomes)
    }

    #[cfg(not(feature = "parallel"))]
    fn run_frames(
        &self,
        first: WorkerContext,
        frames: Vec<Frame>,
        schedule: &CycleSchedule,
        now: DateTime<Utc>,
    ) -> CoverageResult<Vec<FrameOutcome>> {
        Ok(frames
            .into_iter()
            .map(|frame| {
                let outcome = process_frame(&first, &self.search, &frame, schedule, now);
                FrameOutcome { frame, outcome }
            })
            .collect())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
