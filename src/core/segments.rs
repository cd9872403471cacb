//! Candidate acquisition windows of a frame across past repeat cycles

use crate::io::CycleSchedule;
use crate::types::{Frame, Segment};
use chrono::{DateTime, Duration, Utc};

/// Convert a seconds offset (possibly fractional) to a duration at
/// microsecond resolution; `None` when it does not fit
fn offset_duration(seconds: f64) -> Option<Duration> {
    let micros = (seconds * 1_000_000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(Duration::microseconds(micros as i64))
}

/// Past windows of a frame, most recent first
///
/// Every epoch `c` yields `(c + startCY, c + endCY)`; windows starting after
/// `now` are dropped. The sort is stable, so equal starts keep schedule order.
/// Returns `None` when an offset cannot be placed on the calendar.
pub fn generate_segments(
    start_cy: f64,
    end_cy: f64,
    schedule: &CycleSchedule,
    now: DateTime<Utc>,
) -> Option<Vec<Segment>> {
    let start_offset = offset_duration(start_cy)?;
    let end_offset = offset_duration(end_cy)?;

    let mut segments = Vec::with_capacity(schedule.len());
    for epoch in schedule.epochs() {
        let start = epoch.checked_add_signed(start_offset)?;
        let end = epoch.checked_add_signed(end_offset)?;
        if start <= now {
            segments.push(Segment::new(start, end));
        }
    }

    segments.sort_by(|a, b| b.start.cmp(&a.start));
    Some(segments)
}

/// Segments for a catalog frame; empty when its cycle offsets are missing
/// or unusable
pub fn frame_segments(frame: &Frame, schedule: &CycleSchedule, now: DateTime<Utc>) -> Vec<Segment> {
    let Some((start_cy, end_cy)) = frame.cycle_offsets() else {
        return Vec::new();
    };
    generate_segments(start_cy, end_cy, schedule, now).unwrap_or_else(|| {
        log::warn!(
            "{} has cycle offsets outside the calendar: startCY={}, endCY={}",
            frame.label(),
            start_cy,
            end_cy
        );
        Vec::new()
    })
}
