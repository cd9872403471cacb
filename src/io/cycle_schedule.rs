use crate::types::{CoverageError, CoverageResult};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::path::Path;

/// Ordered repeat-cycle start times of the mission
///
/// Shared read-only by every worker; the order of epochs is kept as loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSchedule {
    epochs: Vec<DateTime<Utc>>,
}

impl CycleSchedule {
    pub fn new(epochs: Vec<DateTime<Utc>>) -> Self {
        Self { epochs }
    }

    /// `count` epochs spaced `period` apart starting at `first`
    pub fn periodic(first: DateTime<Utc>, period: Duration, count: usize) -> CoverageResult<Self> {
        if period <= Duration::zero() {
            return Err(CoverageError::Config(format!(
                "Cycle period must be positive, got {} s",
                period.num_seconds()
            )));
        }
        let count = i32::try_from(count)
            .map_err(|_| CoverageError::Config(format!("Too many cycles requested: {}", count)))?;
        let epochs = (0..count)
            .map(|i| {
                period
                    .checked_mul(i)
                    .and_then(|offset| first.checked_add_signed(offset))
                    .ok_or_else(|| CoverageError::Config(format!("Cycle {} falls outside the calendar", i)))
            })
            .collect::<CoverageResult<Vec<_>>>()?;
        Ok(Self { epochs })
    }

    /// Load a schedule from a JSON array or a newline-separated list
    pub fn load<P: AsRef<Path>>(path: P) -> CoverageResult<Self> {
        log::info!("Loading cycle schedule from {}", path.as_ref().display());
        let content = super::read_text(&path)?;
        let schedule = Self::parse(&content)?;
        log::info!("Loaded {} cycle epochs", schedule.len());
        Ok(schedule)
    }

    pub fn parse(content: &str) -> CoverageResult<Self> {
        let trimmed = content.trim_start();
        let epochs = if trimmed.starts_with('[') {
            let values: Vec<Value> = serde_json::from_str(trimmed)?;
            values.iter().map(parse_epoch_value).collect::<CoverageResult<Vec<_>>>()?
        } else {
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(parse_epoch)
                .collect::<CoverageResult<Vec<_>>>()?
        };
        Ok(Self { epochs })
    }

    pub fn epochs(&self) -> &[DateTime<Utc>] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

fn parse_epoch_value(value: &Value) -> CoverageResult<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_epoch(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| CoverageError::InvalidFormat(format!("Invalid epoch seconds: {}", n))),
        other => Err(CoverageError::InvalidFormat(format!("Invalid cycle epoch: {}", other))),
    }
}

/// Parse an epoch as RFC 3339, or as a naive timestamp taken to be UTC
pub fn parse_epoch(s: &str) -> CoverageResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    Err(CoverageError::InvalidFormat(format!("Invalid cycle epoch: {}", s)))
}
