//! Filename conventions of auxiliary and image products
//!
//! Product names are `_`-delimited. Ephemeris and attitude products end in
//! their validity window (`..._20240131T000000_20240202T000000.xml`); RSLC
//! products carry cycle, track, pass direction and frame at fixed positions
//! followed by the acquisition start/stop times, e.g.
//! `NISAR_L1_PR_RSLC_012_028_D_060_2000_SHNA_A_20240201T000140_20240201T000240_..._001.h5`.

use crate::types::PassDirection;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Compact timestamp format used in product names
pub const FILENAME_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

fn compact_timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{8}T\d{6}$").expect("static regex"))
}

/// Parse a `YYYYMMDDTHHMMSS` token as UTC
pub fn parse_filename_time(token: &str) -> Option<DateTime<Utc>> {
    if !compact_timestamp_regex().is_match(token) {
        return None;
    }
    NaiveDateTime::parse_from_str(token, FILENAME_TIME_FORMAT)
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// Final path component of an object key
pub fn key_basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Basename of a key with its last extension removed
pub fn key_stem(key: &str) -> &str {
    let base = key_basename(key);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

/// `_`-delimited tokens of a key's stem
pub fn stem_tokens(key: &str) -> Vec<&str> {
    key_stem(key).split('_').collect()
}

/// How a `(start, end)` time pair is pulled out of filename tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampStrategy {
    /// The last two tokens must both be timestamps
    LastTwo,
    /// Scan every token, keep the last two that parse
    ScanAll,
}

impl TimestampStrategy {
    pub fn extract(&self, tokens: &[&str]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            TimestampStrategy::LastTwo => {
                if tokens.len() < 2 {
                    return None;
                }
                let start = parse_filename_time(tokens[tokens.len() - 2])?;
                let end = parse_filename_time(tokens[tokens.len() - 1])?;
                Some((start, end))
            }
            TimestampStrategy::ScanAll => {
                let times: Vec<DateTime<Utc>> = tokens
                    .iter()
                    .filter_map(|t| parse_filename_time(t))
                    .collect();
                match times.as_slice() {
                    [.., start, end] => Some((*start, *end)),
                    _ => None,
                }
            }
        }
    }
}

/// Fixed-position layout of image product names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductNameLayout {
    pub product_marker: String,
    pub marker_index: usize,
    pub cycle_index: usize,
    pub track_index: usize,
    pub direction_index: usize,
    pub frame_index: usize,
    pub min_tokens: usize,
}

impl Default for ProductNameLayout {
    fn default() -> Self {
        Self {
            product_marker: "RSLC".to_string(),
            marker_index: 3,
            cycle_index: 4,
            track_index: 5,
            direction_index: 6,
            frame_index: 7,
            min_tokens: 8,
        }
    }
}

/// Identity fields recovered from an image product name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductIdentity {
    pub cycle: Option<u32>,
    pub track: u32,
    pub frame: u32,
    pub direction: Option<PassDirection>,
}

impl ProductNameLayout {
    /// Recover track/frame identity from stem tokens; `None` on any
    /// structural mismatch
    pub fn parse_identity(&self, tokens: &[&str]) -> Option<ProductIdentity> {
        if tokens.len() < self.min_tokens {
            return None;
        }
        if tokens.get(self.marker_index) != Some(&self.product_marker.as_str()) {
            return None;
        }
        let track = tokens.get(self.track_index)?.parse::<u32>().ok()?;
        let frame = tokens.get(self.frame_index)?.parse::<u32>().ok()?;

        Some(ProductIdentity {
            cycle: tokens.get(self.cycle_index).and_then(|t| t.parse::<u32>().ok()),
            track,
            frame,
            direction: tokens.get(self.direction_index).and_then(|t| PassDirection::from_token(t)),
        })
    }
}
