//! Auxiliary file search over day-partitioned object store prefixes
//!
//! Every category is searched by walking day partitions backwards from the
//! window start, newest day first, for `lookback_days + 1` days. The first
//! acceptable candidate wins; candidates are visited in listing order and no
//! ranking between acceptable candidates is attempted.

use crate::core::filename::{stem_tokens, ProductNameLayout, TimestampStrategy};
use crate::io::ObjectStore;
use crate::types::{AuxSearchResult, CoverageError, CoverageResult, FileMatch, Segment};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 3;
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%d/";

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_last_two() -> TimestampStrategy {
    TimestampStrategy::LastTwo
}

/// Time-range containment search for products declaring a validity window
/// in their name (orbit ephemeris, pointing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeQuery {
    pub bucket: String,
    /// Key prefix preceding the day partition, e.g. `products/POE/`
    pub prefix_root: String,
    /// strftime format of the day partition appended to `prefix_root`
    #[serde(default = "default_date_format")]
    pub date_format: String,
    pub suffix: String,
    #[serde(default = "default_last_two")]
    pub timestamps: TimestampStrategy,
    /// Accept near misses whose start and end each lie within this many
    /// seconds of the window
    #[serde(default)]
    pub tolerance_seconds: Option<u32>,
}

impl TimeRangeQuery {
    pub fn orbit() -> Self {
        Self {
            bucket: "nisar-ops-lts-fwd".to_string(),
            prefix_root: "products/POE/".to_string(),
            date_format: default_date_format(),
            suffix: ".xml".to_string(),
            timestamps: TimestampStrategy::LastTwo,
            tolerance_seconds: None,
        }
    }

    pub fn pointing() -> Self {
        Self {
            prefix_root: "products/NRP/".to_string(),
            ..Self::orbit()
        }
    }

    /// Whether a file spanning `[file_start, file_end]` serves `window`
    pub fn accepts(&self, file_start: DateTime<Utc>, file_end: DateTime<Utc>, window: &Segment) -> bool {
        let contained = file_start <= window.start && file_end >= window.end;
        let within_tolerance = self.tolerance_seconds.map_or(false, |tol| {
            let tol_ms = i64::from(tol) * 1000;
            (file_start - window.start).num_milliseconds().abs() <= tol_ms
                && (file_end - window.end).num_milliseconds().abs() <= tol_ms
        });
        contained || within_tolerance
    }
}

/// Identity search for image products named after their track and frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityQuery {
    pub bucket: String,
    pub prefix_root: String,
    pub date_format: String,
    pub suffix: String,
    pub layout: ProductNameLayout,
    /// Used for margins only, never for acceptance
    pub timestamps: TimestampStrategy,
}

impl Default for IdentityQuery {
    fn default() -> Self {
        Self {
            bucket: "nisar-ops-rs-fwd".to_string(),
            prefix_root: "products/L1_L_RSLC/".to_string(),
            date_format: default_date_format(),
            suffix: ".h5".to_string(),
            layout: ProductNameLayout::default(),
            timestamps: TimestampStrategy::ScanAll,
        }
    }
}

/// Search settings for the three auxiliary categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxSearchConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "TimeRangeQuery::orbit")]
    pub orbit: TimeRangeQuery,
    #[serde(default = "TimeRangeQuery::pointing")]
    pub pointing: TimeRangeQuery,
    #[serde(default)]
    pub rslc: IdentityQuery,
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

impl Default for AuxSearchConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            orbit: TimeRangeQuery::orbit(),
            pointing: TimeRangeQuery::pointing(),
            rslc: IdentityQuery::default(),
        }
    }
}

impl AuxSearchConfig {
    /// Reject date formats chrono cannot render
    pub fn validate(&self) -> CoverageResult<()> {
        for (name, format) in [
            ("orbit", &self.orbit.date_format),
            ("pointing", &self.pointing.date_format),
            ("rslc", &self.rslc.date_format),
        ] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(CoverageError::Config(format!(
                    "Invalid {} date partition format: {}",
                    name, format
                )));
            }
        }
        Ok(())
    }
}

/// Searches one object store with one configuration
pub struct AuxFileSearch<'a> {
    store: &'a dyn ObjectStore,
    config: &'a AuxSearchConfig,
}

impl<'a> AuxFileSearch<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a AuxSearchConfig) -> Self {
        Self { store, config }
    }

    /// Day partitions to visit for `window`, newest first
    fn search_prefixes(&self, prefix_root: &str, date_format: &str, window: &Segment) -> Vec<String> {
        (0..=self.config.lookback_days)
            .map(|i| {
                let day = window.start - Duration::days(i64::from(i));
                format!("{}{}", prefix_root, day.format(date_format))
            })
            .collect()
    }

    /// Keys of one day partition; a failing partition counts as empty unless
    /// the whole backend is unavailable
    fn list_partition(&self, bucket: &str, prefix: &str) -> CoverageResult<Vec<String>> {
        log::debug!("Searching s3://{}/{}", bucket, prefix);
        match self.store.list_keys(bucket, prefix) {
            Ok(keys) => Ok(keys),
            Err(e) if e.is_backend_unavailable() => Err(e),
            Err(e) => {
                log::warn!("Skipping partition s3://{}/{}: {}", bucket, prefix, e);
                Ok(Vec::new())
            }
        }
    }

    /// First file whose declared time range covers `window`
    pub fn find_time_range(&self, query: &TimeRangeQuery, window: &Segment) -> CoverageResult<Option<FileMatch>> {
        for prefix in self.search_prefixes(&query.prefix_root, &query.date_format, window) {
            for key in self.list_partition(&query.bucket, &prefix)? {
                if !key.ends_with(&query.suffix) {
                    continue;
                }
                let Some((file_start, file_end)) = query.timestamps.extract(&stem_tokens(&key)) else {
                    log::debug!("Skipping {}: no time range in name", key);
                    continue;
                };
                if query.accepts(file_start, file_end, window) {
                    log::debug!("Match found s3://{}/{}", query.bucket, key);
                    let path = self.store.object_uri(&query.bucket, &key);
                    return Ok(Some(FileMatch::spanning(path, file_start, file_end, window)));
                }
            }
        }
        Ok(None)
    }

    /// First image product named after `track`/`frame` within the lookback
    /// horizon; `None` without listing when either identifier is missing
    pub fn find_by_identity(
        &self,
        query: &IdentityQuery,
        window: &Segment,
        track: Option<u32>,
        frame: Option<u32>,
    ) -> CoverageResult<Option<FileMatch>> {
        let (Some(track), Some(frame)) = (track, frame) else {
            return Ok(None);
        };

        for prefix in self.search_prefixes(&query.prefix_root, &query.date_format, window) {
            for key in self.list_partition(&query.bucket, &prefix)? {
                if !key.ends_with(&query.suffix) {
                    continue;
                }
                let tokens = stem_tokens(&key);
                let Some(identity) = query.layout.parse_identity(&tokens) else {
                    continue;
                };
                if identity.track != track || identity.frame != frame {
                    continue;
                }

                log::debug!("Match found s3://{}/{}", query.bucket, key);
                let path = self.store.object_uri(&query.bucket, &key);
                let file_match = match query.timestamps.extract(&tokens) {
                    Some((file_start, file_end)) => FileMatch::spanning(path, file_start, file_end, window),
                    None => FileMatch::untimed(path),
                };
                return Ok(Some(file_match.with_acquisition(identity.cycle, identity.direction)));
            }
        }
        Ok(None)
    }

    /// Resolve orbit, pointing and RSLC for one window, in that order
    pub fn find_aux_files(
        &self,
        window: &Segment,
        track: Option<u32>,
        frame: Option<u32>,
    ) -> CoverageResult<AuxSearchResult> {
        Ok(AuxSearchResult {
            orbit: self.find_time_range(&self.config.orbit, window)?,
            pointing: self.find_time_range(&self.config.pointing, window)?,
            rslc: self.find_by_identity(&self.config.rslc, window, track, frame)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryObjectStore;
    use chrono::TimeZone;

    fn window() -> Segment {
        Segment::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 1, 40).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 2, 40).unwrap(),
        )
    }

    fn poe(day: &str, start: &str, end: &str) -> String {
        format!("products/POE/{}/NISAR_ANC_L_PR_POE_20240210T000000_{}_{}.xml", day, start, end)
    }

    #[test]
    fn test_accepts_containment_and_tolerance() {
        let w = window();
        let mut query = TimeRangeQuery::orbit();
        let inset_start = w.start + Duration::seconds(3);
        let inset_end = w.end - Duration::seconds(3);

        assert!(query.accepts(w.start, w.end, &w));
        assert!(!query.accepts(inset_start, inset_end, &w));

        query.tolerance_seconds = Some(5);
        assert!(query.accepts(inset_start, inset_end, &w));

        query.tolerance_seconds = Some(1);
        assert!(!query.accepts(inset_start, inset_end, &w));
    }

    #[test]
    fn test_search_prefixes_walk_backwards_inclusive() {
        let store = MemoryObjectStore::new();
        let config = AuxSearchConfig::default();
        let search = AuxFileSearch::new(&store, &config);
        let prefixes = search.search_prefixes("products/POE/", DEFAULT_DATE_FORMAT, &window());
        assert_eq!(
            prefixes,
            vec![
                "products/POE/2024/02/01/",
                "products/POE/2024/01/31/",
                "products/POE/2024/01/30/",
                "products/POE/2024/01/29/",
            ]
        );
    }

    #[test]
    fn test_time_range_skips_wrong_suffix_and_unparseable() {
        let store = MemoryObjectStore::new()
            .with_object("nisar-ops-lts-fwd", "products/POE/2024/02/01/README.txt")
            .with_object("nisar-ops-lts-fwd", "products/POE/2024/02/01/broken_name.xml")
            .with_object(
                "nisar-ops-lts-fwd",
                &poe("2024/02/01", "20240131T000000", "20240202T000000"),
            );
        let config = AuxSearchConfig::default();
        let search = AuxFileSearch::new(&store, &config);

        let found = search.find_time_range(&config.orbit, &window()).unwrap().unwrap();
        assert_eq!(
            found.path,
            format!("s3://nisar-ops-lts-fwd/{}", poe("2024/02/01", "20240131T000000", "20240202T000000"))
        );
        assert_eq!(found.start_margin, Some(86500));
    }

    #[test]
    fn test_failing_partition_is_skipped() {
        let store = MemoryObjectStore::new()
            .with_object(
                "nisar-ops-lts-fwd",
                &poe("2024/01/31", "20240131T000000", "20240202T000000"),
            )
            .fail_prefix("nisar-ops-lts-fwd", "products/POE/2024/02/01/");
        let config = AuxSearchConfig::default();
        let search = AuxFileSearch::new(&store, &config);

        assert!(search.find_time_range(&config.orbit, &window()).unwrap().is_some());
    }

    #[test]
    fn test_unreachable_backend_propagates() {
        let store = MemoryObjectStore::new().unreachable();
        let config = AuxSearchConfig::default();
        let search = AuxFileSearch::new(&store, &config);

        let err = search.find_time_range(&config.orbit, &window()).unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn test_identity_requires_track_and_frame() {
        let store = MemoryObjectStore::new();
        let config = AuxSearchConfig::default();
        let search = AuxFileSearch::new(&store, &config);

        assert!(search.find_by_identity(&config.rslc, &window(), Some(28), None).unwrap().is_none());
        assert!(search.find_by_identity(&config.rslc, &window(), None, Some(60)).unwrap().is_none());
        assert_eq!(store.list_calls(), 0);
    }

    #[test]
    fn test_identity_match_without_timestamps_is_untimed() {
        let key = "products/L1_L_RSLC/2024/02/01/NISAR_L1_PR_RSLC_012_028_D_060_2000_SHNA_A.h5";
        let store = MemoryObjectStore::new().with_object("nisar-ops-rs-fwd", key);
        let config = AuxSearchConfig::default();
        let search = AuxFileSearch::new(&store, &config);

        let found = search
            .find_by_identity(&config.rslc, &window(), Some(28), Some(60))
            .unwrap()
            .unwrap();
        assert_eq!(found, FileMatch::untimed(format!("s3://nisar-ops-rs-fwd/{}", key)));
    }

    #[test]
    fn test_validate_rejects_bad_date_format() {
        let mut config = AuxSearchConfig::default();
        assert!(config.validate().is_ok());
        config.pointing.date_format = "%Y/%Q/".to_string();
        assert!(config.validate().is_err());
    }
}
