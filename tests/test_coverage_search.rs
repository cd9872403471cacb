use chrono::{DateTime, TimeZone, Utc};
use sarcover::core::{AuxFileSearch, AuxSearchConfig, CoverageMatcher};
use sarcover::io::{CycleSchedule, MemoryObjectStore};
use sarcover::{CoverageOutcome, Frame, PassDirection, Segment};

const AUX: &str = "nisar-ops-lts-fwd";
const RS: &str = "nisar-ops-rs-fwd";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn february_window() -> Segment {
    Segment::new(utc(2024, 2, 1, 0, 1, 40), utc(2024, 2, 1, 0, 2, 40))
}

fn poe(day: &str, start: &str, end: &str) -> String {
    format!("products/POE/{}/NISAR_ANC_L_PR_POE_20240203T120000_{}_{}.xml", day, start, end)
}

fn nrp(day: &str, start: &str, end: &str) -> String {
    format!("products/NRP/{}/NISAR_ANC_L_PR_NRP_20240203T120000_{}_{}.xml", day, start, end)
}

fn rslc(day: &str, cycle: &str, track: &str, frame: &str, start: &str, end: &str) -> String {
    format!(
        "products/L1_L_RSLC/{}/NISAR_L1_PR_RSLC_{}_{}_A_{}_2000_SHNA_A_{}_{}_D00402_N_F_J_001.h5",
        day, cycle, track, frame, start, end
    )
}

#[test]
fn test_first_acceptable_candidate_wins() {
    init_logging();
    // Both cover the window; the listing-order first one is returned
    let wide = poe("2024/02/01", "20240131T000000", "20240202T000000");
    let tight = poe("2024/02/01", "20240201T000000", "20240201T010000");
    let store = MemoryObjectStore::new().with_object(AUX, &tight).with_object(AUX, &wide);

    let config = AuxSearchConfig::default();
    let search = AuxFileSearch::new(&store, &config);
    let found = search.find_time_range(&config.orbit, &february_window()).unwrap().unwrap();

    assert_eq!(found.path, format!("s3://{}/{}", AUX, wide));
    assert_eq!(found.start_margin, Some(86_500));
    assert_eq!(found.end_margin, Some(86_240));
}

#[test]
fn test_tolerance_accepts_near_miss() {
    init_logging();
    let inset = nrp("2024/02/01", "20240201T000143", "20240201T000237");
    let store = MemoryObjectStore::new().with_object(AUX, &inset);

    let mut config = AuxSearchConfig::default();
    assert!(AuxFileSearch::new(&store, &config)
        .find_time_range(&config.pointing, &february_window())
        .unwrap()
        .is_none());

    config.pointing.tolerance_seconds = Some(5);
    let found = AuxFileSearch::new(&store, &config)
        .find_time_range(&config.pointing, &february_window())
        .unwrap()
        .expect("within 5 s tolerance");
    assert_eq!(found.start_margin, Some(-3));
    assert_eq!(found.end_margin, Some(-3));

    config.pointing.tolerance_seconds = Some(1);
    assert!(AuxFileSearch::new(&store, &config)
        .find_time_range(&config.pointing, &february_window())
        .unwrap()
        .is_none());
}

#[test]
fn test_identity_requires_exact_track_and_frame() {
    init_logging();
    let swapped = rslc("2024/02/01", "005", "060", "028", "20240201T000130", "20240201T000250");
    let store = MemoryObjectStore::new().with_object(RS, &swapped);
    let config = AuxSearchConfig::default();
    let search = AuxFileSearch::new(&store, &config);

    let found = search
        .find_by_identity(&config.rslc, &february_window(), Some(28), Some(60))
        .unwrap();
    assert!(found.is_none());

    let store = store.with_object(RS, &rslc("2024/02/01", "005", "028", "060", "20240201T000130", "20240201T000250"));
    let search = AuxFileSearch::new(&store, &config);
    let found = search
        .find_by_identity(&config.rslc, &february_window(), Some(28), Some(60))
        .unwrap()
        .expect("exact identity");
    assert!(found.path.contains("_028_A_060_"));
    assert_eq!(found.cycle, Some(5));
    assert_eq!(found.pass_direction, Some(PassDirection::Ascending));
    assert_eq!(found.start_margin, Some(10));
    assert_eq!(found.end_margin, Some(10));
}

#[test]
fn test_identity_tolerates_delimiter_noise() {
    init_logging();
    let noisy = "products/L1_L_RSLC/2024/02/01/NISAR_L1_PR_RSLC_012_028_D_060__x__20240201T000130_20240201T000250.h5";
    let store = MemoryObjectStore::new().with_object(RS, noisy);
    let config = AuxSearchConfig::default();
    let search = AuxFileSearch::new(&store, &config);

    let found = search
        .find_by_identity(&config.rslc, &february_window(), Some(28), Some(60))
        .unwrap()
        .expect("noise after the identity tokens is ignored");
    assert_eq!(found.path, format!("s3://{}/{}", RS, noisy));
    assert_eq!(found.start_margin, Some(10));
    assert_eq!(found.cycle, Some(12));
    assert_eq!(found.pass_direction, Some(PassDirection::Descending));
}

#[test]
fn test_identity_without_track_never_lists() {
    let store = MemoryObjectStore::new();
    let config = AuxSearchConfig::default();
    let search = AuxFileSearch::new(&store, &config);

    assert!(search
        .find_by_identity(&config.rslc, &february_window(), None, Some(60))
        .unwrap()
        .is_none());
    assert_eq!(store.list_calls(), 0);
}

#[test]
fn test_lookback_boundary() {
    init_logging();
    let config = AuxSearchConfig::default();

    let three_days_back = poe("2024/01/29", "20240128T000000", "20240203T000000");
    let store = MemoryObjectStore::new().with_object(AUX, &three_days_back);
    let search = AuxFileSearch::new(&store, &config);
    assert!(search.find_time_range(&config.orbit, &february_window()).unwrap().is_some());

    let four_days_back = poe("2024/01/28", "20240127T000000", "20240203T000000");
    let store = MemoryObjectStore::new().with_object(AUX, &four_days_back);
    let search = AuxFileSearch::new(&store, &config);
    assert!(search.find_time_range(&config.orbit, &february_window()).unwrap().is_none());
    assert_eq!(store.list_calls(), 4);
}

#[test]
fn test_search_is_idempotent() {
    let store = MemoryObjectStore::new()
        .with_object(AUX, &poe("2024/02/01", "20240131T000000", "20240202T000000"))
        .with_object(AUX, &nrp("2024/01/31", "20240131T000000", "20240202T000000"))
        .with_object(RS, &rslc("2024/02/01", "005", "028", "060", "20240201T000130", "20240201T000250"));
    let config = AuxSearchConfig::default();
    let search = AuxFileSearch::new(&store, &config);

    let first = search.find_aux_files(&february_window(), Some(28), Some(60)).unwrap();
    let second = search.find_aux_files(&february_window(), Some(28), Some(60)).unwrap();
    assert_eq!(first, second);
    assert!(first.missing().is_empty());
}

#[test]
fn test_frame_binds_to_older_complete_segment() {
    init_logging();
    // February has no RSLC for 28/60, January has all three
    let store = MemoryObjectStore::new()
        .with_object(AUX, &poe("2024/02/01", "20240131T000000", "20240202T000000"))
        .with_object(AUX, &nrp("2024/02/01", "20240131T000000", "20240202T000000"))
        .with_object(RS, &rslc("2024/02/01", "005", "028", "061", "20240201T000130", "20240201T000250"))
        .with_object(AUX, &poe("2024/01/01", "20231231T000000", "20240102T000000"))
        .with_object(AUX, &nrp("2023/12/31", "20231231T000000", "20240102T000000"))
        .with_object(RS, &rslc("2024/01/01", "004", "028", "060", "20240101T000130", "20240101T000250"));

    let schedule = CycleSchedule::new(vec![utc(2024, 1, 1, 0, 0, 0), utc(2024, 2, 1, 0, 0, 0), utc(2024, 3, 1, 0, 0, 0)]);
    let now = utc(2024, 2, 15, 0, 0, 0);
    let config = AuxSearchConfig::default();
    let matcher = CoverageMatcher::new(&store, &config);

    let outcome = matcher.resolve(&Frame::new(28, 60, 100.0, 160.0), &schedule, now).unwrap();
    let matched = match outcome {
        CoverageOutcome::Matched(m) => m,
        other => panic!("expected a match, got {:?}", other),
    };
    assert_eq!(matched.segment, Segment::new(utc(2024, 1, 1, 0, 1, 40), utc(2024, 1, 1, 0, 2, 40)));
    assert!(matched.files.pointing.path.contains("/2023/12/31/"));
    assert!(matched.files.rslc.path.contains("_004_028_A_060_"));
}
