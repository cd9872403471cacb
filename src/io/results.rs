use crate::types::{CoverageResult, FrameRecord, UnmatchedFrame};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize `value` as 4-space indented JSON, replacing `path` atomically
fn write_json_atomic<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> CoverageResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = std::io::BufWriter::new(temp_file.as_file_mut());
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut serializer)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write matched frames for the downstream run-config generator
pub fn write_coverage_json<P: AsRef<Path>>(path: P, records: &[FrameRecord]) -> CoverageResult<()> {
    log::info!("Saving {} results to {}", records.len(), path.as_ref().display());
    write_json_atomic(path, records)
}

/// Write diagnostics for frames without coverage
pub fn write_unmatched_json<P: AsRef<Path>>(path: P, unmatched: &[UnmatchedFrame]) -> CoverageResult<()> {
    log::info!("Saving {} unmatched frames to {}", unmatched.len(), path.as_ref().display());
    write_json_atomic(path, unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frame, UnmatchedReason};
    use tempfile::TempDir;

    #[test]
    fn test_unmatched_report_round_trips_through_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("reports/unmatched.json");
        let frame = Frame::new(28, 60, 100.0, 160.0);
        let unmatched = vec![UnmatchedFrame::new(&frame, &[], UnmatchedReason::MissingCycleOffsets)];

        write_unmatched_json(&path, &unmatched).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    {"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["reason"]["kind"], "missing_cycle_offsets");
        assert_eq!(value[0]["track"], 28);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("out.json");
        std::fs::write(&path, "stale").unwrap();

        write_coverage_json(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
