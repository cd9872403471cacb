//! I/O modules for catalogs, cycle schedules, object stores, RSLC metadata and results

pub mod catalog;
pub mod cycle_schedule;
pub mod object_store;
pub mod product_reader;
pub mod results;
pub mod s3_store;

pub use catalog::{FrameCatalog, FrameSelection};
pub use cycle_schedule::CycleSchedule;
pub use object_store::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use product_reader::{GdalProductReader, ImageMetadataReader, ProductLayout};
pub use results::{write_coverage_json, write_unmatched_json};
pub use s3_store::S3ObjectStore;

use crate::types::CoverageResult;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

/// Read a text file, transparently decompressing `.gz` files
pub(crate) fn read_text<P: AsRef<Path>>(path: P) -> CoverageResult<String> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;

    let mut content = String::new();
    if path.extension().map_or(false, |ext| ext == "gz") {
        log::debug!("Decompressing gzipped input {}", path.display());
        GzDecoder::new(file).read_to_string(&mut content)?;
    } else {
        std::io::BufReader::new(file).read_to_string(&mut content)?;
    }
    Ok(content)
}
