use crate::types::{CoverageError, CoverageResult, ImageBoundingBox};
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reads the small metadata region of a matched image product
pub trait ImageMetadataReader: Send + Sync {
    fn read_bounding_box(&self, uri: &str) -> CoverageResult<ImageBoundingBox>;
}

/// HDF5 locations of the fields making up the bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductLayout {
    pub slant_range_path: String,
    pub start_time_path: String,
    pub end_time_path: String,
}

impl Default for ProductLayout {
    fn default() -> Self {
        Self {
            slant_range_path: "/science/LSAR/RSLC/swaths/frequencyA/slantRange".to_string(),
            start_time_path: "/science/LSAR/identification/zeroDopplerStartTime".to_string(),
            end_time_path: "/science/LSAR/identification/zeroDopplerEndTime".to_string(),
        }
    }
}

/// Map `s3://bucket/key` onto GDAL's `/vsis3/` virtual file system
pub fn gdal_path(uri: &str) -> String {
    match uri.strip_prefix("s3://") {
        Some(rest) => format!("/vsis3/{}", rest),
        None => uri.to_string(),
    }
}

/// GDAL name of an HDF5 dataset inside `path`
fn hdf5_subdataset(path: &str, dataset: &str) -> String {
    format!("HDF5:\"{}\":/{}", path, dataset)
}

/// GDAL's HDF5 driver flattens dataset paths into `_`-joined metadata keys
fn hdf5_metadata_key(dataset: &str) -> String {
    dataset.trim_start_matches('/').replace('/', "_")
}

/// RSLC metadata reader built on GDAL's HDF5 driver
pub struct GdalProductReader {
    layout: ProductLayout,
}

impl GdalProductReader {
    /// `aws_region` is handed to GDAL for `/vsis3/` access; credentials come
    /// from GDAL's usual environment lookup
    pub fn new(layout: ProductLayout, aws_region: Option<&str>) -> CoverageResult<Self> {
        if let Some(region) = aws_region {
            gdal::config::set_config_option("AWS_REGION", region)?;
        }
        Ok(Self { layout })
    }

    fn read_slant_range(&self, path: &str) -> CoverageResult<(f64, f64)> {
        let name = hdf5_subdataset(path, &self.layout.slant_range_path);
        log::debug!("Reading slant range from {}", name);

        let dataset = Dataset::open(Path::new(&name))?;
        let band = dataset.rasterband(1)?;
        let (width, height) = band.size();
        let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;

        let slant = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| CoverageError::Processing(format!("Failed to reshape slant range: {}", e)))?;

        match (slant.iter().next(), slant.iter().last()) {
            (Some(first), Some(last)) => Ok((*first, *last)),
            _ => Err(CoverageError::InvalidFormat(format!("Empty slant range in {}", path))),
        }
    }

    fn read_time(&self, dataset: &Dataset, item: &str, path: &str) -> CoverageResult<String> {
        let key = hdf5_metadata_key(item);
        dataset
            .metadata_item(&key, "")
            .map(|value| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CoverageError::InvalidFormat(format!("{} missing from {}", key, path)))
    }
}

impl ImageMetadataReader for GdalProductReader {
    fn read_bounding_box(&self, uri: &str) -> CoverageResult<ImageBoundingBox> {
        let path = gdal_path(uri);
        let (start_range, end_range) = self.read_slant_range(&path)?;

        let root = Dataset::open(Path::new(&path))?;
        let start_time = self.read_time(&root, &self.layout.start_time_path, &path)?;
        let end_time = self.read_time(&root, &self.layout.end_time_path, &path)?;

        Ok(ImageBoundingBox {
            start_range,
            end_range,
            start_time,
            end_time,
        })
    }
}
