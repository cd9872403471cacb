//! Run configuration, loaded from JSON with defaults for every field

use crate::core::processor::WorkerContext;
use crate::core::search::AuxSearchConfig;
use crate::io::{
    FrameSelection, GdalProductReader, LocalObjectStore, ObjectStore, ProductLayout, S3ObjectStore,
};
use crate::types::{CoverageError, CoverageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where auxiliary files are listed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Amazon S3, or an S3-compatible service when `endpoint_url` is set
    S3 {
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint_url: Option<String>,
        #[serde(default)]
        force_path_style: bool,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Local mirror laid out as `<root>/<bucket>/<key>`
    Local { root: PathBuf },
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::S3 {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn connect(&self) -> CoverageResult<Box<dyn ObjectStore>> {
        Ok(match self {
            StoreConfig::S3 {
                region,
                endpoint_url,
                force_path_style,
                timeout_secs,
            } => Box::new(S3ObjectStore::new(
                region,
                endpoint_url.as_deref(),
                *force_path_style,
                Duration::from_secs(*timeout_secs),
            )?),
            StoreConfig::Local { root } => Box::new(LocalObjectStore::new(root)?),
        })
    }
}

/// RSLC bounding-box enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    pub aws_region: Option<String>,
    pub layout: ProductLayout,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aws_region: Some("us-west-2".to_string()),
            layout: ProductLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub catalog: PathBuf,
    pub cycle_schedule: PathBuf,
    pub output: PathBuf,
    /// Diagnostics for frames without coverage; not written when unset
    pub unmatched_output: Option<PathBuf>,
    pub selection: FrameSelection,
    /// Worker threads; zero selects the available parallelism
    pub workers: usize,
    /// Reference time for "past" segments; the wall clock when unset
    pub now: Option<DateTime<Utc>>,
    pub store: StoreConfig,
    pub search: AuxSearchConfig,
    pub metadata: MetadataConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("nisar_track_frames.geojson"),
            cycle_schedule: PathBuf::from("nisar_cycle_times.json"),
            output: PathBuf::from("nisar_coverage_results.json"),
            unmatched_output: None,
            selection: FrameSelection::CalValOnly,
            workers: 0,
            now: None,
            store: StoreConfig::default(),
            search: AuxSearchConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> CoverageResult<Self> {
        log::info!("Loading configuration from {}", path.as_ref().display());
        let content = std::fs::read_to_string(&path)?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| CoverageError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoverageResult<()> {
        self.search.validate()?;
        if let StoreConfig::S3 {
            endpoint_url: Some(endpoint),
            ..
        } = &self.store
        {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(CoverageError::Config(format!("Store endpoint must be an HTTP URL: {}", endpoint)));
            }
        }
        Ok(())
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Build one worker's store client and metadata reader
    pub fn worker_context(&self) -> CoverageResult<WorkerContext> {
        let context = WorkerContext::new(self.store.connect()?);
        if !self.metadata.enabled {
            return Ok(context);
        }
        let reader = GdalProductReader::new(self.metadata.layout.clone(), self.metadata.aws_region.as_deref())?;
        Ok(context.with_metadata_reader(Box::new(reader)))
    }
}
