//! sarcover CLI
//!
//! Resolves auxiliary file coverage for the selected catalog frames and
//! writes the run-config JSON consumed downstream.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use sarcover::core::FrameProcessor;
use sarcover::io::{write_coverage_json, write_unmatched_json, CycleSchedule, FrameCatalog, FrameSelection};
use sarcover::{PipelineConfig, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "sarcover", version, about = "Find orbit, pointing and RSLC coverage for track/frame catalogs")]
struct Cli {
    /// JSON configuration file; command-line options override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Track/frame catalog (JSON or GeoJSON, optionally gzipped)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Cycle start epochs (JSON array or one timestamp per line)
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Output JSON path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write diagnostics for frames without coverage
    #[arg(long)]
    unmatched_output: Option<PathBuf>,

    /// Frames to process: "calval" or "all"
    #[arg(long)]
    selection: Option<FrameSelection>,

    /// Worker threads (0 = available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Days of partitions searched before each window start
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Reference time (RFC 3339); segments starting later are ignored
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Search a local mirror laid out as <root>/<bucket>/<key>
    #[arg(long, conflicts_with_all = ["region", "endpoint_url"])]
    local_root: Option<PathBuf>,

    /// AWS region of the S3 buckets
    #[arg(long)]
    region: Option<String>,

    /// S3-compatible endpoint URL (path-style addressing)
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Skip reading RSLC bounding boxes
    #[arg(long)]
    no_bounding_box: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(catalog) = self.catalog {
            config.catalog = catalog;
        }
        if let Some(schedule) = self.schedule {
            config.cycle_schedule = schedule;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if self.unmatched_output.is_some() {
            config.unmatched_output = self.unmatched_output;
        }
        if let Some(selection) = self.selection {
            config.selection = selection;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(days) = self.lookback_days {
            config.search.lookback_days = days;
        }
        if self.now.is_some() {
            config.now = self.now;
        }
        if let Some(root) = self.local_root {
            config.store = StoreConfig::Local { root };
        } else if self.region.is_some() || self.endpoint_url.is_some() {
            if let StoreConfig::Local { .. } = config.store {
                config.store = StoreConfig::default();
            }
            if let StoreConfig::S3 {
                region,
                endpoint_url,
                force_path_style,
                ..
            } = &mut config.store
            {
                if let Some(r) = self.region {
                    *region = r;
                }
                if self.endpoint_url.is_some() {
                    *endpoint_url = self.endpoint_url;
                    *force_path_style = true;
                }
            }
        }
        if self.no_bounding_box {
            config.metadata.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(format!("sarcover={}", level)))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = cli.into_config()?;
    let now = config.reference_time();

    let catalog = FrameCatalog::load(&config.catalog)
        .with_context(|| format!("Failed to load frame catalog {}", config.catalog.display()))?;
    let frames = catalog.select(config.selection);
    log::info!("Selected {} of {} frames ({:?})", frames.len(), catalog.len(), config.selection);

    let schedule = CycleSchedule::load(&config.cycle_schedule)
        .with_context(|| format!("Failed to load cycle schedule {}", config.cycle_schedule.display()))?;

    let factory_config = Arc::new(config.clone());
    let processor = FrameProcessor::new(config.search.clone(), move || factory_config.worker_context())
        .with_workers(config.workers);

    let report = processor
        .run(frames, &schedule, now)
        .context("Coverage search could not start")?;

    write_coverage_json(&config.output, &report.matched)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    if let Some(path) = &config.unmatched_output {
        write_unmatched_json(path, &report.unmatched)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!("{}", report.summary());
    Ok(())
}
