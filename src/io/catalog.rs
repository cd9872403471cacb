use crate::types::{Attributes, CoverageError, CoverageResult, Frame};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Which catalog frames go through the coverage search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSelection {
    /// Only frames flagged `isCalVal`
    #[default]
    CalValOnly,
    All,
}

impl FrameSelection {
    pub fn accepts(&self, frame: &Frame) -> bool {
        match self {
            FrameSelection::CalValOnly => frame.is_cal_val,
            FrameSelection::All => true,
        }
    }
}

impl std::str::FromStr for FrameSelection {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calval" | "cal_val" | "cal_val_only" => Ok(FrameSelection::CalValOnly),
            "all" => Ok(FrameSelection::All),
            _ => Err(CoverageError::Config(format!("Invalid frame selection: {}", s))),
        }
    }
}

/// Track/frame grid records loaded from a JSON or GeoJSON export
#[derive(Debug, Clone, Default)]
pub struct FrameCatalog {
    frames: Vec<Frame>,
}

impl FrameCatalog {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CoverageResult<Self> {
        log::info!("Loading frame catalog from {}", path.as_ref().display());
        let content = super::read_text(&path)?;
        let catalog = Self::parse(&content)?;
        log::info!("Loaded {} frames", catalog.len());
        Ok(catalog)
    }

    /// Parse either a JSON array of records or a GeoJSON FeatureCollection
    pub fn parse(content: &str) -> CoverageResult<Self> {
        let root: Value = serde_json::from_str(content)?;
        let records = match root {
            Value::Array(records) => records,
            Value::Object(mut obj) if obj.get("type").and_then(Value::as_str) == Some("FeatureCollection") => {
                match obj.remove("features") {
                    Some(Value::Array(features)) => features
                        .into_iter()
                        .map(feature_to_record)
                        .collect::<CoverageResult<Vec<_>>>()?,
                    _ => {
                        return Err(CoverageError::InvalidFormat(
                            "FeatureCollection without a features array".to_string(),
                        ))
                    }
                }
            }
            _ => {
                return Err(CoverageError::InvalidFormat(
                    "Catalog must be a JSON array or a GeoJSON FeatureCollection".to_string(),
                ))
            }
        };

        let frames = records
            .into_iter()
            .map(normalize_record)
            .collect::<CoverageResult<Vec<_>>>()?;
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Frames accepted by `selection`, in catalog order
    pub fn select(&self, selection: FrameSelection) -> Vec<Frame> {
        self.frames
            .iter()
            .filter(|f| selection.accepts(f))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Flatten a GeoJSON feature into `properties + geometry`
fn feature_to_record(feature: Value) -> CoverageResult<Value> {
    let Value::Object(mut feature) = feature else {
        return Err(CoverageError::InvalidFormat("Feature is not an object".to_string()));
    };
    let mut record = match feature.remove("properties") {
        Some(Value::Object(props)) => props,
        Some(Value::Null) | None => Attributes::new(),
        Some(other) => {
            return Err(CoverageError::InvalidFormat(format!("Invalid feature properties: {}", other)))
        }
    };
    if let Some(geometry) = feature.remove("geometry") {
        record.insert("geometry".to_string(), geometry);
    }
    Ok(Value::Object(record))
}

/// Normalize one record into a `Frame`, keeping every attribute
pub fn normalize_record(record: Value) -> CoverageResult<Frame> {
    let attributes = match record {
        Value::Object(attributes) => attributes,
        other => {
            return Err(CoverageError::InvalidFormat(format!("Catalog record is not an object: {}", other)))
        }
    };

    let frame = Frame {
        track: attributes.get("track").and_then(as_grid_number),
        frame: attributes.get("frame").and_then(as_grid_number),
        start_cy: attributes.get("startCY").and_then(as_seconds),
        end_cy: attributes.get("endCY").and_then(as_seconds),
        is_cal_val: attributes.get("isCalVal").map_or(false, as_flag),
        attributes,
    };

    if frame.cycle_offsets().is_none() {
        log::debug!("{} has no cycle offsets", frame.label());
    }
    Ok(frame)
}

/// Track and frame numbers; exports often write integers as floats
fn as_grid_number(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    number.and_then(|v| u32::try_from(v).ok())
}

fn as_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}
