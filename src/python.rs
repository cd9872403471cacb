//! Python bindings, built with the `python` feature

use crate::config::{PipelineConfig, StoreConfig};
use crate::core::search::AuxSearchConfig;
use crate::types::{CoverageError, Segment};
use chrono::{DateTime, Utc};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

fn to_py_err(e: CoverageError) -> PyErr {
    match e {
        CoverageError::Config(_) | CoverageError::InvalidFormat(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn parse_time(value: &str) -> PyResult<DateTime<Utc>> {
    crate::io::cycle_schedule::parse_epoch(value).map_err(to_py_err)
}

/// Find orbit, pointing and RSLC files for one acquisition window.
///
/// Returns the search result as a JSON string; missing categories are null.
#[pyfunction]
#[pyo3(signature = (start, end, track=None, frame=None, local_root=None, config_json=None))]
fn find_aux_files(
    start: &str,
    end: &str,
    track: Option<u32>,
    frame: Option<u32>,
    local_root: Option<String>,
    config_json: Option<&str>,
) -> PyResult<String> {
    let search: AuxSearchConfig = match config_json {
        Some(json) => serde_json::from_str(json).map_err(|e| PyValueError::new_err(e.to_string()))?,
        None => AuxSearchConfig::default(),
    };
    search.validate().map_err(to_py_err)?;

    let store = match local_root {
        Some(root) => StoreConfig::Local { root: PathBuf::from(root) },
        None => PipelineConfig::default().store,
    }
    .connect()
    .map_err(to_py_err)?;

    let window = Segment::new(parse_time(start)?, parse_time(end)?);
    let result = crate::core::AuxFileSearch::new(store.as_ref(), &search)
        .find_aux_files(&window, track, frame)
        .map_err(to_py_err)?;

    serde_json::to_string(&result).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(find_aux_files, m)?)?;
    Ok(())
}
