//! Read/write depth-map JSON files.
//!
//! The results file is the portable record of a mapping run:
//! - tool name and generation time
//! - source grid, window size and spectrum options
//! - every window estimate, including failures
//!
//! The schema is defined by `domain::ResultsFile`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::Utc;

use crate::domain::{DepthEstimate, ResultsFile, SpectrumOptions};
use crate::error::AppError;

pub const TOOL_NAME: &str = "curie";

/// Assemble a results record stamped with the current time.
pub fn build_results(
    source: &Path,
    window: f64,
    spectrum: SpectrumOptions,
    estimates: Vec<DepthEstimate>,
) -> ResultsFile {
    ResultsFile {
        tool: TOOL_NAME.to_string(),
        generated_at: Utc::now(),
        source: source.display().to_string(),
        window,
        spectrum,
        estimates,
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create results JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), results)
        .map_err(|e| AppError::input(format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Read a results JSON file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::input(format!("Invalid results JSON: {e}")))?;
    Ok(results)
}

/// `(xc, yc, curie_depth)` for every window; failed windows carry `NaN`.
pub fn depth_points(results: &ResultsFile) -> Vec<(f64, f64, f64)> {
    results
        .estimates
        .iter()
        .map(|e| (e.xc, e.yc, e.curie_depth().unwrap_or(f64::NAN)))
        .collect()
}
