//! popfit command-line support
//!
//! File I/O around `popfit_core`: observation CSVs in, trajectories in,
//! evaluation records out, and many records merged into one table.

pub mod observations;
pub mod records;

pub use observations::{load_observations, read_observations, ParseStats};
pub use records::{
    load_record, load_trajectory, merge_records, record_files, record_row, write_record,
    MergedRecords,
};

use anyhow::{Context, Result};
use popfit_core::{CostConfig, EvaluationRecord, Evaluator, ParameterSet};
use std::path::Path;
use tracing::info;

/// Config from a file path, or a preset when the argument names one.
pub fn resolve_config(name_or_path: &str) -> Result<CostConfig> {
    if let Some(config) = CostConfig::preset(name_or_path) {
        return Ok(config);
    }
    CostConfig::load(name_or_path).with_context(|| format!("Failed to load config: {}", name_or_path))
}

/// Parse `NAME=VALUE` pairs.
pub fn parse_params(pairs: &[String]) -> Result<ParameterSet> {
    let mut params = ParameterSet::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("Parameter '{}' is not NAME=VALUE", pair))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Parameter '{}' has a non-numeric value", name))?;
        params.insert(name.trim().to_string(), value);
    }
    Ok(params)
}

/// Evaluate one trajectory file against one observation file.
pub fn evaluate_files(
    config: CostConfig,
    trajectory: &Path,
    observations: &Path,
    params: &ParameterSet,
) -> Result<EvaluationRecord> {
    let (table, stats) = load_observations(observations, &config.observations.columns)?;
    info!(
        "Loaded {} observations ({} rows failed)",
        stats.parsed, stats.failed
    );
    let evaluator = Evaluator::new(config, table)?;
    let trajectory = load_trajectory(trajectory)?;
    Ok(evaluator.evaluate(params, &trajectory))
}
