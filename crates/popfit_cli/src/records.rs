//! Trajectory input, record output and record merging.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use popfit_core::record::TraitDiagnostics;
use popfit_core::{CostReport, EvaluationRecord, Trajectory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const RECORD_PREFIX: &str = "popfit_";

/// Load a simulated trajectory from JSON.
pub fn load_trajectory(path: &Path) -> Result<Trajectory> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trajectory: {}", path.display()))?;
    let trajectory: Trajectory = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse trajectory: {}", path.display()))?;
    let (steps, individuals, strategies) = trajectory.shape();
    debug!(
        "Trajectory {}: {} steps, {} individuals, {} strategies",
        path.display(),
        steps,
        individuals,
        strategies
    );
    Ok(trajectory)
}

/// `popfit_<YYYYmmdd_HHMMSS_micros>_<uuid8>.json`; unique across
/// concurrent workers writing into the same directory.
pub fn record_file_name(at: DateTime<Utc>, id: Uuid) -> String {
    let short = id.simple().to_string();
    format!(
        "{}{}_{}.json",
        RECORD_PREFIX,
        at.format("%Y%m%d_%H%M%S_%6f"),
        &short[..8]
    )
}

/// Write a record into `dir`, creating it if needed.
pub fn write_record(dir: &Path, record: &EvaluationRecord) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = dir.join(record_file_name(Utc::now(), Uuid::new_v4()));
    let json = serde_json::to_string_pretty(record).context("Failed to serialize record")?;
    fs::write(&path, json).with_context(|| format!("Failed to write record: {}", path.display()))?;
    Ok(path)
}

pub fn load_record(path: &Path) -> Result<EvaluationRecord> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse record: {}", path.display()))
}

/// Record files in `dir`, in name (and therefore time) order.
pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let is_record = path.extension().is_some_and(|ext| ext == "json")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(RECORD_PREFIX));
        if is_record {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn numbers(values: &[f64]) -> Value {
    Value::Array(values.iter().copied().map(number).collect())
}

fn diagnostic_columns(row: &mut Map<String, Value>, d: &TraitDiagnostics) {
    let mut prefix = String::new();
    if let Some(month) = d.month {
        prefix.push_str(&format!("{}_", month));
    }
    if let Some(stage) = d.stage {
        prefix.push_str(&format!("{}_", stage));
    }
    prefix.push_str(d.trait_kind.name());
    if d.weighted {
        prefix.push_str("_weighted");
    }

    row.insert(format!("{}_bin_edges", prefix), numbers(&d.bin_edges));
    row.insert(format!("{}_observed_density", prefix), numbers(&d.observed_density));
    row.insert(format!("{}_simulated_density", prefix), numbers(&d.simulated_density));
    row.insert(format!("{}_observed_median", prefix), number(d.observed_median));
    row.insert(format!("{}_simulated_median", prefix), number(d.simulated_median));
}

/// Flatten a record into named columns: parameters under their own names,
/// run metadata, one column per cost, and list columns for the curves.
pub fn record_row(record: &EvaluationRecord) -> Result<Map<String, Value>> {
    let mut row = Map::new();
    for (name, value) in &record.params {
        row.insert(name.clone(), number(*value));
    }
    row.insert("species".to_string(), serde_json::to_value(&record.species)?);
    row.insert("pipeline".to_string(), serde_json::to_value(&record.pipeline)?);
    row.insert("status".to_string(), serde_json::to_value(&record.status)?);
    row.insert("mask".to_string(), serde_json::to_value(record.mask)?);
    row.insert("error".to_string(), serde_json::to_value(&record.error)?);
    row.insert("running_time".to_string(), number(record.running_time));
    row.insert("evaluated_at".to_string(), Value::String(record.evaluated_at.to_rfc3339()));

    match &record.costs {
        Some(CostReport::Pooled(report)) => {
            if let Value::Object(costs) = serde_json::to_value(&report.costs)? {
                row.extend(costs);
            }
            row.insert("individuals".to_string(), Value::from(report.individuals));
            for d in &report.diagnostics {
                diagnostic_columns(&mut row, d);
            }
        }
        Some(CostReport::Staged(report)) => {
            for (key, cost) in report.costs.iter() {
                row.insert(key.to_string(), number(*cost));
            }
            for d in &report.histograms {
                diagnostic_columns(&mut row, d);
            }
            for joint in &report.joint {
                row.insert(format!("{}_{}_gamma", joint.month, joint.stage), number(joint.gamma));
            }
        }
        None => {}
    }
    Ok(row)
}

/// Column-oriented table of many records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedRecords {
    pub rows: usize,
    pub columns: BTreeMap<String, Vec<Value>>,
    /// Source file of every row
    pub sources: Vec<String>,
}

impl MergedRecords {
    /// Append a row. Columns first seen here are back-filled with nulls,
    /// columns this row lacks get a null.
    pub fn push(&mut self, row: Map<String, Value>, source: impl Into<String>) {
        let rows = self.rows;
        for (name, value) in row {
            let column = self
                .columns
                .entry(name)
                .or_insert_with(|| vec![Value::Null; rows]);
            column.push(value);
        }
        self.rows += 1;
        for column in self.columns.values_mut() {
            column.resize(self.rows, Value::Null);
        }
        self.sources.push(source.into());
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Write as CSV; list cells are written as JSON text.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let names: Vec<&String> = self.columns.keys().collect();
        let mut header = vec!["source"];
        header.extend(names.iter().map(|n| n.as_str()));
        writer.write_record(&header)?;

        for row in 0..self.rows {
            let mut cells = vec![self.sources[row].clone()];
            for name in &names {
                let cell = match &self.columns[*name][row] {
                    Value::Null => String::new(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                cells.push(cell);
            }
            writer.write_record(&cells)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Merge record files into one table. Unreadable files are skipped with a
/// warning; the count is returned alongside.
pub fn merge_records(paths: &[PathBuf]) -> Result<(MergedRecords, usize)> {
    let mut merged = MergedRecords::default();
    let mut skipped = 0;

    for path in paths {
        let record = match load_record(path) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                skipped += 1;
                continue;
            }
        };
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        merged.push(record_row(&record)?, source);
    }

    info!("Merged {} records ({} skipped)", merged.rows, skipped);
    Ok((merged, skipped))
}
