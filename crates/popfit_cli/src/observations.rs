//! Observation CSV loader
//!
//! One row per measured animal. Column names come from `ObservationColumns`;
//! the two trait columns are required, species, month and category are
//! optional and simply left unset when the file lacks them.

use anyhow::{Context, Result};
use popfit_core::config::ObservationColumns;
use popfit_core::{Month, ObservationRow, ObservationTable};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// CSV parsing statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseStats {
    pub total_rows: u32,
    pub parsed: u32,
    pub failed: u32,
    /// Optional columns not present in the header
    pub missing_columns: Vec<String>,
}

/// Resolved column positions
struct ColumnIndex {
    lipids: usize,
    fullness: usize,
    species: Option<usize>,
    month: Option<usize>,
    category: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &ObservationColumns, stats: &mut ParseStats) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
        };
        let required = |name: &str| {
            find(name).with_context(|| format!("Missing required column '{}'", name))
        };
        let mut optional = |name: &str| {
            let idx = find(name);
            if idx.is_none() {
                stats.missing_columns.push(name.to_string());
            }
            idx
        };

        Ok(Self {
            lipids: required(&columns.lipids)?,
            fullness: required(&columns.fullness)?,
            species: optional(&columns.species),
            month: optional(&columns.month),
            category: optional(&columns.category),
        })
    }
}

/// Numeric cell; empty and NA-like cells are missing values.
fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "" | "nan" | "na" | "n/a" | "null" | "none" => Some(f64::NAN),
        _ => raw.parse::<f64>().ok(),
    }
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Month cell, either a number (`8`, `8.0`) or an English name (`Aug`, `August`).
pub fn parse_month(raw: &str) -> Option<Month> {
    let raw = raw.trim();
    if let Ok(number) = raw.parse::<f64>() {
        if number.fract() != 0.0 || !(1.0..=12.0).contains(&number) {
            return None;
        }
        return Month::new(number as u8);
    }
    let lower = raw.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|name| lower.starts_with(name))
        .and_then(|idx| Month::new(idx as u8 + 1))
}

fn text_cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    let value = record.get(idx?)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse observations from any CSV source.
///
/// Rows with unparseable trait values are counted as failed and skipped;
/// an unparseable month leaves the row without a month.
pub fn read_observations<R: Read>(source: R, columns: &ObservationColumns) -> Result<(ObservationTable, ParseStats)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let mut stats = ParseStats::default();
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let index = ColumnIndex::resolve(&headers, columns, &mut stats)?;
    if !stats.missing_columns.is_empty() {
        debug!("Optional columns absent: {}", stats.missing_columns.join(", "));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        stats.total_rows += 1;
        let line = stats.total_rows + 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                stats.failed += 1;
                warn!("Line {} - unreadable record: {}", line, e);
                continue;
            }
        };

        let lipids = record.get(index.lipids).and_then(parse_number);
        let fullness = record.get(index.fullness).and_then(parse_number);
        let (Some(lipids), Some(fullness)) = (lipids, fullness) else {
            stats.failed += 1;
            warn!(
                "Line {} - invalid trait values: '{}', '{}'",
                line,
                record.get(index.lipids).unwrap_or(""),
                record.get(index.fullness).unwrap_or("")
            );
            continue;
        };

        let month = text_cell(&record, index.month).and_then(|raw| {
            let month = parse_month(&raw);
            if month.is_none() {
                warn!("Line {} - invalid month '{}'", line, raw);
            }
            month
        });

        rows.push(ObservationRow {
            lipids,
            fullness,
            species: text_cell(&record, index.species),
            month,
            category: text_cell(&record, index.category),
        });
        stats.parsed += 1;
    }

    Ok((ObservationTable::new(rows), stats))
}

/// Load an observation CSV file.
pub fn load_observations(path: &Path, columns: &ObservationColumns) -> Result<(ObservationTable, ParseStats)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    read_observations(file, columns).with_context(|| format!("Failed to parse {}", path.display()))
}
