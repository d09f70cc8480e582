//! Evaluation configuration.
//!
//! A `CostConfig` names the pipeline to run and groups its knobs:
//! - `histogram` - bin counts and cost scaling
//! - `selection` - stage table, criterion, window, months
//! - `mmd` - kernel settings of the joint cost
//! - `aggregation` - weighting of the median sub-costs
//! - `observations` - observation columns, species, stage codes
//!
//! Files may be JSON or YAML; every load is followed by `validate()`.

mod histogram_config;
mod observation_config;
mod selection_config;

pub use histogram_config::HistogramConfig;
pub use observation_config::{ObservationColumns, ObservationConfig, StageCode};
pub use selection_config::SelectionConfig;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{CostError, Result};
use crate::selection::StageCriterion;
use crate::trajectory::{CalendarWindow, Month};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    /// Pooled late stages, six histogram sub-costs and their total
    PooledHistogram,
    /// Weighted histogram costs per month and stage
    StagedHistogram,
    /// Joint weighted MMD per month and stage
    StagedMmd,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pipeline::PooledHistogram => "pooled_histogram",
            Pipeline::StagedHistogram => "staged_histogram",
            Pipeline::StagedMmd => "staged_mmd",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MmdConfig {
    /// Kernel coefficient; median heuristic when unset
    #[serde(default)]
    pub gamma: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Divisor applied to the median sub-costs in the total (default: 10)
    #[serde(default = "default_median_downweight")]
    pub median_downweight: f64,
}

fn default_median_downweight() -> f64 {
    10.0
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            median_downweight: default_median_downweight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub pipeline: Pipeline,
    #[serde(default)]
    pub histogram: HistogramConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub mmd: MmdConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub observations: ObservationConfig,
}

fn default_name() -> String {
    "default".to_string()
}

impl Default for CostConfig {
    fn default() -> Self {
        Self::pooled_august()
    }
}

impl CostConfig {
    /// C4 to adult, pooled, reproduced and inside the August survey window.
    pub fn pooled_august() -> Self {
        Self {
            name: "pooled_august".to_string(),
            pipeline: Pipeline::PooledHistogram,
            histogram: HistogramConfig::default(),
            selection: SelectionConfig {
                criterion: StageCriterion::late_pooled(),
                window: Some(CalendarWindow::august_survey()),
                months: vec![Month::AUGUST],
                ..SelectionConfig::default()
            },
            mmd: MmdConfig::default(),
            aggregation: AggregationConfig::default(),
            observations: ObservationConfig::default(),
        }
    }

    /// C4, C5 and C6 kept apart, weighted histogram costs for every month.
    pub fn staged_monthly() -> Self {
        Self {
            name: "staged_monthly".to_string(),
            pipeline: Pipeline::StagedHistogram,
            selection: SelectionConfig {
                criterion: StageCriterion::late_per_stage(),
                window: None,
                ..SelectionConfig::default()
            },
            ..Self::pooled_august()
        }
    }

    /// Like `staged_monthly`, scored with the joint MMD.
    pub fn staged_mmd() -> Self {
        Self {
            name: "staged_mmd".to_string(),
            pipeline: Pipeline::StagedMmd,
            ..Self::staged_monthly()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "pooled_august" => Some(Self::pooled_august()),
            "staged_monthly" => Some(Self::staged_monthly()),
            "staged_mmd" => Some(Self::staged_mmd()),
            _ => None,
        }
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: CostConfig =
            serde_json::from_str(json).map_err(|e| CostError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: CostConfig =
            serde_yaml::from_str(yaml).map_err(|e| CostError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CostError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.histogram.validate()?;
        self.selection.validate()?;
        self.observations.validate()?;

        if let Some(gamma) = self.mmd.gamma {
            if !(gamma > 0.0) || !gamma.is_finite() {
                return Err(CostError::InvalidConfig(format!(
                    "mmd.gamma must be positive, got {}",
                    gamma
                )));
            }
        }
        if !(self.aggregation.median_downweight > 0.0) {
            return Err(CostError::InvalidConfig(format!(
                "aggregation.median_downweight must be positive, got {}",
                self.aggregation.median_downweight
            )));
        }
        match self.pipeline {
            Pipeline::PooledHistogram => {}
            Pipeline::StagedHistogram | Pipeline::StagedMmd => {
                if self.selection.months.is_empty() {
                    return Err(CostError::InvalidConfig(format!(
                        "{} needs at least one month",
                        self.pipeline
                    )));
                }
                if !matches!(self.selection.criterion, StageCriterion::Each(_)) {
                    return Err(CostError::InvalidConfig(format!(
                        "{} needs a per-stage criterion",
                        self.pipeline
                    )));
                }
            }
        }
        Ok(())
    }
}
