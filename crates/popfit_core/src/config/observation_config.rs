use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::selection::Stage;

/// Column names of the observation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationColumns {
    pub lipids: String,
    pub fullness: String,
    pub species: String,
    pub month: String,
    /// Free-text annotation carrying species and stage
    pub category: String,
}

impl Default for ObservationColumns {
    fn default() -> Self {
        Self {
            lipids: "total_lipids_ugC".to_string(),
            fullness: "fullness_ratio_carbon_volume".to_string(),
            species: "spec".to_string(),
            month: "month".to_string(),
            category: "object_annotation_category".to_string(),
        }
    }
}

/// Category substring identifying observations of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCode {
    pub stage: Stage,
    pub code: String,
}

impl StageCode {
    pub fn new(stage: Stage, code: impl Into<String>) -> Self {
        Self {
            stage,
            code: code.into(),
        }
    }
}

fn default_stage_codes() -> Vec<StageCode> {
    vec![
        StageCode::new(Stage::C4, "civstage"),
        StageCode::new(Stage::C5, "cvstage"),
        StageCode::new(Stage::C6, "female"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    #[serde(default)]
    pub columns: ObservationColumns,

    /// Species kept for comparison; all rows when unset
    #[serde(default)]
    pub species: Option<String>,

    /// Stage → category code lookup for the staged pipelines
    #[serde(default = "default_stage_codes")]
    pub stage_codes: Vec<StageCode>,

    /// Category substrings whose rows are dropped on load
    #[serde(default)]
    pub exclude_categories: Vec<String>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            columns: ObservationColumns::default(),
            species: None,
            stage_codes: default_stage_codes(),
            exclude_categories: Vec::new(),
        }
    }
}

impl ObservationConfig {
    pub fn code_for(&self, stage: Stage) -> Option<&str> {
        self.stage_codes
            .iter()
            .find(|c| c.stage == stage)
            .map(|c| c.code.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        let cols = &self.columns;
        for (name, value) in [("lipids", &cols.lipids), ("fullness", &cols.fullness)] {
            if value.trim().is_empty() {
                return Err(CostError::InvalidConfig(format!("column name for {} is empty", name)));
            }
        }
        if let Some(code) = self.stage_codes.iter().find(|c| c.code.trim().is_empty()) {
            return Err(CostError::InvalidConfig(format!("stage {} has an empty code", code.stage)));
        }
        Ok(())
    }
}
