use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::selection::{ReproductiveSelector, StageCriterion, StageTable};
use crate::trajectory::{CalendarWindow, Month};

/// Which cells are selected and over which months costs are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Development → stage thresholds (default: Coltrane scale)
    #[serde(default)]
    pub stage_table: StageTable,

    #[serde(default)]
    pub criterion: StageCriterion,

    /// Day-of-year window for elevation; none means every day
    #[serde(default)]
    pub window: Option<CalendarWindow>,

    /// Months evaluated by the staged pipelines, in order
    #[serde(default = "all_months")]
    pub months: Vec<Month>,
}

fn all_months() -> Vec<Month> {
    Month::all().collect()
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            stage_table: StageTable::default(),
            criterion: StageCriterion::default(),
            window: None,
            months: all_months(),
        }
    }
}

impl SelectionConfig {
    pub fn selector(&self) -> ReproductiveSelector {
        ReproductiveSelector::new(self.stage_table.clone(), self.criterion.clone()).with_window(self.window)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(window) = &self.window {
            if !window.is_valid() {
                return Err(CostError::InvalidConfig(format!(
                    "window must be ordered days within 0..365, got {}..{}",
                    window.first_day, window.last_day
                )));
            }
        }
        if let StageCriterion::Each(stages) = &self.criterion {
            if stages.is_empty() {
                return Err(CostError::InvalidConfig("criterion lists no stages".to_string()));
            }
            if let Some(stage) = stages.iter().find(|s| **s > self.stage_table.max_stage()) {
                return Err(CostError::InvalidConfig(format!(
                    "stage {} is beyond the stage table (max {})",
                    stage,
                    self.stage_table.max_stage()
                )));
            }
        }
        Ok(())
    }
}
