//! Reproductive Selector
//!
//! Annotates a trajectory with a selection mask. Every cell starts at
//! `NeverReproduced`; individuals with a reproduction-completion time move
//! to `Reproduced` at every step; cells that also pass the stage (and
//! optional calendar window) condition move to an elevated state.

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::stage::{Stage, StageTable};
use crate::error::CostError;
use crate::trajectory::{CalendarWindow, Trajectory};

/// Exclusive selection state of one (time, individual, strategy) cell.
///
/// Variants are ordered by refinement, so the maximum over time is the
/// individual's most refined state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MaskState {
    #[default]
    NeverReproduced,
    Reproduced,
    Selected,
    SelectedC4,
    SelectedC5,
    SelectedC6,
}

impl MaskState {
    pub const ELEVATED: [MaskState; 4] = [
        MaskState::Selected,
        MaskState::SelectedC4,
        MaskState::SelectedC5,
        MaskState::SelectedC6,
    ];

    /// Numeric code used in persisted records (0, 1, 2, 4, 5, 6).
    pub fn code(self) -> u8 {
        match self {
            MaskState::NeverReproduced => 0,
            MaskState::Reproduced => 1,
            MaskState::Selected => 2,
            MaskState::SelectedC4 => 4,
            MaskState::SelectedC5 => 5,
            MaskState::SelectedC6 => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MaskState::NeverReproduced),
            1 => Some(MaskState::Reproduced),
            2 => Some(MaskState::Selected),
            4 => Some(MaskState::SelectedC4),
            5 => Some(MaskState::SelectedC5),
            6 => Some(MaskState::SelectedC6),
            _ => None,
        }
    }

    /// Stage-specific state for C4/C5/C6.
    pub fn for_stage(stage: Stage) -> Option<Self> {
        match stage {
            Stage::C4 => Some(MaskState::SelectedC4),
            Stage::C5 => Some(MaskState::SelectedC5),
            Stage::C6 => Some(MaskState::SelectedC6),
            _ => None,
        }
    }

    pub fn is_elevated(self) -> bool {
        self >= MaskState::Selected
    }
}

impl TryFrom<u8> for MaskState {
    type Error = CostError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MaskState::from_code(value)
            .ok_or_else(|| CostError::InvalidConfig(format!("unknown mask code {}", value)))
    }
}

impl From<MaskState> for u8 {
    fn from(state: MaskState) -> Self {
        state.code()
    }
}

/// Which stages elevate a reproduced cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCriterion {
    /// Any present stage counts (window-only selection).
    Any,
    /// Stage at or above the bound, all marked `Selected`.
    AtLeast(Stage),
    /// Listed stages, each marked with its own state where one exists.
    Each(Vec<Stage>),
}

impl StageCriterion {
    /// C4 through adult, pooled.
    pub fn late_pooled() -> Self {
        StageCriterion::AtLeast(Stage::C4)
    }

    /// C4, C5 and C6 kept apart.
    pub fn late_per_stage() -> Self {
        StageCriterion::Each(Stage::LATE.to_vec())
    }

    /// State a reproduced cell at `stage` is elevated to, if any.
    pub fn elevate(&self, stage: Stage) -> Option<MaskState> {
        if stage == Stage::ABSENT {
            return None;
        }
        match self {
            StageCriterion::Any => Some(MaskState::Selected),
            StageCriterion::AtLeast(min) => (stage >= *min).then_some(MaskState::Selected),
            StageCriterion::Each(stages) => stages
                .contains(&stage)
                .then(|| MaskState::for_stage(stage).unwrap_or(MaskState::Selected)),
        }
    }
}

impl Default for StageCriterion {
    fn default() -> Self {
        Self::late_pooled()
    }
}

/// Stage labels and masks derived from one trajectory.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Stage of every (time, individual, strategy) cell
    pub stages: Array3<Stage>,
    /// Selection state of every cell
    pub mask: Array3<MaskState>,
    /// Most refined state per (individual, strategy) over time
    pub individual_mask: Array2<MaskState>,
}

impl Selection {
    /// Distinct per-individual states, ascending.
    pub fn states_present(&self) -> BTreeSet<MaskState> {
        self.individual_mask.iter().copied().collect()
    }

    /// Most refined state reached by any individual.
    pub fn best_state(&self) -> MaskState {
        self.individual_mask.iter().copied().max().unwrap_or_default()
    }

    pub fn has_elevated(&self) -> bool {
        self.best_state().is_elevated()
    }

    pub fn count_individuals(&self, state: MaskState) -> usize {
        self.individual_mask.iter().filter(|&&s| s == state).count()
    }
}

pub struct ReproductiveSelector {
    table: StageTable,
    criterion: StageCriterion,
    window: Option<CalendarWindow>,
}

impl ReproductiveSelector {
    pub fn new(table: StageTable, criterion: StageCriterion) -> Self {
        Self {
            table,
            criterion,
            window: None,
        }
    }

    pub fn with_window(mut self, window: Option<CalendarWindow>) -> Self {
        self.window = window;
        self
    }

    pub fn select(&self, trajectory: &Trajectory) -> Selection {
        let stages = self.table.classify_array(&trajectory.development);
        let mut mask = Array3::from_elem(stages.dim(), MaskState::NeverReproduced);

        for ((t, i, s), cell) in mask.indexed_iter_mut() {
            if !trajectory.has_reproduced(i, s) {
                continue;
            }
            *cell = MaskState::Reproduced;

            if let Some(window) = &self.window {
                if !window.contains(trajectory.day_of_year[[t, i, s]]) {
                    continue;
                }
            }
            if let Some(state) = self.criterion.elevate(stages[[t, i, s]]) {
                *cell = state;
            }
        }

        let individual_mask = mask.map_axis(Axis(0), |lane| {
            lane.iter().copied().max().unwrap_or_default()
        });

        Selection {
            stages,
            mask,
            individual_mask,
        }
    }
}
