//! Temporal Aggregator
//!
//! Collapses per-step series into one value per individual: the mean over
//! the steps whose mask state matches the target, optionally restricted to
//! one calendar month. Individuals without a qualifying step are left out.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::selection::{MaskState, Selection};
use crate::stats::nan_mean;
use crate::trajectory::{Month, Trajectory};

/// Mask states that count as "qualifying".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskTarget {
    Exactly(MaskState),
    AnyOf(Vec<MaskState>),
}

impl MaskTarget {
    /// Every elevated state (2, 4, 5, 6).
    pub fn elevated() -> Self {
        MaskTarget::AnyOf(MaskState::ELEVATED.to_vec())
    }

    pub fn matches(&self, state: MaskState) -> bool {
        match self {
            MaskTarget::Exactly(target) => state == *target,
            MaskTarget::AnyOf(targets) => targets.contains(&state),
        }
    }
}

/// Per-individual means over the qualifying steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualSummary {
    pub individual: usize,
    pub strategy: usize,
    pub reserves: f64,
    pub weight: f64,
    pub fitness: f64,
    /// Mean day-of-year of the qualifying steps
    pub day_of_year: f64,
    /// Number of qualifying steps
    pub steps: usize,
}

impl IndividualSummary {
    /// Reserve-to-weight ratio of the mean values.
    pub fn fullness(&self) -> f64 {
        self.reserves / self.weight
    }
}

/// Column view of a set of summaries, in summary order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitColumns {
    pub lipids: Vec<f64>,
    pub fullness: Vec<f64>,
    pub fitness: Vec<f64>,
}

impl TraitColumns {
    pub fn from_summaries(summaries: &[IndividualSummary]) -> Self {
        Self {
            lipids: summaries.iter().map(|s| s.reserves).collect(),
            fullness: summaries.iter().map(IndividualSummary::fullness).collect(),
            fitness: summaries.iter().map(|s| s.fitness).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lipids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lipids.is_empty()
    }
}

pub struct TemporalAggregator<'a> {
    trajectory: &'a Trajectory,
    selection: &'a Selection,
}

impl<'a> TemporalAggregator<'a> {
    pub fn new(trajectory: &'a Trajectory, selection: &'a Selection) -> Result<Self> {
        let (nt, ni, ns) = trajectory.shape();
        if selection.mask.dim() != (nt, ni, ns) {
            return Err(CostError::ShapeMismatch {
                field: "mask",
                expected: vec![nt, ni, ns],
                found: selection.mask.shape().to_vec(),
            });
        }
        Ok(Self {
            trajectory,
            selection,
        })
    }

    fn qualifies(&self, t: usize, i: usize, s: usize, target: &MaskTarget, month: Option<Month>) -> bool {
        if !target.matches(self.selection.mask[[t, i, s]]) {
            return false;
        }
        match month {
            Some(m) => Month::from_day_of_year(self.trajectory.day_of_year[[t, i, s]]) == Some(m),
            None => true,
        }
    }

    /// Mean of `field` over the qualifying steps of one individual.
    pub fn individual_mean(
        &self,
        field: &Array3<f64>,
        individual: usize,
        strategy: usize,
        target: &MaskTarget,
        month: Option<Month>,
    ) -> Option<f64> {
        let steps = self.trajectory.n_steps();
        nan_mean(
            (0..steps)
                .filter(|&t| self.qualifies(t, individual, strategy, target, month))
                .map(|t| field[[t, individual, strategy]]),
        )
    }

    /// One summary per individual with at least one qualifying step that
    /// carries reserves. Ordered by individual, then strategy.
    pub fn summarize(&self, target: &MaskTarget, month: Option<Month>) -> Vec<IndividualSummary> {
        let (nt, ni, ns) = self.trajectory.shape();
        let traj = self.trajectory;
        let mut summaries = Vec::new();

        for i in 0..ni {
            for s in 0..ns {
                let steps: Vec<usize> = (0..nt)
                    .filter(|&t| self.qualifies(t, i, s, target, month))
                    .collect();
                if steps.is_empty() {
                    continue;
                }
                let Some(reserves) = nan_mean(steps.iter().map(|&t| traj.reserves[[t, i, s]])) else {
                    continue;
                };
                let weight = nan_mean(steps.iter().map(|&t| traj.weight[[t, i, s]])).unwrap_or(f64::NAN);
                let day_of_year =
                    nan_mean(steps.iter().map(|&t| traj.day_of_year[[t, i, s]])).unwrap_or(f64::NAN);

                summaries.push(IndividualSummary {
                    individual: i,
                    strategy: s,
                    reserves,
                    weight,
                    fitness: traj.fitness[[i, s]],
                    day_of_year,
                    steps: steps.len(),
                });
            }
        }
        summaries
    }
}
