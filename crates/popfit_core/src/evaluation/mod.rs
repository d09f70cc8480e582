//! Evaluation boundary.
//!
//! Runs one parameter set through selection, aggregation and the configured
//! cost pipeline, and always returns an `EvaluationRecord`. Degenerate
//! populations end up in the record status; simulator errors, panics and
//! malformed inputs end up as `EvaluationStatus::Error`.

mod pooled;
mod staged;

pub use pooled::PooledReport;
pub use staged::{JointDiagnostics, StagedReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{CostConfig, Pipeline};
use crate::cost::{HistogramRmseCost, WeightedMmdCost};
use crate::error::{CostError, Result};
use crate::observation::ObservationTable;
use crate::record::CostAggregator;
use crate::selection::{MaskState, Selection};
use crate::trajectory::Trajectory;

/// Named model parameters of one run.
pub type ParameterSet = BTreeMap<String, f64>;

/// Anything that turns a parameter set into a trajectory.
pub trait PopulationModel {
    fn simulate(&self, params: &ParameterSet) -> anyhow::Result<Trajectory>;
}

impl<F> PopulationModel for F
where
    F: Fn(&ParameterSet) -> anyhow::Result<Trajectory>,
{
    fn simulate(&self, params: &ParameterSet) -> anyhow::Result<Trajectory> {
        self(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    /// Qualifying individuals found, costs computed
    Evaluated,
    /// Individuals reproduced but none reached the target stage/window
    NoTargetStage,
    /// Nobody reproduced
    NoReproduction,
    /// No individual ever carried reserves
    NoViableIndividuals,
    Error,
}

impl EvaluationStatus {
    /// Status implied by a selection over a viable population.
    pub fn from_selection(selection: &Selection) -> Self {
        match selection.best_state() {
            MaskState::NeverReproduced => EvaluationStatus::NoReproduction,
            MaskState::Reproduced => EvaluationStatus::NoTargetStage,
            _ => EvaluationStatus::Evaluated,
        }
    }

    pub fn has_costs(self) -> bool {
        self == EvaluationStatus::Evaluated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostReport {
    Pooled(PooledReport),
    Staged(StagedReport),
}

impl CostReport {
    /// Headline cost: the pooled total, or the sum over every staged key of
    /// its total (histogram) or joint distance (MMD).
    pub fn headline(&self) -> f64 {
        match self {
            CostReport::Pooled(report) => report.costs.total,
            CostReport::Staged(report) => report.headline(),
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub params: ParameterSet,
    #[serde(default)]
    pub species: Option<String>,
    pub pipeline: Pipeline,
    pub status: EvaluationStatus,
    /// Most refined selection state reached (0, 1, 2, 4, 5, 6); none when
    /// the population was not viable or the evaluation failed
    pub mask: Option<u8>,
    pub costs: Option<CostReport>,
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock seconds spent in the evaluation
    pub running_time: f64,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    fn new(params: &ParameterSet, species: Option<String>, pipeline: Pipeline) -> Self {
        Self {
            params: params.clone(),
            species,
            pipeline,
            status: EvaluationStatus::Error,
            mask: None,
            costs: None,
            error: None,
            running_time: 0.0,
            evaluated_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == EvaluationStatus::Error
    }
}

/// Status, mask and costs of one scored trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: EvaluationStatus,
    pub mask: Option<u8>,
    pub costs: Option<CostReport>,
}

pub struct Evaluator {
    config: CostConfig,
    observations: ObservationTable,
    histogram: HistogramRmseCost,
    mmd: WeightedMmdCost,
    aggregator: CostAggregator,
}

impl Evaluator {
    /// Observations are narrowed to the configured species and stripped of
    /// excluded categories once, here.
    pub fn new(config: CostConfig, observations: ObservationTable) -> Result<Self> {
        config.validate()?;
        let mut observations = observations.without_categories(&config.observations.exclude_categories);
        if let Some(species) = &config.observations.species {
            observations = observations.for_species(species);
        }
        if observations.is_empty() {
            warn!("No observations left for config '{}'", config.name);
        }
        Ok(Self {
            histogram: HistogramRmseCost::new(config.histogram.clone()),
            mmd: WeightedMmdCost::new(config.mmd.gamma),
            aggregator: CostAggregator::new(&config.aggregation),
            config,
            observations,
        })
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    pub fn observations(&self) -> &ObservationTable {
        &self.observations
    }

    /// Score a trajectory. Degenerate populations are an `Ok` outcome
    /// without costs; only malformed inputs are errors.
    pub fn score(&self, trajectory: &Trajectory) -> Result<Outcome> {
        trajectory.validate()?;

        if !trajectory.has_viable_individuals() {
            debug!("No viable individuals: every reserve value is missing");
            return Ok(Outcome {
                status: EvaluationStatus::NoViableIndividuals,
                mask: None,
                costs: None,
            });
        }

        let selection = self.config.selection.selector().select(trajectory);
        let status = EvaluationStatus::from_selection(&selection);
        let mask = Some(selection.best_state().code());
        if !status.has_costs() {
            debug!("Population has no qualifying individuals ({:?})", status);
            return Ok(Outcome {
                status,
                mask,
                costs: None,
            });
        }

        let costs = match self.config.pipeline {
            Pipeline::PooledHistogram => CostReport::Pooled(pooled::report(self, trajectory, &selection)?),
            Pipeline::StagedHistogram => {
                CostReport::Staged(staged::histogram_report(self, trajectory, &selection)?)
            }
            Pipeline::StagedMmd => CostReport::Staged(staged::mmd_report(self, trajectory, &selection)?),
        };
        Ok(Outcome {
            status,
            mask,
            costs: Some(costs),
        })
    }

    /// Score an existing trajectory; errors and panics become an error
    /// record.
    pub fn evaluate(&self, params: &ParameterSet, trajectory: &Trajectory) -> EvaluationRecord {
        self.run(params, || Ok(self.score(trajectory)?))
    }

    /// Simulate, then score. Nothing the model does escapes as an error or
    /// a panic.
    pub fn evaluate_model<M: PopulationModel + ?Sized>(
        &self,
        params: &ParameterSet,
        model: &M,
    ) -> EvaluationRecord {
        self.run(params, || {
            let trajectory = model
                .simulate(params)
                .map_err(|e| CostError::Simulation(format!("{:#}", e)))?;
            Ok(self.score(&trajectory)?)
        })
    }

    fn run(&self, params: &ParameterSet, evaluate: impl FnOnce() -> anyhow::Result<Outcome>) -> EvaluationRecord {
        let start = Instant::now();
        let mut record = EvaluationRecord::new(
            params,
            self.config.observations.species.clone(),
            self.config.pipeline,
        );

        let result = panic::catch_unwind(AssertUnwindSafe(evaluate));

        match result {
            Ok(Ok(outcome)) => {
                record.status = outcome.status;
                record.mask = outcome.mask;
                record.costs = outcome.costs;
            }
            Ok(Err(e)) => {
                warn!("Evaluation failed: {:#}", e);
                record.error = Some(format!("{:#}", e));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Evaluation panicked: {}", message);
                record.error = Some(format!("panic: {}", message));
            }
        }

        record.running_time = start.elapsed().as_secs_f64();
        info!(
            "Evaluated '{}' ({}): status={:?} mask={:?} in {:.3}s",
            self.config.name, self.config.pipeline, record.status, record.mask, record.running_time
        );
        record
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationRow;
    use crate::trajectory::fixtures::linear_trajectory;
    use anyhow::anyhow;

    const NAN: f64 = f64::NAN;

    fn params() -> ParameterSet {
        [("I0".to_string(), 0.39), ("Ks".to_string(), 0.85)].into_iter().collect()
    }

    fn observations() -> ObservationTable {
        [(4.0, 0.05), (5.0, 0.06), (6.0, 0.04), (5.5, 0.05)]
            .into_iter()
            .map(|(l, f)| ObservationRow::new(l, f))
            .collect()
    }

    fn pooled_evaluator() -> Evaluator {
        let mut config = CostConfig::pooled_august();
        config.selection.window = None;
        Evaluator::new(config, observations()).unwrap()
    }

    #[test]
    fn test_no_reproduction_gives_mask_zero_and_no_costs() {
        let traj = linear_trajectory(13, 220.0, &[1.2, 1.2], &[5.0, 5.0], &[NAN, NAN]);
        let record = pooled_evaluator().evaluate(&params(), &traj);
        assert_eq!(record.status, EvaluationStatus::NoReproduction);
        assert_eq!(record.mask, Some(0));
        assert!(record.costs.is_none());
        assert!(record.error.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["costs"].is_null());
        assert_eq!(json["mask"], 0);
    }

    #[test]
    fn test_reproduced_without_late_stage_gives_mask_one() {
        let traj = linear_trajectory(13, 220.0, &[0.5], &[5.0], &[10.0]);
        let record = pooled_evaluator().evaluate(&params(), &traj);
        assert_eq!(record.status, EvaluationStatus::NoTargetStage);
        assert_eq!(record.mask, Some(1));
        assert!(record.costs.is_none());
    }

    #[test]
    fn test_no_viable_individuals() {
        let mut traj = linear_trajectory(13, 220.0, &[1.2], &[5.0], &[10.0]);
        traj.reserves.fill(NAN);
        let record = pooled_evaluator().evaluate(&params(), &traj);
        assert_eq!(record.status, EvaluationStatus::NoViableIndividuals);
        assert_eq!(record.mask, None);
        assert!(record.costs.is_none());
    }

    #[test]
    fn test_successful_evaluation_carries_costs() {
        let traj = linear_trajectory(13, 220.0, &[1.2, 1.1], &[5.0, 6.0], &[10.0, 12.0]);
        let record = pooled_evaluator().evaluate(&params(), &traj);
        assert_eq!(record.status, EvaluationStatus::Evaluated);
        assert_eq!(record.mask, Some(2));
        assert_eq!(record.params, params());
        let Some(CostReport::Pooled(report)) = &record.costs else {
            panic!("expected pooled costs, got {:?}", record.costs);
        };
        assert_eq!(report.individuals, 2);
        assert!(report.costs.total.is_finite());
        assert!(record.running_time >= 0.0);
    }

    #[test]
    fn test_simulator_error_becomes_error_record() {
        let failing = |_: &ParameterSet| -> anyhow::Result<Trajectory> { Err(anyhow!("solver diverged")) };
        let record = pooled_evaluator().evaluate_model(&params(), &failing);
        assert!(record.is_error());
        assert!(record.costs.is_none());
        assert!(record.mask.is_none());
        assert!(record.error.as_deref().unwrap().contains("solver diverged"));
        assert_eq!(serde_json::to_value(&record).unwrap()["status"], "error");
    }

    #[test]
    fn test_simulator_panic_becomes_error_record() {
        let panicking = |_: &ParameterSet| -> anyhow::Result<Trajectory> { panic!("index out of bounds") };
        let record = pooled_evaluator().evaluate_model(&params(), &panicking);
        assert!(record.is_error());
        assert!(record.error.as_deref().unwrap().contains("index out of bounds"));
    }

    #[test]
    fn test_malformed_trajectory_becomes_error_record() {
        let mut traj = linear_trajectory(13, 220.0, &[1.2], &[5.0], &[10.0]);
        traj.fitness = ndarray::Array2::zeros((3, 3));
        let evaluator = pooled_evaluator();
        assert!(matches!(evaluator.score(&traj), Err(CostError::ShapeMismatch { .. })));
        let record = evaluator.evaluate(&params(), &traj);
        assert!(record.is_error());
    }

    #[test]
    fn test_model_closure_is_used() {
        let model = |p: &ParameterSet| -> anyhow::Result<Trajectory> {
            let repro = if p["I0"] > 0.5 { 10.0 } else { NAN };
            Ok(linear_trajectory(13, 220.0, &[1.2], &[5.0], &[repro]))
        };
        let evaluator = pooled_evaluator();
        let record = evaluator.evaluate_model(&params(), &model);
        assert_eq!(record.status, EvaluationStatus::NoReproduction);

        let mut high = params();
        high.insert("I0".to_string(), 0.9);
        let record = evaluator.evaluate_model(&high, &model);
        assert_eq!(record.status, EvaluationStatus::Evaluated);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let traj = linear_trajectory(13, 220.0, &[1.2, 1.1], &[5.0, 6.0], &[10.0, 12.0]);
        let record = pooled_evaluator().evaluate(&params(), &traj);
        let json = serde_json::to_string(&record).unwrap();
        let back: EvaluationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, record.status);
        assert_eq!(back.mask, record.mask);
        assert_eq!(back.costs.map(|c| c.headline()), record.costs.map(|c| c.headline()));
    }

    #[test]
    fn test_species_filter_applies_once() {
        let mut config = CostConfig::pooled_august();
        config.observations.species = Some("C. glacialis".to_string());
        let rows = vec![
            ObservationRow::new(1.0, 0.1).with_species("C. glacialis"),
            ObservationRow::new(2.0, 0.2).with_species("C. hyperboreus"),
        ];
        let evaluator = Evaluator::new(config, rows.into_iter().collect()).unwrap();
        assert_eq!(evaluator.observations().len(), 1);
    }
}
