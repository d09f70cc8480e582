use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Evaluator;
use crate::aggregate::{IndividualSummary, MaskTarget, TemporalAggregator, TraitColumns};
use crate::cost::mmd::complete_rows;
use crate::cost::SimulatedSample;
use crate::error::Result;
use crate::observation::ObservationTable;
use crate::nullable;
use crate::record::{CostComponent, CostKey, StagedCosts, TraitDiagnostics, TraitKind};
use crate::selection::{MaskState, Selection, Stage, StageCriterion};
use crate::stats::nan_median;
use crate::trajectory::{Month, Trajectory};

/// Kernel settings and sample sizes behind one joint cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDiagnostics {
    pub month: Month,
    pub stage: Stage,
    pub gamma: f64,
    pub observed: usize,
    pub simulated: usize,
    #[serde(with = "nullable")]
    pub cost: f64,
}

/// Costs under (month, stage) keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagedReport {
    pub costs: StagedCosts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub histograms: Vec<TraitDiagnostics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joint: Vec<JointDiagnostics>,
}

impl StagedReport {
    /// Sum of the per-key totals, or of the joint distances.
    pub fn headline(&self) -> f64 {
        if self.joint.is_empty() {
            self.costs.total_of(CostComponent::StageTotal)
        } else {
            self.costs.total_of(CostComponent::Joint)
        }
    }
}

/// One (month, stage) pair with both observed and simulated data.
struct StagedSample {
    month: Month,
    stage: Stage,
    observed: ObservationTable,
    simulated: Vec<IndividualSummary>,
}

fn stages_of(criterion: &StageCriterion) -> &[Stage] {
    match criterion {
        StageCriterion::Each(stages) => stages,
        _ => &[],
    }
}

/// Walk months and stages, skipping pairs without observations, without a
/// stage code or without simulated individuals.
fn staged_samples(evaluator: &Evaluator, trajectory: &Trajectory, selection: &Selection) -> Result<Vec<StagedSample>> {
    let aggregator = TemporalAggregator::new(trajectory, selection)?;
    let config = evaluator.config();
    let mut samples = Vec::new();

    for &month in &config.selection.months {
        let observed_month = evaluator.observations().for_month(month);
        if observed_month.is_empty() {
            debug!("No observations for month {}", month);
            continue;
        }
        for &stage in stages_of(&config.selection.criterion) {
            let Some(code) = config.observations.code_for(stage) else {
                debug!("No stage code for {}, skipped", stage);
                continue;
            };
            let observed = observed_month.for_stage_code(code);
            if observed.is_empty() {
                debug!("No observations for stage {} during {}", stage, month);
                continue;
            }
            let state = MaskState::for_stage(stage).unwrap_or(MaskState::Selected);
            let simulated = aggregator.summarize(&MaskTarget::Exactly(state), Some(month));
            if simulated.is_empty() {
                debug!("No simulated individuals for stage {} during {}", stage, month);
                continue;
            }
            samples.push(StagedSample {
                month,
                stage,
                observed,
                simulated,
            });
        }
    }
    Ok(samples)
}

pub(super) fn histogram_report(
    evaluator: &Evaluator,
    trajectory: &Trajectory,
    selection: &Selection,
) -> Result<StagedReport> {
    let mut report = StagedReport::default();

    for sample in staged_samples(evaluator, trajectory, selection)? {
        let columns = TraitColumns::from_summaries(&sample.simulated);
        let mut weighted_costs = [f64::NAN; 2];

        for (slot, kind) in TraitKind::ALL.into_iter().enumerate() {
            let (observed, simulated) = match kind {
                TraitKind::Lipids => (sample.observed.lipids(), &columns.lipids),
                TraitKind::Fullness => (sample.observed.fullness(), &columns.fullness),
            };
            let comparison = evaluator.histogram.compare(
                &observed,
                SimulatedSample::Weighted {
                    values: simulated,
                    weights: &columns.fitness,
                },
            )?;
            weighted_costs[slot] = comparison.cost;
            report.histograms.push(TraitDiagnostics {
                trait_kind: kind,
                month: Some(sample.month),
                stage: Some(sample.stage),
                weighted: true,
                observed_median: nan_median(&observed),
                simulated_median: nan_median(simulated),
                bin_edges: comparison.bin_edges,
                observed_density: comparison.observed_density,
                simulated_density: comparison.simulated_density,
            });
        }

        evaluator.aggregator.staged(
            &mut report.costs,
            Some(sample.month),
            sample.stage,
            weighted_costs[0],
            weighted_costs[1],
        );
    }
    debug!("Staged histogram costs for {} keys", report.costs.len());
    Ok(report)
}

pub(super) fn mmd_report(evaluator: &Evaluator, trajectory: &Trajectory, selection: &Selection) -> Result<StagedReport> {
    let mut report = StagedReport::default();

    for sample in staged_samples(evaluator, trajectory, selection)? {
        let observed = sample.observed.joint();
        let pairs: Vec<[f64; 2]> = sample
            .simulated
            .iter()
            .map(|s| [s.reserves, s.fullness()])
            .collect();
        let (simulated, kept) = complete_rows(&pairs);
        let weights: Vec<f64> = kept.iter().map(|&k| sample.simulated[k].fitness).collect();

        let comparison = evaluator.mmd.compare_scaled(&observed, &simulated, &weights)?;
        report.costs.insert(
            CostKey::new(Some(sample.month), sample.stage, CostComponent::Joint),
            comparison.cost,
        );
        report.joint.push(JointDiagnostics {
            month: sample.month,
            stage: sample.stage,
            gamma: comparison.gamma,
            observed: observed.nrows(),
            simulated: simulated.nrows(),
            cost: comparison.cost,
        });
    }
    debug!("Staged MMD costs for {} keys", report.costs.len());
    Ok(report)
}
