use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Evaluator;
use crate::aggregate::{MaskTarget, TemporalAggregator, TraitColumns};
use crate::cost::{median_cost, HistogramComparison, SimulatedSample};
use crate::error::Result;
use crate::record::{CostComponents, PooledCosts, TraitDiagnostics, TraitKind};
use crate::selection::Selection;
use crate::stats::nan_median;
use crate::trajectory::Trajectory;

/// Costs of the pooled late-stage comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledReport {
    pub costs: PooledCosts,
    /// Individuals that entered the simulated distributions
    pub individuals: usize,
    pub diagnostics: Vec<TraitDiagnostics>,
}

fn diagnostics(
    trait_kind: TraitKind,
    weighted: bool,
    comparison: &HistogramComparison,
    observed: &[f64],
    simulated: &[f64],
) -> TraitDiagnostics {
    TraitDiagnostics {
        trait_kind,
        month: None,
        stage: None,
        weighted,
        bin_edges: comparison.bin_edges.clone(),
        observed_density: comparison.observed_density.clone(),
        simulated_density: comparison.simulated_density.clone(),
        observed_median: nan_median(observed),
        simulated_median: nan_median(simulated),
    }
}

pub(super) fn report(evaluator: &Evaluator, trajectory: &Trajectory, selection: &Selection) -> Result<PooledReport> {
    let aggregator = TemporalAggregator::new(trajectory, selection)?;
    let summaries = aggregator.summarize(&MaskTarget::elevated(), None);
    let columns = TraitColumns::from_summaries(&summaries);
    debug!("Pooled comparison over {} individuals", columns.len());

    let observations = evaluator.observations();
    let mut components = CostComponents::undefined();
    let mut trait_diagnostics = Vec::with_capacity(4);

    for kind in TraitKind::ALL {
        let (observed, simulated) = match kind {
            TraitKind::Lipids => (observations.lipids(), &columns.lipids),
            TraitKind::Fullness => (observations.fullness(), &columns.fullness),
        };
        let plain = evaluator
            .histogram
            .compare(&observed, SimulatedSample::Plain(simulated))?;
        let weighted = evaluator.histogram.compare(
            &observed,
            SimulatedSample::Weighted {
                values: simulated,
                weights: &columns.fitness,
            },
        )?;
        let median = median_cost(&observed, simulated);

        match kind {
            TraitKind::Lipids => {
                components.lipids = plain.cost;
                components.lipids_weighted = weighted.cost;
                components.lipids_median = median;
            }
            TraitKind::Fullness => {
                components.fullness = plain.cost;
                components.fullness_weighted = weighted.cost;
                components.fullness_median = median;
            }
        }
        trait_diagnostics.push(diagnostics(kind, false, &plain, &observed, simulated));
        trait_diagnostics.push(diagnostics(kind, true, &weighted, &observed, simulated));
    }

    Ok(PooledReport {
        costs: evaluator.aggregator.pooled(components),
        individuals: columns.len(),
        diagnostics: trait_diagnostics,
    })
}
