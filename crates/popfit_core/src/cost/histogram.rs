//! Histogram RMSE Cost
//!
//! Compares an observed trait sample with a simulated one through
//! density-normalised histograms that share the observed bin edges.
//!
//! Policy (one for every pipeline):
//! - ratio-like traits (`max_obs < 1`): `ratio_bins` bins, raw RMS as cost
//! - absolute-scale traits: `absolute_bins` bins for both samples, RMS times
//!   `base_scale`, or times `out_of_range_penalty` when the raw simulated
//!   range leaves the observed one

use serde::{Deserialize, Serialize};

use crate::config::HistogramConfig;
use crate::error::{CostError, Result};
use crate::stats::{nan_max, nan_min, present, resample, rms_difference};

/// Simulated side of a comparison.
#[derive(Debug, Clone, Copy)]
pub enum SimulatedSample<'a> {
    Plain(&'a [f64]),
    /// Values with one auxiliary weight each (fitness)
    Weighted {
        values: &'a [f64],
        weights: &'a [f64],
    },
}

impl<'a> SimulatedSample<'a> {
    pub fn values(&self) -> &'a [f64] {
        match self {
            SimulatedSample::Plain(values) => values,
            SimulatedSample::Weighted { values, .. } => values,
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self, SimulatedSample::Weighted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitScale {
    /// Dimensionless ratio (fullness), never rescaled
    Ratio,
    /// Absolute quantity (lipid mass), rescaled and range-penalised
    Absolute,
}

/// Outcome of one histogram comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramComparison {
    /// Scaled cost; NaN when undefined
    pub cost: f64,
    /// Unscaled RMS density error
    pub rms: f64,
    pub scale: Option<TraitScale>,
    pub out_of_range: bool,
    pub observed_density: Vec<f64>,
    pub simulated_density: Vec<f64>,
    pub bin_edges: Vec<f64>,
}

impl HistogramComparison {
    fn undefined(scale: Option<TraitScale>, observed_density: Vec<f64>, bin_edges: Vec<f64>) -> Self {
        let simulated_density = vec![f64::NAN; observed_density.len()];
        Self {
            cost: f64::NAN,
            rms: f64::NAN,
            scale,
            out_of_range: false,
            observed_density,
            simulated_density,
            bin_edges,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.cost.is_nan()
    }

    /// Centre of every bin.
    pub fn bin_centers(&self) -> Vec<f64> {
        bin_centers(&self.bin_edges)
    }
}

/// `bins + 1` evenly spaced edges over `[lo, hi]`.
pub fn bin_edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let width = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|k| lo + width * k as f64).collect();
    edges.push(hi);
    edges
}

pub fn bin_centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

fn bin_index(value: f64, edges: &[f64]) -> Option<usize> {
    let bins = edges.len().checked_sub(1)?;
    let (lo, hi) = (edges[0], edges[bins]);
    if bins == 0 || value.is_nan() || value < lo || value > hi {
        return None;
    }
    if value == hi {
        return Some(bins - 1);
    }
    // Edges are increasing; the last edge closes the last bin.
    Some(edges.partition_point(|&e| e <= value).saturating_sub(1).min(bins - 1))
}

/// Density histogram over fixed edges: bin mass divided by total mass and
/// bin width, so the curve integrates to one. Values outside the edges are
/// ignored. NaN everywhere when the total mass is not positive.
pub fn density_histogram(values: &[f64], weights: Option<&[f64]>, edges: &[f64]) -> Vec<f64> {
    let bins = edges.len().saturating_sub(1);
    let mut mass = vec![0.0; bins];
    for (k, &value) in values.iter().enumerate() {
        if let Some(b) = bin_index(value, edges) {
            mass[b] += weights.map_or(1.0, |w| w[k]);
        }
    }
    let total: f64 = mass.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return vec![f64::NAN; bins];
    }
    mass.iter()
        .zip(edges.windows(2))
        .map(|(m, w)| m / total / (w[1] - w[0]))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct HistogramRmseCost {
    config: HistogramConfig,
}

impl HistogramRmseCost {
    pub fn new(config: HistogramConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HistogramConfig {
        &self.config
    }

    pub fn classify(&self, max_obs: f64) -> TraitScale {
        if max_obs < self.config.ratio_threshold {
            TraitScale::Ratio
        } else {
            TraitScale::Absolute
        }
    }

    /// Compare an observed sample with a simulated one.
    ///
    /// Degenerate inputs (no observations, no simulated values, weights that
    /// do not sum to a positive number) give a NaN cost. Only a weight
    /// vector of the wrong length is an error.
    pub fn compare(&self, observed: &[f64], simulated: SimulatedSample<'_>) -> Result<HistogramComparison> {
        if let SimulatedSample::Weighted { values, weights } = simulated {
            if values.len() != weights.len() {
                return Err(CostError::LengthMismatch {
                    field: "weights",
                    expected: values.len(),
                    found: weights.len(),
                });
            }
        }

        let observed = present(observed);
        let (Some(min_obs), Some(max_obs)) = (nan_min(&observed), nan_max(&observed)) else {
            return Ok(HistogramComparison::undefined(None, Vec::new(), Vec::new()));
        };

        let scale = self.classify(max_obs);
        let bins = match scale {
            TraitScale::Ratio => self.config.ratio_bins,
            TraitScale::Absolute => self.config.absolute_bins,
        };
        let (lo, hi) = if min_obs == max_obs {
            (min_obs - 0.5, max_obs + 0.5)
        } else {
            (min_obs, max_obs)
        };
        let edges = bin_edges(lo, hi, bins);
        let centers = bin_centers(&edges);
        let observed_density = resample(&centers, &centers, &density_histogram(&observed, None, &edges));

        // Drop missing simulated values together with their weights.
        let (sim_values, sim_weights): (Vec<f64>, Option<Vec<f64>>) = match simulated {
            SimulatedSample::Plain(values) => (present(values), None),
            SimulatedSample::Weighted { values, weights } => {
                let (v, w): (Vec<f64>, Vec<f64>) = values
                    .iter()
                    .zip(weights.iter())
                    .filter(|(v, _)| !v.is_nan())
                    .map(|(v, w)| (*v, *w))
                    .unzip();
                (v, Some(w))
            }
        };

        if sim_values.is_empty() {
            return Ok(HistogramComparison::undefined(Some(scale), observed_density, edges));
        }
        if let Some(weights) = &sim_weights {
            let total: f64 = weights.iter().sum();
            if !(total > 0.0) || !total.is_finite() {
                return Ok(HistogramComparison::undefined(Some(scale), observed_density, edges));
            }
        }

        let sim_min = nan_min(&sim_values).unwrap_or(min_obs);
        let sim_max = nan_max(&sim_values).unwrap_or(max_obs);
        let out_of_range = sim_min < min_obs || sim_max > max_obs;

        let clipped: Vec<f64> = sim_values.iter().map(|v| v.clamp(min_obs, max_obs)).collect();
        let simulated_density = resample(
            &centers,
            &centers,
            &density_histogram(&clipped, sim_weights.as_deref(), &edges),
        );

        let rms = rms_difference(&observed_density, &simulated_density);
        let cost = match scale {
            TraitScale::Ratio => rms,
            TraitScale::Absolute if out_of_range => rms * self.config.out_of_range_penalty,
            TraitScale::Absolute => rms * self.config.base_scale,
        };

        Ok(HistogramComparison {
            cost,
            rms,
            scale: Some(scale),
            out_of_range,
            observed_density,
            simulated_density,
            bin_edges: edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cost() -> HistogramRmseCost {
        HistogramRmseCost::default()
    }

    #[test]
    fn test_identical_absolute_samples_cost_zero() {
        let sample = [0.5, 1.0, 1.5, 2.0];
        let result = cost().compare(&sample, SimulatedSample::Plain(&sample)).unwrap();
        assert_eq!(result.scale, Some(TraitScale::Absolute));
        assert!(!result.out_of_range);
        assert!(result.rms.abs() < 1e-12);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.bin_edges.len(), 16);
        assert_eq!(result.observed_density, result.simulated_density);
    }

    #[test]
    fn test_ratio_trait_is_not_rescaled() {
        let observed = [0.1, 0.2, 0.3];
        let simulated = [0.15, 0.25];
        let result = cost().compare(&observed, SimulatedSample::Plain(&simulated)).unwrap();
        assert_eq!(result.scale, Some(TraitScale::Ratio));
        assert_eq!(result.bin_edges.len(), 11);
        assert!(result.rms > 0.0);
        assert_eq!(result.cost, result.rms);
    }

    #[test]
    fn test_ratio_trait_out_of_range_still_unscaled() {
        let observed = [0.1, 0.2, 0.3];
        let simulated = [0.05, 0.9];
        let result = cost().compare(&observed, SimulatedSample::Plain(&simulated)).unwrap();
        assert!(result.out_of_range);
        assert_eq!(result.cost, result.rms);
    }

    #[test]
    fn test_out_of_range_absolute_uses_penalty() {
        let observed = [0.5, 1.0, 1.5, 2.0];
        let simulated = [0.5, 1.0, 1.5, 2.0, 3.0];
        let result = cost().compare(&observed, SimulatedSample::Plain(&simulated)).unwrap();
        assert!(result.out_of_range);
        assert!(result.rms > 0.0);
        assert_eq!(result.cost, result.rms * 3000.0);

        let inside = [0.6, 1.1, 1.9];
        let result = cost().compare(&observed, SimulatedSample::Plain(&inside)).unwrap();
        assert!(!result.out_of_range);
        assert_eq!(result.cost, result.rms * 1000.0);
    }

    #[test]
    fn test_simulated_values_are_clipped_into_observed_range() {
        let observed = [1.0, 2.0, 3.0, 4.0];
        let simulated = [-50.0, 100.0];
        let result = cost().compare(&observed, SimulatedSample::Plain(&simulated)).unwrap();
        let width = result.bin_edges[1] - result.bin_edges[0];
        let mass: f64 = result.simulated_density.iter().map(|d| d * width).sum();
        assert!((mass - 1.0).abs() < 1e-9);
        assert!(result.simulated_density[0] > 0.0);
        assert!(*result.simulated_density.last().unwrap() > 0.0);
    }

    #[test]
    fn test_zero_weights_give_nan() {
        let observed = [0.5, 1.0, 1.5, 2.0];
        let values = [0.7, 1.2];
        let weights = [0.0, 0.0];
        let result = cost()
            .compare(&observed, SimulatedSample::Weighted { values: &values, weights: &weights })
            .unwrap();
        assert!(result.cost.is_nan());
        assert!(!result.is_defined());
        assert!(result.simulated_density.iter().all(|d| d.is_nan()));
        assert_eq!(result.observed_density.len(), 15);
    }

    #[test]
    fn test_empty_simulated_sample_gives_nan() {
        let observed = [0.5, 1.0];
        let result = cost().compare(&observed, SimulatedSample::Plain(&[])).unwrap();
        assert!(result.cost.is_nan());
        let result = cost().compare(&observed, SimulatedSample::Plain(&[f64::NAN])).unwrap();
        assert!(result.cost.is_nan());
    }

    #[test]
    fn test_empty_observed_sample_gives_nan() {
        let result = cost().compare(&[f64::NAN], SimulatedSample::Plain(&[1.0])).unwrap();
        assert!(result.cost.is_nan());
        assert!(result.bin_edges.is_empty());
    }

    #[test]
    fn test_weighted_histogram_follows_weights() {
        let observed = [0.0, 0.5, 1.0, 2.0];
        let values = [0.1, 1.9];
        let heavy_low = [9.0, 1.0];
        let result = cost()
            .compare(&observed, SimulatedSample::Weighted { values: &values, weights: &heavy_low })
            .unwrap();
        assert!(result.simulated_density[0] > *result.simulated_density.last().unwrap());
        let width = result.bin_edges[1] - result.bin_edges[0];
        assert!((result.simulated_density[0] * width - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_weight_length_mismatch_is_an_error() {
        let result = cost().compare(
            &[1.0, 2.0],
            SimulatedSample::Weighted { values: &[1.0, 2.0], weights: &[1.0] },
        );
        assert!(matches!(result, Err(CostError::LengthMismatch { .. })));
    }

    #[test]
    fn test_degenerate_observed_range_widens() {
        let observed = [5.0, 5.0];
        let result = cost().compare(&observed, SimulatedSample::Plain(&[5.0])).unwrap();
        assert_eq!(result.bin_edges[0], 4.5);
        assert_eq!(*result.bin_edges.last().unwrap(), 5.5);
        assert_eq!(result.cost, 0.0);
    }

    #[test]
    fn test_density_histogram_matches_numpy_convention() {
        let edges = bin_edges(0.0, 1.0, 4);
        let density = density_histogram(&[0.0, 0.25, 0.5, 1.0], None, &edges);
        // 1.0 lands in the last bin, which is closed on the right.
        assert_eq!(density, vec![1.0, 1.0, 1.0, 1.0]);

        let density = density_histogram(&[0.9, 1.0, 2.0], Some(&[1.0, 3.0, 5.0]), &edges);
        assert_eq!(density, vec![0.0, 0.0, 0.0, 4.0]);

        assert!(density_histogram(&[5.0], None, &edges).iter().all(|d| d.is_nan()));
    }

    fn assert_self_match(sample: &[f64], scale: TraitScale) -> std::result::Result<(), TestCaseError> {
        let plain = cost().compare(sample, SimulatedSample::Plain(sample)).unwrap();
        prop_assert_eq!(plain.scale, Some(scale));
        prop_assert!(!plain.out_of_range);
        prop_assert_eq!(plain.rms, 0.0);
        prop_assert_eq!(plain.cost, 0.0);

        let weights = vec![1.0; sample.len()];
        let weighted = cost()
            .compare(sample, SimulatedSample::Weighted { values: sample, weights: &weights })
            .unwrap();
        let peak = weighted.observed_density.iter().cloned().fold(1.0, f64::max);
        prop_assert!(weighted.rms.abs() <= 1e-9 * peak, "rms {}", weighted.rms);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_ratio_sample_matches_itself(sample in proptest::collection::vec(0.0f64..0.99, 1..40)) {
            assert_self_match(&sample, TraitScale::Ratio)?;
        }

        #[test]
        fn prop_absolute_sample_matches_itself(sample in proptest::collection::vec(1.0f64..1000.0, 1..40)) {
            assert_self_match(&sample, TraitScale::Absolute)?;
        }
    }
}
