//! Distribution discrepancy estimators.
//!
//! - `histogram` - density-histogram RMSE on one trait
//! - `mmd` - weighted maximum mean discrepancy on joint traits

pub mod histogram;
pub mod mmd;

pub use histogram::{HistogramComparison, HistogramRmseCost, SimulatedSample, TraitScale};
pub use mmd::{MmdComparison, WeightedMmdCost};

use crate::stats::nan_median;

/// Squared difference of the sample medians; NaN when either side is empty.
pub fn median_cost(observed: &[f64], simulated: &[f64]) -> f64 {
    (nan_median(simulated) - nan_median(observed)).powi(2)
}
