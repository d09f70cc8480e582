use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};

/// Bin-count and scaling policy of the histogram cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Observed maxima below this are treated as ratios (default: 1.0)
    #[serde(default = "default_ratio_threshold")]
    pub ratio_threshold: f64,

    /// Bins for ratio-like traits (default: 10)
    #[serde(default = "default_ratio_bins")]
    pub ratio_bins: usize,

    /// Bins for absolute-scale traits, observed and simulated (default: 15)
    #[serde(default = "default_absolute_bins")]
    pub absolute_bins: usize,

    /// Multiplier on absolute-scale costs (default: 1000)
    #[serde(default = "default_base_scale")]
    pub base_scale: f64,

    /// Multiplier when the simulated range leaves the observed one
    /// (default: 3000)
    #[serde(default = "default_out_of_range_penalty")]
    pub out_of_range_penalty: f64,
}

fn default_ratio_threshold() -> f64 {
    1.0
}
fn default_ratio_bins() -> usize {
    10
}
fn default_absolute_bins() -> usize {
    15
}
fn default_base_scale() -> f64 {
    1000.0
}
fn default_out_of_range_penalty() -> f64 {
    3000.0
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: default_ratio_threshold(),
            ratio_bins: default_ratio_bins(),
            absolute_bins: default_absolute_bins(),
            base_scale: default_base_scale(),
            out_of_range_penalty: default_out_of_range_penalty(),
        }
    }
}

impl HistogramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ratio_bins == 0 || self.absolute_bins == 0 {
            return Err(CostError::InvalidConfig(format!(
                "bin counts must be positive, got ratio={} absolute={}",
                self.ratio_bins, self.absolute_bins
            )));
        }
        if !self.ratio_threshold.is_finite() {
            return Err(CostError::InvalidConfig(format!(
                "ratio_threshold must be finite, got {}",
                self.ratio_threshold
            )));
        }
        if !(self.base_scale > 0.0) || !(self.out_of_range_penalty > 0.0) {
            return Err(CostError::InvalidConfig(format!(
                "scales must be positive, got base={} penalty={}",
                self.base_scale, self.out_of_range_penalty
            )));
        }
        Ok(())
    }
}
