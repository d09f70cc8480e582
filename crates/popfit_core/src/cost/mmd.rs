//! Weighted MMD Cost
//!
//! Maximum mean discrepancy between an unweighted observed sample `X` and a
//! weighted simulated sample `Y`, with a Gaussian (RBF) kernel:
//!
//! ```text
//! MMD² = mean(Kxx) + wᵀ Kyy w - 2 mean_x(Kxy w)
//! ```
//!
//! where `w` is normalised to sum to one. The returned distance is
//! `sqrt(max(MMD², 0))`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::stats::nan_median;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MmdComparison {
    /// Distance; NaN when undefined
    pub cost: f64,
    /// Kernel coefficient actually used
    pub gamma: f64,
}

/// Column-wise min-max scaling of `X` and `Y` against their pooled range.
///
/// A column that is constant across both samples maps to zero.
pub fn joint_min_max_scale(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    if x.ncols() != y.ncols() {
        return Err(CostError::DimensionMismatch {
            observed: x.ncols(),
            simulated: y.ncols(),
        });
    }
    let mut xs = x.clone();
    let mut ys = y.clone();
    for c in 0..x.ncols() {
        let (xc, yc) = (x.column(c), y.column(c));
        let (lo, hi) = xc.iter().chain(yc.iter()).copied().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let span = hi - lo;
        let scale = |v: f64| if span > 0.0 { (v - lo) / span } else { 0.0 };
        xs.column_mut(c).apply(|v| *v = scale(*v));
        ys.column_mut(c).apply(|v| *v = scale(*v));
    }
    Ok((xs, ys))
}

fn squared_distance(a: &DMatrix<f64>, i: usize, b: &DMatrix<f64>, j: usize) -> f64 {
    (0..a.ncols()).map(|c| (a[(i, c)] - b[(j, c)]).powi(2)).sum()
}

/// Reciprocal of the median pairwise Euclidean distance over `X ∪ Y`.
///
/// Falls back to 1.0 when fewer than two rows are pooled or the median is
/// not positive.
pub fn median_heuristic_gamma(x: &DMatrix<f64>, y: &DMatrix<f64>) -> f64 {
    let nx = x.nrows();
    let pooled = DMatrix::from_fn(nx + y.nrows(), x.ncols().min(y.ncols()), |i, c| {
        if i < nx {
            x[(i, c)]
        } else {
            y[(i - nx, c)]
        }
    });
    let n = pooled.nrows();
    if n < 2 {
        return 1.0;
    }
    let mut distances = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            distances.push(squared_distance(&pooled, i, &pooled, j).sqrt());
        }
    }
    let median = nan_median(&distances);
    if median > 0.0 && median.is_finite() {
        1.0 / median
    } else {
        1.0
    }
}

/// Gaussian kernel matrix `K[i, j] = exp(-gamma * |a_i - b_j|²)`.
pub fn rbf_kernel(a: &DMatrix<f64>, b: &DMatrix<f64>, gamma: f64) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
        (-gamma * squared_distance(a, i, b, j)).exp()
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedMmdCost {
    /// Fixed kernel coefficient; the median heuristic when unset
    gamma: Option<f64>,
}

impl WeightedMmdCost {
    pub fn new(gamma: Option<f64>) -> Self {
        Self { gamma }
    }

    fn check(&self, x: &DMatrix<f64>, y: &DMatrix<f64>, weights: &[f64]) -> Result<()> {
        if x.ncols() != y.ncols() {
            return Err(CostError::DimensionMismatch {
                observed: x.ncols(),
                simulated: y.ncols(),
            });
        }
        if weights.len() != y.nrows() {
            return Err(CostError::LengthMismatch {
                field: "weights",
                expected: y.nrows(),
                found: weights.len(),
            });
        }
        Ok(())
    }

    /// MMD between `x` and weighted `y` without rescaling.
    pub fn compare(&self, x: &DMatrix<f64>, y: &DMatrix<f64>, weights: &[f64]) -> Result<MmdComparison> {
        self.check(x, y, weights)?;
        let gamma = self.gamma.unwrap_or_else(|| median_heuristic_gamma(x, y));

        let total: f64 = weights.iter().sum();
        if x.nrows() == 0 || y.nrows() == 0 || !(total > 0.0) || !total.is_finite() {
            return Ok(MmdComparison { cost: f64::NAN, gamma });
        }
        let w = DVector::from_iterator(weights.len(), weights.iter().map(|v| v / total));

        let kxx = rbf_kernel(x, x, gamma);
        let kyy = rbf_kernel(y, y, gamma);
        let kxy = rbf_kernel(x, y, gamma);

        let term_xx = kxx.mean();
        let term_yy = w.dot(&(&kyy * &w));
        let term_xy = (&kxy * &w).mean();

        let mmd2 = term_xx + term_yy - 2.0 * term_xy;
        Ok(MmdComparison {
            cost: mmd2.max(0.0).sqrt(),
            gamma,
        })
    }

    /// MMD after joint min-max scaling of both samples.
    pub fn compare_scaled(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        weights: &[f64],
    ) -> Result<MmdComparison> {
        self.check(x, y, weights)?;
        let (xs, ys) = joint_min_max_scale(x, y)?;
        self.compare(&xs, &ys, weights)
    }

    pub fn distance(&self, x: &DMatrix<f64>, y: &DMatrix<f64>, weights: &[f64]) -> Result<f64> {
        Ok(self.compare(x, y, weights)?.cost)
    }
}

/// Matrix from row tuples, dropping rows with a missing value. Returns the
/// kept row indices alongside.
pub fn complete_rows<const N: usize>(rows: &[[f64; N]]) -> (DMatrix<f64>, Vec<usize>) {
    let kept: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.iter().all(|v| !v.is_nan()))
        .map(|(k, _)| k)
        .collect();
    let matrix = DMatrix::from_fn(kept.len(), N, |i, c| rows[kept[i]][c]);
    (matrix, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn matrix(rows: &[[f64; 2]]) -> DMatrix<f64> {
        complete_rows(rows).0
    }

    #[test]
    fn test_identical_samples_have_zero_distance() {
        let x = matrix(&[[0.0, 1.0], [1.0, 0.5], [2.0, 0.0]]);
        let mmd = WeightedMmdCost::default();
        let d = mmd.distance(&x, &x, &[1.0, 1.0, 1.0]).unwrap();
        assert!(d.abs() < 1e-6, "distance {}", d);
    }

    #[test]
    fn test_shifted_sample_is_farther() {
        let x = matrix(&[[0.0, 0.0], [0.1, 0.1], [0.2, 0.0]]);
        let near = matrix(&[[0.05, 0.05], [0.15, 0.05]]);
        let far = matrix(&[[3.0, 3.0], [3.1, 2.9]]);
        let mmd = WeightedMmdCost::new(Some(1.0));
        let d_near = mmd.distance(&x, &near, &[1.0, 1.0]).unwrap();
        let d_far = mmd.distance(&x, &far, &[1.0, 1.0]).unwrap();
        assert!(d_near < d_far);
    }

    #[test]
    fn test_weights_are_normalised() {
        let x = matrix(&[[0.0, 0.0], [1.0, 1.0]]);
        let y = matrix(&[[0.0, 0.5], [1.0, 0.2]]);
        let mmd = WeightedMmdCost::new(Some(0.7));
        let a = mmd.distance(&x, &y, &[1.0, 3.0]).unwrap();
        let b = mmd.distance(&x, &y, &[10.0, 30.0]).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_weight_moves_distance() {
        let x = matrix(&[[0.0, 0.0], [0.0, 0.1]]);
        let y = matrix(&[[0.0, 0.05], [5.0, 5.0]]);
        let mmd = WeightedMmdCost::new(Some(1.0));
        let on_match = mmd.distance(&x, &y, &[1.0, 0.0]).unwrap();
        let on_outlier = mmd.distance(&x, &y, &[0.0, 1.0]).unwrap();
        assert!(on_match < on_outlier);
    }

    #[test]
    fn test_degenerate_inputs_give_nan() {
        let x = matrix(&[[0.0, 0.0]]);
        let y = matrix(&[[1.0, 1.0]]);
        let empty = DMatrix::<f64>::zeros(0, 2);
        let mmd = WeightedMmdCost::default();
        assert!(mmd.distance(&x, &y, &[0.0]).unwrap().is_nan());
        assert!(mmd.distance(&empty, &y, &[1.0]).unwrap().is_nan());
        assert!(mmd.distance(&x, &empty, &[]).unwrap().is_nan());
    }

    #[test]
    fn test_mismatched_shapes_are_errors() {
        let x = matrix(&[[0.0, 0.0]]);
        let y = DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
        let mmd = WeightedMmdCost::default();
        assert!(matches!(
            mmd.distance(&x, &y, &[1.0]),
            Err(CostError::DimensionMismatch { observed: 2, simulated: 3 })
        ));
        assert!(matches!(
            mmd.distance(&x, &x, &[1.0, 1.0]),
            Err(CostError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_median_heuristic() {
        let x = matrix(&[[0.0, 0.0], [3.0, 4.0]]);
        let y = matrix(&[[6.0, 8.0]]);
        // Pairwise distances 5, 10, 5 → median 5.
        assert!((median_heuristic_gamma(&x, &y) - 0.2).abs() < 1e-12);
        let same = matrix(&[[1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(median_heuristic_gamma(&same, &same), 1.0);
        assert_eq!(median_heuristic_gamma(&matrix(&[[1.0, 1.0]]), &DMatrix::zeros(0, 2)), 1.0);
    }

    #[test]
    fn test_joint_scaling() {
        let x = matrix(&[[0.0, 5.0], [10.0, 5.0]]);
        let y = matrix(&[[5.0, 5.0]]);
        let (xs, ys) = joint_min_max_scale(&x, &y).unwrap();
        assert_eq!(xs[(0, 0)], 0.0);
        assert_eq!(xs[(1, 0)], 1.0);
        assert_eq!(ys[(0, 0)], 0.5);
        // Constant column
        assert_eq!(xs[(0, 1)], 0.0);
        assert_eq!(ys[(0, 1)], 0.0);
    }

    #[test]
    fn test_complete_rows_drops_missing() {
        let (m, kept) = complete_rows(&[[1.0, 2.0], [f64::NAN, 1.0], [3.0, 4.0]]);
        assert_eq!(m.nrows(), 2);
        assert_eq!(kept, vec![0, 2]);
        assert_eq!(m[(1, 0)], 3.0);
    }

    proptest! {
        #[test]
        fn prop_distance_is_non_negative_and_zero_on_self(
            points in proptest::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 1..8),
            other in proptest::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 1..8),
        ) {
            let x = DMatrix::from_fn(points.len(), 2, |i, c| if c == 0 { points[i].0 } else { points[i].1 });
            let y = DMatrix::from_fn(other.len(), 2, |i, c| if c == 0 { other[i].0 } else { other[i].1 });
            let mmd = WeightedMmdCost::default();
            let uniform = vec![1.0; x.nrows()];
            let self_distance = mmd.compare_scaled(&x, &x, &uniform).unwrap().cost;
            prop_assert!(self_distance.abs() < 1e-6);
            let d = mmd.compare_scaled(&x, &y, &vec![1.0; y.nrows()]).unwrap().cost;
            prop_assert!(d >= 0.0);
        }
    }
}
