//! # Sample statistics
//!
//! Missing-value aware helpers shared by the cost estimators. NaN marks a
//! missing value everywhere in this crate; these functions skip it.

/// Values that are not NaN.
pub fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

pub fn nan_min(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(f64::min)
}

pub fn nan_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(f64::max)
}

/// Mean of present values, `None` when nothing is present.
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Median of present values; NaN when nothing is present.
///
/// Even-sized samples average the two middle values.
pub fn nan_median(values: &[f64]) -> f64 {
    let mut sorted = present(values);
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Piecewise-linear interpolation of (xp, fp) at `x`.
///
/// `xp` must be increasing. Points outside the range take the nearest end
/// value.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    let upper = xp[..n].partition_point(|&p| p <= x);
    let (x0, x1) = (xp[upper - 1], xp[upper]);
    let (y0, y1) = (fp[upper - 1], fp[upper]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Resample a curve onto new abscissae.
pub fn resample(targets: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    targets.iter().map(|&x| interp(x, xp, fp)).collect()
}

/// Root mean squared difference between two equally long curves.
pub fn rms_difference(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return f64::NAN;
    }
    let mse = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / n as f64;
    mse.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_skip_nan() {
        let values = [f64::NAN, 3.0, -1.0, f64::NAN, 2.0];
        assert_eq!(nan_min(&values), Some(-1.0));
        assert_eq!(nan_max(&values), Some(3.0));
        assert_eq!(nan_min(&[f64::NAN]), None);
        assert_eq!(nan_max(&[]), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(nan_mean([1.0, f64::NAN, 3.0]), Some(2.0));
        assert_eq!(nan_mean([f64::NAN]), None);
        assert_eq!(nan_mean(Vec::new()), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(nan_median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(nan_median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(nan_median(&[f64::NAN, 5.0]), 5.0);
        assert!(nan_median(&[]).is_nan());
    }

    #[test]
    fn test_interp() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [0.0, 10.0, 40.0];
        assert_eq!(interp(0.5, &xp, &fp), 5.0);
        assert_eq!(interp(1.5, &xp, &fp), 25.0);
        assert_eq!(interp(-1.0, &xp, &fp), 0.0);
        assert_eq!(interp(3.0, &xp, &fp), 40.0);
        assert_eq!(interp(1.0, &xp, &fp), 10.0);
        assert!(interp(0.5, &[], &[]).is_nan());
    }

    #[test]
    fn test_resample_onto_own_grid_is_identity() {
        let xp = [0.1, 0.2, 0.3, 0.4];
        let fp = [3.0, 0.0, 7.5, 1.0];
        assert_eq!(resample(&xp, &xp, &fp), fp.to_vec());
    }

    #[test]
    fn test_rms_difference() {
        assert_eq!(rms_difference(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!((rms_difference(&[0.0, 0.0], &[3.0, 4.0]) - 12.5f64.sqrt()).abs() < 1e-12);
        assert!(rms_difference(&[], &[]).is_nan());
        assert!(rms_difference(&[f64::NAN], &[1.0]).is_nan());
    }
}
