//! Descriptive statistics over plain `f64` slices.
//!
//! Every function returns `Option` (or an empty result) on degenerate input
//! instead of propagating `NaN` into ranked reports: an undefined metric is
//! absent, never a number.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation. `None` for an empty slice.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Quantile with linear interpolation between adjacent ranks.
///
/// `q` in `[0, 1]`. `None` for an empty slice or out-of-range `q`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Median (0.5 quantile).
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Z-score of a value against a precomputed mean/std. `None` when the
/// distribution is degenerate (`std == 0`), in which case no value can be a
/// Z-score outlier by definition.
pub fn z_score(value: f64, mean: f64, std: f64) -> Option<f64> {
    if std == 0.0 {
        return None;
    }
    Some((value - mean) / std)
}

/// IQR fences `(lower, upper)` for outlier detection.
///
/// `lower = max(0, Q1 - k*IQR)`, `upper = Q3 + k*IQR`. The lower fence is
/// clamped at zero because prices and quantities cannot be negative.
pub fn iqr_fences(values: &[f64], multiplier: f64) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some(((q1 - multiplier * iqr).max(0.0), q3 + multiplier * iqr))
}
