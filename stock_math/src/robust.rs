//! Robust estimators
//!
//! Median based statistics that tolerate outliers in a stock history:
//! - Median and linearly interpolated percentiles
//! - Theil–Sen line fitting (median of pairwise slopes)

use crate::{MathError, Result};
use serde::Serialize;

/// Line fitted by the Theil–Sen estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TheilSenFit {
    pub slope: f64,
    pub intercept: f64,
}

impl TheilSenFit {
    /// Evaluate the fitted line at `x`
    pub fn value_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Median of a sample. NaN values are rejected.
pub fn median(values: &[f64]) -> Result<f64> {
    percentile(values, 50.0)
}

/// Percentile `q` (0 to 100) using linear interpolation between closest
/// ranks, the same convention as the default in most numeric libraries.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a percentile of an empty sample".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Percentile must be between 0 and 100, got {}",
            q
        )));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput(
            "Sample contains NaN".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Median of all pairwise slopes. Pairs sharing an `x` are skipped.
pub fn theil_sen_slope(x: &[f64], y: &[f64]) -> Result<f64> {
    check_lengths(x, y)?;

    let mut slopes = Vec::with_capacity(x.len() * x.len().saturating_sub(1) / 2);
    for i in 0..x.len() {
        for j in i + 1..x.len() {
            let dx = x[j] - x[i];
            if dx != 0.0 {
                slopes.push((y[j] - y[i]) / dx);
            }
        }
    }

    if slopes.is_empty() {
        return Err(MathError::InsufficientData(
            "Theil-Sen needs at least two distinct x values".to_string(),
        ));
    }

    median(&slopes)
}

/// Fit a line with the Theil–Sen estimator: the slope is the median
/// pairwise slope and the intercept is the median of `y - slope * x`.
pub fn theil_sen(x: &[f64], y: &[f64]) -> Result<TheilSenFit> {
    let slope = theil_sen_slope(x, y)?;
    let offsets: Vec<f64> = x.iter().zip(y).map(|(xi, yi)| yi - slope * xi).collect();
    let intercept = median(&offsets)?;

    Ok(TheilSenFit { slope, intercept })
}

fn check_lengths(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "x length ({}) doesn't match y length ({})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(MathError::InsufficientData(
            "Need at least 2 points".to_string(),
        ));
    }
    Ok(())
}
