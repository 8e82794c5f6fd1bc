//! Depletion models
//!
//! A model fits a line (optionally with a snap level shift) to a
//! [`TimeAxis`] and reports where it crosses zero together with an
//! interval around that crossing.

use crate::config::FitMethod;
use crate::confidence::DepletionInterval;
use crate::data::TimeAxis;
use crate::error::Result;
use std::fmt::Debug;

pub mod least_squares;
pub mod theil_sen;

pub use least_squares::LeastSquaresModel;
pub use theil_sen::TheilSenModel;

/// Snap samples are recorded after stock was halved
pub const SNAP_RESTORE_FACTOR: f64 = 2.0;

// Total change over the observed span below this fraction of the largest
// level (or of one unit, whichever is bigger) counts as a flat trend.
const FLAT_TOLERANCE: f64 = 1e-9;

/// A fitted depletion trend
#[derive(Debug, Clone, PartialEq)]
pub struct DepletionFit {
    pub method: FitMethod,
    pub intercept: f64,
    /// Stock units per minute
    pub slope: f64,
    /// Step added from `shift_offset` onwards (zero without a level shift)
    pub level_shift: f64,
    pub shift_offset: Option<f64>,
    /// Minute offset where the fitted line reaches zero
    pub t_star: Option<f64>,
    pub interval: DepletionInterval,
    pub sigma2: Option<f64>,
    pub slope_std_err: Option<f64>,
    pub r_squared: Option<f64>,
    pub dof: usize,
    /// The slope is indistinguishable from zero over the observed span
    pub flat: bool,
    /// Levels the model was fitted to, after any snap adjustment
    pub levels: Vec<f64>,
    /// Fitted values at the observation offsets
    pub fitted: Vec<f64>,
}

impl DepletionFit {
    /// Evaluate the fitted trend at a minute offset
    pub fn value_at(&self, t: f64) -> f64 {
        let shift = match self.shift_offset {
            Some(offset) if t >= offset => self.level_shift,
            _ => 0.0,
        };
        self.intercept + shift + self.slope * t
    }

    /// Whether the trend projects a depletion
    pub fn depletes(&self) -> bool {
        self.t_star.is_some()
    }
}

/// Model that fits a depletion trend to a stock history
pub trait DepletionModel: Debug + Send + Sync {
    /// Fit the model to at least two samples
    fn fit(&self, axis: &TimeAxis) -> Result<DepletionFit>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Apply the restore adjustment to snap samples
pub(crate) fn restored_levels(axis: &TimeAxis) -> Vec<f64> {
    axis.levels
        .iter()
        .zip(&axis.snaps)
        .map(|(&level, &snap)| if snap { level * SNAP_RESTORE_FACTOR } else { level })
        .collect()
}

/// Index of the first snap sample that has an earlier sample before it
pub(crate) fn first_snap_index(axis: &TimeAxis) -> Option<usize> {
    (1..axis.len()).find(|&i| axis.snaps[i])
}

pub(crate) fn is_flat(slope: f64, span: f64, levels: &[f64]) -> bool {
    (slope * span).abs() <= FLAT_TOLERANCE * level_scale(levels)
}

/// Offset where the line `origin_level + slope * t` reaches zero.
///
/// A flat trend never depletes unless its current level is already zero,
/// in which case depletion is placed at the time-axis origin.
pub(crate) fn depletion_offset(
    origin_level: f64,
    slope: f64,
    flat: bool,
    current_level: f64,
    levels: &[f64],
) -> Option<f64> {
    if flat {
        if current_level.abs() <= FLAT_TOLERANCE * level_scale(levels) {
            Some(0.0)
        } else {
            None
        }
    } else if slope < 0.0 {
        Some(-origin_level / slope)
    } else {
        None
    }
}

fn level_scale(levels: &[f64]) -> f64 {
    levels.iter().fold(1.0_f64, |m, v| m.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depletion_offset() {
        let levels = [100.0, 98.0];
        assert_eq!(depletion_offset(100.0, -2.0, false, 98.0, &levels), Some(50.0));
        assert_eq!(depletion_offset(100.0, 2.0, false, 102.0, &levels), None);
        assert_eq!(depletion_offset(50.0, 0.0, true, 50.0, &levels), None);
        assert_eq!(depletion_offset(0.0, 0.0, true, 0.0, &[0.0, 0.0]), Some(0.0));
    }

    #[test]
    fn test_is_flat() {
        assert!(is_flat(1e-15, 1000.0, &[50.0, 50.0]));
        assert!(!is_flat(-0.01, 1000.0, &[50.0, 40.0]));
    }
}
