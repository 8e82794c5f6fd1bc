//! Least-squares depletion model with a delta-method interval

use crate::config::{FitMethod, ForecastConfig, SnapAdjustment, Weighting};
use crate::confidence::{delta_method_interval, DeltaMethodInput, DepletionInterval};
use crate::data::TimeAxis;
use crate::error::Result;
use crate::models::{
    depletion_offset, first_snap_index, is_flat, restored_levels, DepletionFit, DepletionModel,
};
use stock_math::{LeastSquares, MathError, Matrix};
use tracing::{debug, warn};

/// Weighted ridge least-squares trend.
///
/// Design columns are `[1, t]`, plus a step `S` when a snap level shift is
/// active. The ridge penalty applies to the slope only.
#[derive(Debug, Clone)]
pub struct LeastSquaresModel {
    name: String,
    confidence_level: f64,
    weighting: Weighting,
    ridge_lambda: f64,
    snap_adjustment: SnapAdjustment,
}

impl LeastSquaresModel {
    /// Ordinary least squares at the given confidence level
    pub fn new(confidence_level: f64) -> Result<Self> {
        Self::from_config(&ForecastConfig::default().with_confidence_level(confidence_level))
    }

    /// Build the model from an engine configuration
    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: format!(
                "Least Squares (weighting={:?}, ridge={})",
                config.weighting, config.ridge_lambda
            ),
            confidence_level: config.confidence_level,
            weighting: config.weighting,
            ridge_lambda: config.ridge_lambda,
            snap_adjustment: config.snap_adjustment,
        })
    }

    /// Index of the first snap sample usable as a level shift: it needs at
    /// least one earlier sample, and three samples in total.
    fn shift_index(&self, axis: &TimeAxis) -> Option<usize> {
        if self.snap_adjustment != SnapAdjustment::LevelShift {
            return None;
        }

        let index = first_snap_index(axis);

        if index.is_none() || axis.len() < 3 {
            warn!(
                samples = axis.len(),
                "no usable snap event for a level shift, fitting without it"
            );
            return None;
        }
        index
    }
}

impl DepletionModel for LeastSquaresModel {
    fn fit(&self, axis: &TimeAxis) -> Result<DepletionFit> {
        let n = axis.len();
        if n < 2 {
            return Err(MathError::InsufficientData(
                "Least squares needs at least 2 samples".to_string(),
            )
            .into());
        }

        let levels = match self.snap_adjustment {
            SnapAdjustment::Restore => restored_levels(axis),
            _ => axis.levels.clone(),
        };
        let shift_index = self.shift_index(axis);
        let columns = if shift_index.is_some() { 3 } else { 2 };

        let rows: Vec<Vec<f64>> = axis
            .offsets
            .iter()
            .enumerate()
            .map(|(i, &t)| match shift_index {
                Some(s) => vec![1.0, t, if i >= s { 1.0 } else { 0.0 }],
                None => vec![1.0, t],
            })
            .collect();
        let design = Matrix::from_rows(&rows)?;

        let weights = match self.weighting {
            Weighting::Uniform => None,
            Weighting::Harmonic => Some(harmonic_weights(n, shift_index)),
        };

        let solver = LeastSquares::new(columns)?.with_penalty(1, self.ridge_lambda)?;
        let fit = solver.fit(&design, &levels, weights.as_deref())?;

        let intercept = fit.coefficients[0];
        let slope = fit.coefficients[1];
        let level_shift = fit.coefficients.get(2).copied().unwrap_or(0.0);
        let origin_level = intercept + level_shift;

        let span = axis.last_offset() - axis.offsets[0];
        let flat = is_flat(slope, span, &levels);
        let current_level = fit.fitted[n - 1];
        let t_star = depletion_offset(origin_level, slope, flat, current_level, &levels);

        let interval = if flat {
            DepletionInterval::invalid(t_star)
        } else {
            let gradient = match shift_index {
                Some(_) => vec![-1.0 / slope, origin_level / slope.powi(2), -1.0 / slope],
                None => vec![-1.0 / slope, intercept / slope.powi(2)],
            };
            delta_method_interval(DeltaMethodInput {
                t_star,
                slope,
                slope_std_err: fit.std_err(1),
                t_star_variance: fit.gradient_variance(&gradient),
                dof: fit.dof,
                confidence_level: self.confidence_level,
            })?
        };

        debug!(
            intercept,
            slope,
            level_shift,
            dof = fit.dof,
            exact = fit.exact,
            ?t_star,
            ci_ok = interval.ok,
            "least squares fit"
        );

        Ok(DepletionFit {
            method: FitMethod::LeastSquares,
            intercept,
            slope,
            level_shift,
            shift_offset: shift_index.map(|s| axis.offsets[s]),
            t_star,
            interval,
            sigma2: fit.sigma2,
            slope_std_err: fit.std_err(1),
            r_squared: fit.r_squared,
            dof: fit.dof,
            flat,
            levels,
            fitted: fit.fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Harmonic sample weights: `1 / (i + 1)` by index.
///
/// With a level shift at `s`, samples from `s` on restart the sequence and
/// every earlier sample shares the small weight `1 / (s · n_post)`.
fn harmonic_weights(n: usize, shift_index: Option<usize>) -> Vec<f64> {
    match shift_index {
        None => (0..n).map(|i| 1.0 / (i as f64 + 1.0)).collect(),
        Some(s) => {
            let n_post = (n - s) as f64;
            (0..n)
                .map(|i| {
                    if i >= s {
                        1.0 / ((i - s) as f64 + 1.0)
                    } else {
                        1.0 / (s as f64 * n_post)
                    }
                })
                .collect()
        }
    }
}
