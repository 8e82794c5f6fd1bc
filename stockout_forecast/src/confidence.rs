//! Confidence intervals for the depletion time
//!
//! The depletion offset `t* = -(b + γ) / m` is a ratio of fitted
//! coefficients. Its variance is approximated with the delta method,
//! `Var(t*) ≈ ∇t*ᵀ Σ ∇t*`, and the interval is `t* ± t_crit · sd(t*)` with
//! `t_crit` taken from Student's t on the residual degrees of freedom.

use crate::config::validate_confidence_level;
use crate::error::{ForecastError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Interval around a projected depletion offset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepletionInterval {
    /// Whether the bounds are statistically meaningful
    pub ok: bool,
    pub t_star: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// Standard deviation of `t_star`
    pub std_err: Option<f64>,
}

impl DepletionInterval {
    /// An interval flagged invalid, keeping whatever point estimate exists
    pub fn invalid(t_star: Option<f64>) -> Self {
        Self {
            ok: false,
            t_star,
            ..Self::default()
        }
    }

    /// Width of the interval, when valid
    pub fn width(&self) -> Option<f64> {
        match (self.ok, self.lower, self.upper) {
            (true, Some(lo), Some(hi)) => Some(hi - lo),
            _ => None,
        }
    }
}

/// Two-sided Student's t critical value for `dof` degrees of freedom
pub fn critical_value(confidence_level: f64, dof: usize) -> Result<f64> {
    validate_confidence_level(confidence_level)?;
    if dof == 0 {
        return Err(ForecastError::InvalidParameter(
            "Critical value needs at least one degree of freedom".to_string(),
        ));
    }

    let dist = StudentsT::new(0.0, 1.0, dof as f64)
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    Ok(dist.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Inputs to the delta-method interval
#[derive(Debug, Clone, Copy)]
pub struct DeltaMethodInput {
    pub t_star: Option<f64>,
    pub slope: f64,
    pub slope_std_err: Option<f64>,
    /// `∇t*ᵀ Σ ∇t*`
    pub t_star_variance: Option<f64>,
    pub dof: usize,
    pub confidence_level: f64,
}

/// Build the delta-method interval.
///
/// The interval is flagged invalid when there is no depletion to bound,
/// no residual degrees of freedom, or the slope is not significantly
/// different from zero at the requested level.
pub fn delta_method_interval(input: DeltaMethodInput) -> Result<DepletionInterval> {
    let Some(t_star) = input.t_star else {
        return Ok(DepletionInterval::invalid(None));
    };
    if input.dof < 1 {
        return Ok(DepletionInterval::invalid(Some(t_star)));
    }
    let (Some(slope_se), Some(variance)) = (input.slope_std_err, input.t_star_variance) else {
        return Ok(DepletionInterval::invalid(Some(t_star)));
    };

    let crit = critical_value(input.confidence_level, input.dof)?;

    let significant = if slope_se > 0.0 {
        input.slope.abs() / slope_se >= crit
    } else {
        input.slope != 0.0
    };
    if !significant {
        return Ok(DepletionInterval::invalid(Some(t_star)));
    }

    let std_err = variance.max(0.0).sqrt();
    let margin = crit * std_err;

    Ok(DepletionInterval {
        ok: true,
        t_star: Some(t_star),
        lower: Some(t_star - margin),
        upper: Some(t_star + margin),
        std_err: Some(std_err),
    })
}
