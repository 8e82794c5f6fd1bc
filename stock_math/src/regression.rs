//! Weighted ridge least squares
//!
//! Solves `θ = (XᵀWX + P)⁻¹ XᵀWy` for a design matrix `X`, observation
//! weights `W` (normalized to sum to one) and a diagonal penalty `P`.
//! With uniform weights and no penalty this is ordinary least squares:
//! `σ²` is the textbook `RSS / (n - p)` and the covariance is
//! `σ² (XᵀX)⁻¹`.

use crate::linalg::Matrix;
use crate::{MathError, Result};
use serde::Serialize;

/// A residual sum of squares this small relative to the total sum of
/// squares is treated as an exact fit.
const EXACT_FIT_RATIO: f64 = 1e-20;

/// Least-squares solver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquares {
    penalty: Vec<f64>,
}

/// Result of a least-squares fit
#[derive(Debug, Clone, Serialize)]
pub struct LeastSquaresFit {
    /// Fitted coefficients, one per design column
    pub coefficients: Vec<f64>,
    /// Parameter covariance, absent when there are no residual degrees of freedom
    pub covariance: Option<Matrix>,
    /// Residual variance on the scale of weights averaging one
    pub sigma2: Option<f64>,
    /// Fitted values `Xθ`
    pub fitted: Vec<f64>,
    /// Residuals `y - Xθ`
    pub residuals: Vec<f64>,
    /// Normalized weights used for the fit
    pub weights: Vec<f64>,
    /// Residual degrees of freedom (`n - p`, saturating at zero)
    pub dof: usize,
    /// Whether the residuals vanished to rounding error
    pub exact: bool,
    /// Weighted coefficient of determination
    pub r_squared: Option<f64>,
}

impl LeastSquares {
    /// Create an unpenalized solver for a design with `columns` columns
    pub fn new(columns: usize) -> Result<Self> {
        if columns == 0 {
            return Err(MathError::InvalidInput(
                "Design must have at least one column".to_string(),
            ));
        }

        Ok(Self {
            penalty: vec![0.0; columns],
        })
    }

    /// Add a ridge penalty `lambda` on one coefficient
    pub fn with_penalty(mut self, column: usize, lambda: f64) -> Result<Self> {
        if column >= self.penalty.len() {
            return Err(MathError::InvalidInput(format!(
                "Penalty column {} out of range for {} columns",
                column,
                self.penalty.len()
            )));
        }
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(MathError::InvalidInput(
                "Ridge penalty must be finite and non-negative".to_string(),
            ));
        }

        self.penalty[column] = lambda;
        Ok(self)
    }

    /// Number of design columns
    pub fn columns(&self) -> usize {
        self.penalty.len()
    }

    /// Fit `y` on the design `x`.
    ///
    /// `weights` default to uniform. They must be finite, non-negative and
    /// not all zero; they are normalized to sum to one.
    pub fn fit(&self, x: &Matrix, y: &[f64], weights: Option<&[f64]>) -> Result<LeastSquaresFit> {
        let n = x.rows();
        let p = self.columns();

        if x.cols() != p {
            return Err(MathError::InvalidInput(format!(
                "Design has {} columns, solver expects {}",
                x.cols(),
                p
            )));
        }
        if y.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Response length ({}) doesn't match design rows ({})",
                y.len(),
                n
            )));
        }
        if n == 0 {
            return Err(MathError::InsufficientData(
                "No observations to fit".to_string(),
            ));
        }

        let weights = normalize_weights(weights, n)?;

        // Normal equations
        let mut a = Matrix::diagonal(&self.penalty);
        let mut rhs = vec![0.0; p];
        for i in 0..n {
            let row = x.row(i);
            let w = weights[i];
            for j in 0..p {
                rhs[j] += w * row[j] * y[i];
                for k in 0..p {
                    a.set(j, k, a.get(j, k) + w * row[j] * row[k]);
                }
            }
        }

        let a_inv = a.inverse()?;
        let coefficients = a_inv.mul_vec(&rhs)?;
        let fitted = x.mul_vec(&coefficients)?;
        let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();

        let y_mean: f64 = weights.iter().zip(y).map(|(w, yi)| w * yi).sum();
        let rss: f64 = weights
            .iter()
            .zip(&residuals)
            .map(|(w, r)| w * r * r)
            .sum();
        let tss: f64 = weights
            .iter()
            .zip(y)
            .map(|(w, yi)| w * (yi - y_mean).powi(2))
            .sum();

        let exact = rss <= EXACT_FIT_RATIO * tss || rss == 0.0;
        let r_squared = if tss > 0.0 {
            Some(if exact { 1.0 } else { 1.0 - rss / tss })
        } else {
            None
        };

        let dof = n.saturating_sub(p);
        let (sigma2, covariance) = if dof == 0 {
            (None, None)
        } else {
            let sigma2 = if exact {
                0.0
            } else {
                n as f64 * rss / dof as f64
            };
            (Some(sigma2), Some(a_inv.scale(sigma2 / n as f64)))
        };

        Ok(LeastSquaresFit {
            coefficients,
            covariance,
            sigma2,
            fitted,
            residuals,
            weights,
            dof,
            exact,
            r_squared,
        })
    }
}

impl LeastSquaresFit {
    /// Standard error of coefficient `index`, when a covariance is available
    pub fn std_err(&self, index: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        if index >= cov.rows() {
            return None;
        }
        Some(cov.get(index, index).max(0.0).sqrt())
    }

    /// Variance of a linear-in-parameters quantity with the given gradient
    pub fn gradient_variance(&self, gradient: &[f64]) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        cov.quadratic_form(gradient).ok().map(|v| v.max(0.0))
    }
}

/// Fit `y = intercept + slope * x` by ordinary least squares.
///
/// Coefficients come back as `[intercept, slope]`.
pub fn simple_linear(x: &[f64], y: &[f64]) -> Result<LeastSquaresFit> {
    if x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "x length ({}) doesn't match y length ({})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(MathError::InsufficientData(
            "Need at least 2 points for linear regression".to_string(),
        ));
    }

    let rows: Vec<Vec<f64>> = x.iter().map(|&xi| vec![1.0, xi]).collect();
    let design = Matrix::from_rows(&rows)?;
    LeastSquares::new(2)?.fit(&design, y, None)
}

fn normalize_weights(weights: Option<&[f64]>, n: usize) -> Result<Vec<f64>> {
    let Some(weights) = weights else {
        return Ok(vec![1.0 / n as f64; n]);
    };

    if weights.len() != n {
        return Err(MathError::InvalidInput(format!(
            "Weights length ({}) doesn't match observations ({})",
            weights.len(),
            n
        )));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(MathError::InvalidInput(
            "Weights must be finite and non-negative".to_string(),
        ));
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(MathError::InvalidInput(
            "Weights must not all be zero".to_string(),
        ));
    }

    Ok(weights.iter().map(|w| w / total).collect())
}
