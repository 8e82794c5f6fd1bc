//! Goodness-of-fit metrics for a fitted trend

use crate::error::{ForecastError, Result};

/// Accuracy of fitted values against the observed stock levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error over non-zero observations
    pub mape: Option<f64>,
}

/// Calculate accuracy metrics for fitted vs actual values
pub fn fit_accuracy(fitted: &[f64], actual: &[f64]) -> Result<FitAccuracy> {
    if fitted.len() != actual.len() || fitted.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "Fitted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = fitted.len() as f64;
    let errors: Vec<f64> = fitted.iter().zip(actual).map(|(&f, &a)| a - f).collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n).sqrt();

    let percentage: Vec<f64> = actual
        .iter()
        .zip(&errors)
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &e)| e.abs() / a.abs() * 100.0)
        .collect();
    let mape = if percentage.is_empty() {
        None
    } else {
        Some(percentage.iter().sum::<f64>() / percentage.len() as f64)
    };

    Ok(FitAccuracy {
        mae,
        rmse,
        mape,
    })
}

/// Coefficient of determination, `None` when the observations are constant
pub fn r_squared(fitted: &[f64], actual: &[f64]) -> Option<f64> {
    if fitted.len() != actual.len() || actual.is_empty() {
        return None;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_total: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_total <= 0.0 {
        return None;
    }
    let ss_residual: f64 = fitted.iter().zip(actual).map(|(f, a)| (a - f).powi(2)).sum();
    Some(1.0 - ss_residual / ss_total)
}

impl std::fmt::Display for FitAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Fit Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        match self.mape {
            Some(mape) => writeln!(f, "  MAPE:  {:.4}%", mape)?,
            None => writeln!(f, "  MAPE:  n/a")?,
        }
        Ok(())
    }
}
