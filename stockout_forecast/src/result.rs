//! Serializable forecast output

use crate::config::FitMethod;
use crate::confidence::DepletionInterval;
use crate::error::Result;
use crate::metrics::FitAccuracy;
use crate::models::DepletionFit;
use crate::utils::{linspace, offset_to_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a forecast run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    /// A depletion was projected
    Ok,
    /// Fewer than two distinct samples
    InsufficientData,
    /// The trend is flat or the fit could not be solved
    DegenerateFit,
    /// The trend is rising
    NoDepletion,
}

/// Fitted trend evaluated over the history and projection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl TrendLine {
    /// Evaluate `fit` at `points` evenly spaced offsets from 0 to `end`,
    /// clamping projected stock at zero
    pub fn evaluate(t_0: DateTime<Utc>, fit: &DepletionFit, end: f64, points: usize) -> Self {
        let mut line = Self::default();
        for offset in linspace(0.0, end, points) {
            if let Some(ts) = offset_to_timestamp(t_0, offset) {
                line.timestamps.push(ts);
                line.values.push(fit.value_at(offset).max(0.0));
            }
        }
        line
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Depletion interval as minute offsets from `t_0`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    #[serde(rename = "OK")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_lo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_hi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_star: Option<f64>,
}

impl From<&DepletionInterval> for ConfidenceInterval {
    fn from(interval: &DepletionInterval) -> Self {
        // Bounds are only reported for a valid interval
        let (ci_lo, ci_hi) = if interval.ok {
            (interval.lower, interval.upper)
        } else {
            (None, None)
        };
        Self {
            ok: interval.ok,
            ci_lo,
            ci_hi,
            t_star: interval.t_star,
        }
    }
}

/// Fit statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub t_star: Option<f64>,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub level_shift: Option<f64>,
    pub sigma2: Option<f64>,
    pub slope_std_err: Option<f64>,
    pub t_star_std: Option<f64>,
    pub r_squared: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    /// Mean absolute percentage error over non-zero levels
    pub mape: Option<f64>,
    /// Distinct samples the fit used
    pub n_obs: usize,
    /// Samples dropped by the end date
    pub excluded: usize,
    pub dof: usize,
    pub confidence_level: f64,
    pub method: FitMethod,
}

impl FitSummary {
    fn empty(n_obs: usize, excluded: usize, confidence_level: f64, method: FitMethod) -> Self {
        Self {
            t_star: None,
            slope: None,
            intercept: None,
            level_shift: None,
            sigma2: None,
            slope_std_err: None,
            t_star_std: None,
            r_squared: None,
            rmse: None,
            mae: None,
            mape: None,
            n_obs,
            excluded,
            dof: 0,
            confidence_level,
            method,
        }
    }
}

/// Complete forecast for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub status: ForecastStatus,
    pub line: TrendLine,
    pub ci: ConfidenceInterval,
    pub result: FitSummary,
    pub t_0: Option<DateTime<Utc>>,
    pub t_star_ts: Option<DateTime<Utc>>,
    pub ci_lo_ts: Option<DateTime<Utc>>,
    pub ci_hi_ts: Option<DateTime<Utc>>,
}

impl ForecastResult {
    /// Result for a series too short to fit
    pub fn insufficient_data(
        n_obs: usize,
        excluded: usize,
        t_0: Option<DateTime<Utc>>,
        confidence_level: f64,
        method: FitMethod,
    ) -> Self {
        Self::without_fit(ForecastStatus::InsufficientData, n_obs, excluded, t_0, confidence_level, method)
    }

    /// Result for a fit that could not be solved
    pub fn degenerate(
        n_obs: usize,
        excluded: usize,
        t_0: Option<DateTime<Utc>>,
        confidence_level: f64,
        method: FitMethod,
    ) -> Self {
        Self::without_fit(ForecastStatus::DegenerateFit, n_obs, excluded, t_0, confidence_level, method)
    }

    fn without_fit(
        status: ForecastStatus,
        n_obs: usize,
        excluded: usize,
        t_0: Option<DateTime<Utc>>,
        confidence_level: f64,
        method: FitMethod,
    ) -> Self {
        Self {
            status,
            line: TrendLine::default(),
            ci: ConfidenceInterval::default(),
            result: FitSummary::empty(n_obs, excluded, confidence_level, method),
            t_0,
            t_star_ts: None,
            ci_lo_ts: None,
            ci_hi_ts: None,
        }
    }

    /// Assemble the result of a successful fit
    pub(crate) fn from_fit(
        t_0: DateTime<Utc>,
        fit: &DepletionFit,
        accuracy: &FitAccuracy,
        line: TrendLine,
        excluded: usize,
        confidence_level: f64,
    ) -> Self {
        let status = if fit.t_star.is_some() {
            ForecastStatus::Ok
        } else if fit.flat {
            ForecastStatus::DegenerateFit
        } else {
            ForecastStatus::NoDepletion
        };
        let ci = ConfidenceInterval::from(&fit.interval);
        let to_ts = |offset: Option<f64>| offset.and_then(|m| offset_to_timestamp(t_0, m));

        Self {
            status,
            line,
            t_star_ts: to_ts(fit.t_star),
            ci_lo_ts: to_ts(ci.ci_lo),
            ci_hi_ts: to_ts(ci.ci_hi),
            ci,
            result: FitSummary {
                t_star: fit.t_star,
                slope: Some(fit.slope),
                intercept: Some(fit.intercept),
                level_shift: Some(fit.level_shift),
                sigma2: fit.sigma2,
                slope_std_err: fit.slope_std_err,
                t_star_std: fit.interval.std_err,
                r_squared: fit.r_squared,
                rmse: Some(accuracy.rmse),
                mae: Some(accuracy.mae),
                mape: accuracy.mape,
                n_obs: fit.fitted.len(),
                excluded,
                dof: fit.dof,
                confidence_level,
                method: fit.method,
            },
            t_0: Some(t_0),
        }
    }

    /// Projected depletion offset in minutes
    pub fn t_star(&self) -> Option<f64> {
        self.result.t_star
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
