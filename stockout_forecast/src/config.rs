//! Engine configuration
//!
//! Every field has a default, so a JSON document only needs to name the
//! settings it changes:
//!
//! ```json
//! { "confidence_level": 0.9, "method": "theil_sen" }
//! ```

use crate::error::{ForecastError, Result};
use crate::utils::MINUTES_PER_DAY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How the trend is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// Weighted ridge least squares with a delta-method interval
    #[default]
    LeastSquares,
    /// Median of pairwise slopes with a bootstrap percentile interval
    TheilSen,
}

/// Observation weights for least squares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    Uniform,
    /// `1 / (i + 1)` by sample index, restarting at a snap level shift
    Harmonic,
}

/// Treatment of samples flagged as snap events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapAdjustment {
    /// Fit snap samples like any other
    #[default]
    Ignore,
    /// Add a step regressor from the first snap sample onwards
    LevelShift,
    /// Undo the halving by doubling snap sample levels before fitting
    Restore,
}

/// Forecast engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Two-sided confidence level for the depletion interval
    pub confidence_level: f64,
    pub method: FitMethod,
    pub weighting: Weighting,
    /// Ridge penalty on the slope (least squares only)
    pub ridge_lambda: f64,
    pub snap_adjustment: SnapAdjustment,
    /// Number of evaluated points on the returned trend line
    pub line_points: usize,
    /// How far past the data the line extends when no depletion is projected
    pub lookahead_minutes: f64,
    /// Upper bound on how far past the data the line may extend
    pub max_horizon_minutes: f64,
    /// Bootstrap resamples (Theil–Sen only)
    pub bootstrap_samples: usize,
    /// Bootstrap RNG seed (Theil–Sen only)
    pub bootstrap_seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            method: FitMethod::LeastSquares,
            weighting: Weighting::Uniform,
            ridge_lambda: 0.0,
            snap_adjustment: SnapAdjustment::Ignore,
            line_points: 50,
            lookahead_minutes: 7.0 * MINUTES_PER_DAY,
            max_horizon_minutes: 365.0 * MINUTES_PER_DAY,
            bootstrap_samples: 500,
            bootstrap_seed: 42,
        }
    }
}

impl ForecastConfig {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        validate_confidence_level(self.confidence_level)?;

        if self.line_points < 2 {
            return Err(ForecastError::InvalidParameter(
                "line_points must be at least 2".to_string(),
            ));
        }
        if !self.lookahead_minutes.is_finite() || self.lookahead_minutes <= 0.0 {
            return Err(ForecastError::InvalidParameter(
                "lookahead_minutes must be positive".to_string(),
            ));
        }
        if !self.max_horizon_minutes.is_finite()
            || self.max_horizon_minutes < self.lookahead_minutes
        {
            return Err(ForecastError::InvalidParameter(
                "max_horizon_minutes must be finite and at least lookahead_minutes".to_string(),
            ));
        }
        if !self.ridge_lambda.is_finite() || self.ridge_lambda < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "ridge_lambda must be finite and non-negative".to_string(),
            ));
        }
        if self.bootstrap_samples == 0 {
            return Err(ForecastError::InvalidParameter(
                "bootstrap_samples must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn with_method(mut self, method: FitMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_ridge_lambda(mut self, ridge_lambda: f64) -> Self {
        self.ridge_lambda = ridge_lambda;
        self
    }

    pub fn with_snap_adjustment(mut self, snap_adjustment: SnapAdjustment) -> Self {
        self.snap_adjustment = snap_adjustment;
        self
    }

    pub fn with_line_points(mut self, line_points: usize) -> Self {
        self.line_points = line_points;
        self
    }

    pub fn with_lookahead_minutes(mut self, lookahead_minutes: f64) -> Self {
        self.lookahead_minutes = lookahead_minutes;
        self
    }

    pub fn with_bootstrap(mut self, samples: usize, seed: u64) -> Self {
        self.bootstrap_samples = samples;
        self.bootstrap_seed = seed;
        self
    }
}

/// Confidence levels must lie strictly between 0 and 1
pub fn validate_confidence_level(confidence_level: f64) -> Result<()> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Confidence level must be between 0 and 1, got {}",
            confidence_level
        )));
    }
    Ok(())
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMethod::LeastSquares => write!(f, "least_squares"),
            FitMethod::TheilSen => write!(f, "theil_sen"),
        }
    }
}

impl FromStr for FitMethod {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "least_squares" | "ols" => Ok(FitMethod::LeastSquares),
            "theil_sen" | "robust" => Ok(FitMethod::TheilSen),
            _ => Err(ForecastError::InvalidParameter(format!(
                "Unsupported fit method: {}",
                s
            ))),
        }
    }
}

impl FromStr for SnapAdjustment {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ignore" => Ok(SnapAdjustment::Ignore),
            "level_shift" => Ok(SnapAdjustment::LevelShift),
            "restore" => Ok(SnapAdjustment::Restore),
            _ => Err(ForecastError::InvalidParameter(format!(
                "Unsupported snap adjustment: {}",
                s
            ))),
        }
    }
}
