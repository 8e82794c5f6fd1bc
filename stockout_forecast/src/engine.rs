//! The depletion forecast engine
//!
//! [`ForecastEngine`] turns one resource's stock history into a
//! [`ForecastResult`]: it prepares the observation window, fits the
//! configured model, chooses the projection horizon and evaluates the
//! trend line. It holds only immutable configuration, so a single engine
//! can serve any number of concurrent callers.

use crate::config::{validate_confidence_level, FitMethod, ForecastConfig};
use crate::data::{Observation, SeriesWindow, TimeAxis};
use crate::error::{ForecastError, Result};
use crate::metrics::fit_accuracy;
use crate::models::{DepletionFit, DepletionModel, LeastSquaresModel, TheilSenModel};
use crate::result::{ForecastResult, TrendLine};
use crate::utils::minutes_between;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stock_math::MathError;
use tracing::{debug, instrument, warn};

/// A forecast request for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Caller's identifier for the resource, only used for tracing
    #[serde(default)]
    pub resource_id: Option<String>,
    pub observations: Vec<Observation>,
    /// Only observations at or before this instant are fitted
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Overrides the engine's confidence level
    #[serde(default)]
    pub confidence_level: Option<f64>,
}

impl ForecastRequest {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            resource_id: None,
            observations,
            end_date: None,
            confidence_level: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = Some(confidence_level);
        self
    }
}

/// Stateless depletion forecaster
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    /// Create an engine, rejecting an unusable configuration
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast depletion at the configured confidence level
    pub fn forecast(
        &self,
        observations: &[Observation],
        end_date: Option<DateTime<Utc>>,
    ) -> Result<ForecastResult> {
        self.evaluate(observations, end_date, self.config.confidence_level)
    }

    /// Forecast depletion for a request
    #[instrument(
        level = "info",
        skip(self, request),
        fields(resource = request.resource_id.as_deref().unwrap_or("-"))
    )]
    pub fn run(&self, request: ForecastRequest) -> Result<ForecastResult> {
        let confidence_level = request
            .confidence_level
            .unwrap_or(self.config.confidence_level);
        self.evaluate(&request.observations, request.end_date, confidence_level)
    }

    #[instrument(level = "debug", skip(self, observations), fields(observations = observations.len()))]
    fn evaluate(
        &self,
        observations: &[Observation],
        end_date: Option<DateTime<Utc>>,
        confidence_level: f64,
    ) -> Result<ForecastResult> {
        validate_confidence_level(confidence_level)?;

        let window = SeriesWindow::prepare(observations, end_date).map_err(|e| {
            warn!(error = %e, "rejected observation series");
            e
        })?;
        let method = self.config.method;

        let axis = match window.time_axis() {
            Some(axis) if axis.len() >= 2 => axis,
            _ => {
                debug!(samples = window.len(), "not enough samples to fit");
                return Ok(ForecastResult::insufficient_data(
                    window.len(),
                    window.excluded(),
                    window.t_0(),
                    confidence_level,
                    method,
                ));
            }
        };

        let model = self.model(confidence_level)?;
        let fit = match model.fit(&axis) {
            Ok(fit) => fit,
            Err(ForecastError::Math(MathError::SingularMatrix)) => {
                warn!(model = model.name(), "singular design, no trend fitted");
                return Ok(ForecastResult::degenerate(
                    window.len(),
                    window.excluded(),
                    Some(axis.t_0),
                    confidence_level,
                    method,
                ));
            }
            Err(e) => return Err(e),
        };

        let accuracy = fit_accuracy(&fit.fitted, &fit.levels)?;
        let end = self.horizon_end(&window, &axis, &fit);
        let line = TrendLine::evaluate(axis.t_0, &fit, end, self.config.line_points);

        let result = ForecastResult::from_fit(
            axis.t_0,
            &fit,
            &accuracy,
            line,
            window.excluded(),
            confidence_level,
        );
        debug!(
            status = ?result.status,
            t_star = ?result.t_star(),
            ci_ok = result.ci.ok,
            horizon = end,
            "forecast complete"
        );
        Ok(result)
    }

    fn model(&self, confidence_level: f64) -> Result<Box<dyn DepletionModel>> {
        let config = self.config.clone().with_confidence_level(confidence_level);
        Ok(match config.method {
            FitMethod::LeastSquares => Box::new(LeastSquaresModel::from_config(&config)?),
            FitMethod::TheilSen => Box::new(TheilSenModel::from_config(&config)?),
        })
    }

    /// Last minute offset covered by the trend line.
    ///
    /// The line covers every supplied sample and reaches the projected
    /// depletion (and the upper bound of a valid interval). Without a
    /// depletion it looks ahead a fixed window. It never extends more than
    /// `max_horizon_minutes` past the data.
    fn horizon_end(&self, window: &SeriesWindow, axis: &TimeAxis, fit: &DepletionFit) -> f64 {
        let last_supplied = window
            .latest_supplied()
            .map_or(0.0, |ts| minutes_between(axis.t_0, ts));
        let base = axis.last_offset().max(last_supplied);

        let end = match fit.t_star {
            Some(t_star) => {
                let upper = if fit.interval.ok { fit.interval.upper } else { None };
                upper.map_or(t_star, |hi| hi.max(t_star)).max(base)
            }
            None => base + self.config.lookahead_minutes,
        };

        end.min(base + self.config.max_horizon_minutes)
    }
}

/// Forecast with the default configuration
pub fn forecast_depletion(
    observations: &[Observation],
    end_date: Option<DateTime<Utc>>,
) -> Result<ForecastResult> {
    ForecastEngine::default().forecast(observations, end_date)
}
