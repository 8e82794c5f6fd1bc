//! Theil–Sen depletion model with a bootstrap percentile interval

use crate::config::{FitMethod, ForecastConfig, SnapAdjustment};
use crate::confidence::DepletionInterval;
use crate::data::TimeAxis;
use crate::error::Result;
use crate::metrics::r_squared;
use crate::models::{
    depletion_offset, first_snap_index, is_flat, restored_levels, DepletionFit, DepletionModel,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stock_math::{median, percentile, theil_sen, theil_sen_slope, MathError};
use tracing::{debug, warn};

/// Bootstrap intervals need more usable resamples than this
pub const MIN_BOOTSTRAP_ESTIMATES: usize = 10;

/// A split fit needs this many samples on each side of the snap
const MIN_SIDE_SAMPLES: usize = 2;

/// Robust trend from the median of pairwise slopes.
///
/// The interval comes from refitting on seeded bootstrap resamples, so a
/// given configuration always produces the same bounds. Each refit is
/// quadratic in the sample count.
///
/// With a level shift the pre- and post-snap segments get their own
/// pairwise slopes, pooled by sample count, and the step is the difference
/// of the two segment intercepts.
#[derive(Debug, Clone)]
pub struct TheilSenModel {
    name: String,
    confidence_level: f64,
    samples: usize,
    seed: u64,
    snap_adjustment: SnapAdjustment,
}

/// Line with an optional step from `shift_offset` on
#[derive(Debug, Clone, Copy, PartialEq)]
struct RobustLine {
    intercept: f64,
    slope: f64,
    level_shift: f64,
    shift_offset: Option<f64>,
}

impl RobustLine {
    fn fit(offsets: &[f64], levels: &[f64], shift_offset: Option<f64>) -> Result<Self> {
        let Some(shift) = shift_offset else {
            let line = theil_sen(offsets, levels)?;
            return Ok(Self {
                intercept: line.intercept,
                slope: line.slope,
                level_shift: 0.0,
                shift_offset: None,
            });
        };

        let (pre, post): (Vec<(f64, f64)>, Vec<(f64, f64)>) = offsets
            .iter()
            .copied()
            .zip(levels.iter().copied())
            .partition(|&(t, _)| t < shift);
        if pre.len() < MIN_SIDE_SAMPLES || post.len() < MIN_SIDE_SAMPLES {
            return Err(MathError::InsufficientData(format!(
                "Level shift needs {} samples on each side, got {} and {}",
                MIN_SIDE_SAMPLES,
                pre.len(),
                post.len()
            ))
            .into());
        }
        let (t_pre, y_pre): (Vec<f64>, Vec<f64>) = pre.into_iter().unzip();
        let (t_post, y_post): (Vec<f64>, Vec<f64>) = post.into_iter().unzip();

        let (n_pre, n_post) = (t_pre.len() as f64, t_post.len() as f64);
        let slope = (theil_sen_slope(&t_pre, &y_pre)? * n_pre
            + theil_sen_slope(&t_post, &y_post)? * n_post)
            / (n_pre + n_post);

        let segment_intercept = |t: &[f64], y: &[f64]| {
            let residuals: Vec<f64> = t.iter().zip(y).map(|(t, y)| y - slope * t).collect();
            median(&residuals)
        };
        let intercept = segment_intercept(&t_pre, &y_pre)?;
        let level_shift = segment_intercept(&t_post, &y_post)? - intercept;

        Ok(Self {
            intercept,
            slope,
            level_shift,
            shift_offset,
        })
    }

    /// Level at the time-axis origin once the step applies
    fn origin_level(&self) -> f64 {
        self.intercept + self.level_shift
    }

    fn value_at(&self, t: f64) -> f64 {
        let shift = match self.shift_offset {
            Some(offset) if t >= offset => self.level_shift,
            _ => 0.0,
        };
        self.intercept + shift + self.slope * t
    }
}

/// Refits collected from bootstrap resamples
struct Resamples {
    /// Depletion offsets of the resamples with a falling trend
    t_stars: Vec<f64>,
    /// Slopes of every resample that could be fitted
    slopes: Vec<f64>,
}

impl TheilSenModel {
    /// Create a new model
    pub fn new(confidence_level: f64, samples: usize, seed: u64) -> Result<Self> {
        Self::from_config(
            &ForecastConfig::default()
                .with_method(FitMethod::TheilSen)
                .with_confidence_level(confidence_level)
                .with_bootstrap(samples, seed),
        )
    }

    /// Build the model from an engine configuration
    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: format!("Theil-Sen (bootstrap={})", config.bootstrap_samples),
            confidence_level: config.confidence_level,
            samples: config.bootstrap_samples,
            seed: config.bootstrap_seed,
            snap_adjustment: config.snap_adjustment,
        })
    }

    /// Index of the snap sample that starts the level shift, when both
    /// segments are long enough to fit
    fn shift_index(&self, axis: &TimeAxis) -> Option<usize> {
        if self.snap_adjustment != SnapAdjustment::LevelShift {
            return None;
        }

        let index = first_snap_index(axis)
            .filter(|&i| i >= MIN_SIDE_SAMPLES && axis.len() - i >= MIN_SIDE_SAMPLES);

        if index.is_none() {
            warn!(
                samples = axis.len(),
                "no usable snap event for a level shift, fitting without it"
            );
        }
        index
    }

    fn bootstrap(&self, offsets: &[f64], levels: &[f64], shift_offset: Option<f64>) -> Resamples {
        let n = offsets.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut resamples = Resamples {
            t_stars: Vec::with_capacity(self.samples),
            slopes: Vec::with_capacity(self.samples),
        };

        for _ in 0..self.samples {
            let (x, y): (Vec<f64>, Vec<f64>) = (0..n)
                .map(|_| {
                    let i = rng.gen_range(0..n);
                    (offsets[i], levels[i])
                })
                .unzip();

            // A resample may draw a single distinct offset, or too few
            // samples on one side of the snap
            let Ok(line) = RobustLine::fit(&x, &y, shift_offset) else {
                continue;
            };
            resamples.slopes.push(line.slope);

            if line.slope < 0.0 {
                let t_star = -line.origin_level() / line.slope;
                if t_star.is_finite() {
                    resamples.t_stars.push(t_star);
                }
            }
        }

        resamples
    }

    /// Percentile interval around `t_star`, plus the bootstrap spread of
    /// the slope.
    ///
    /// The interval is invalid unless the slope percentile interval lies
    /// entirely below zero.
    fn interval(
        &self,
        t_star: f64,
        offsets: &[f64],
        levels: &[f64],
        shift_offset: Option<f64>,
    ) -> Result<(DepletionInterval, Option<f64>)> {
        let Resamples { t_stars, slopes } = self.bootstrap(offsets, levels, shift_offset);
        debug!(
            requested = self.samples,
            fitted = slopes.len(),
            depleting = t_stars.len(),
            "theil-sen bootstrap"
        );

        if t_stars.len() <= MIN_BOOTSTRAP_ESTIMATES {
            return Ok((DepletionInterval::invalid(Some(t_star)), None));
        }

        let tail = (1.0 - self.confidence_level) / 2.0 * 100.0;
        let slope_std_err = Some(std_dev(&slopes));
        if percentile(&slopes, 100.0 - tail)? >= 0.0 {
            return Ok((DepletionInterval::invalid(Some(t_star)), slope_std_err));
        }

        let lower = percentile(&t_stars, tail)?;
        let upper = percentile(&t_stars, 100.0 - tail)?;

        Ok((
            DepletionInterval {
                ok: true,
                t_star: Some(t_star),
                lower: Some(lower),
                upper: Some(upper),
                std_err: Some(std_dev(&t_stars)),
            },
            slope_std_err,
        ))
    }
}

impl DepletionModel for TheilSenModel {
    fn fit(&self, axis: &TimeAxis) -> Result<DepletionFit> {
        let n = axis.len();
        if n < 2 {
            return Err(MathError::InsufficientData(
                "Theil-Sen needs at least 2 samples".to_string(),
            )
            .into());
        }

        let levels = match self.snap_adjustment {
            SnapAdjustment::Restore => restored_levels(axis),
            _ => axis.levels.clone(),
        };
        let shift_offset = self.shift_index(axis).map(|s| axis.offsets[s]);
        let parameters = if shift_offset.is_some() { 3 } else { 2 };

        let line = RobustLine::fit(&axis.offsets, &levels, shift_offset)?;
        let fitted: Vec<f64> = axis.offsets.iter().map(|&t| line.value_at(t)).collect();
        let dof = n.saturating_sub(parameters);
        let sigma2 = (dof > 0).then(|| {
            fitted
                .iter()
                .zip(&levels)
                .map(|(f, y)| (y - f).powi(2))
                .sum::<f64>()
                / dof as f64
        });

        let span = axis.last_offset() - axis.offsets[0];
        let flat = is_flat(line.slope, span, &levels);
        let t_star = depletion_offset(line.origin_level(), line.slope, flat, fitted[n - 1], &levels);

        let (interval, slope_std_err) = match t_star {
            Some(t) if !flat && dof >= 1 => {
                self.interval(t, &axis.offsets, &levels, shift_offset)?
            }
            _ => (DepletionInterval::invalid(t_star), None),
        };

        debug!(
            intercept = line.intercept,
            slope = line.slope,
            level_shift = line.level_shift,
            dof,
            ?t_star,
            ci_ok = interval.ok,
            "theil-sen fit"
        );

        Ok(DepletionFit {
            method: FitMethod::TheilSen,
            intercept: line.intercept,
            slope: line.slope,
            level_shift: line.level_shift,
            shift_offset,
            t_star,
            interval,
            sigma2,
            slope_std_err,
            r_squared: r_squared(&fitted, &levels),
            dof,
            flat,
            levels,
            fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn axis(levels: &[f64]) -> TimeAxis {
        axis_with_snap(levels, None)
    }

    fn axis_with_snap(levels: &[f64], snap: Option<usize>) -> TimeAxis {
        TimeAxis {
            t_0: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            offsets: (0..levels.len()).map(|i| i as f64 * 10.0).collect(),
            levels: levels.to_vec(),
            snaps: (0..levels.len()).map(|i| Some(i) == snap).collect(),
        }
    }

    fn level_shift_model() -> TheilSenModel {
        TheilSenModel::from_config(
            &ForecastConfig::default()
                .with_method(FitMethod::TheilSen)
                .with_snap_adjustment(SnapAdjustment::LevelShift),
        )
        .unwrap()
    }

    #[test]
    fn test_outlier_does_not_move_the_line() {
        let mut levels: Vec<f64> = (0..20).map(|i| 100.0 - 2.0 * i as f64).collect();
        levels[7] = 500.0;
        let model = TheilSenModel::new(0.95, 200, 7).unwrap();

        let fit = model.fit(&axis(&levels)).unwrap();

        assert!((fit.slope + 0.2).abs() < 1e-9);
        assert!((fit.intercept - 100.0).abs() < 1e-9);
        assert!((fit.t_star.unwrap() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_bootstrap_is_reproducible() {
        let levels = [50.0, 47.0, 45.5, 41.0, 40.0, 36.5, 33.0, 31.0, 28.5, 25.0, 24.0, 20.0];
        let model = TheilSenModel::new(0.9, 300, 42).unwrap();

        let first = model.fit(&axis(&levels)).unwrap();
        let second = model.fit(&axis(&levels)).unwrap();

        assert!(first.interval.ok);
        assert_eq!(first.interval, second.interval);
        let (lo, hi) = (first.interval.lower.unwrap(), first.interval.upper.unwrap());
        assert!(lo <= hi);
    }

    #[test]
    fn test_too_few_resamples_is_invalid() {
        let model = TheilSenModel::new(0.95, 5, 1).unwrap();
        let fit = model.fit(&axis(&[10.0, 8.0, 6.0, 4.0])).unwrap();

        assert!(fit.t_star.is_some());
        assert!(!fit.interval.ok);
    }

    #[test]
    fn test_two_samples_have_no_interval() {
        let model = TheilSenModel::new(0.95, 500, 42).unwrap();
        let fit = model.fit(&axis(&[10.0, 8.0])).unwrap();

        assert_eq!(fit.dof, 0);
        assert!((fit.t_star.unwrap() - 50.0).abs() < 1e-9);
        assert!(!fit.interval.ok);
        assert_eq!(fit.interval.lower, None);
    }

    #[test]
    fn test_noise_has_no_interval() {
        let levels = [50.0, 53.0, 47.0, 52.0, 46.0, 51.0, 48.0, 50.5, 47.5, 49.0, 49.5, 48.0];
        let model = TheilSenModel::new(0.95, 500, 42).unwrap();

        let fit = model.fit(&axis(&levels)).unwrap();

        assert!(!fit.interval.ok);
        assert_eq!(fit.interval.lower, None);
        assert_eq!(fit.interval.upper, None);
    }

    #[test]
    fn test_rising_stock_never_depletes() {
        let model = TheilSenModel::new(0.95, 50, 1).unwrap();
        let fit = model.fit(&axis(&[1.0, 2.0, 3.0, 4.0])).unwrap();

        assert_eq!(fit.t_star, None);
        assert!(!fit.interval.ok);
    }

    #[test]
    fn test_level_shift_recovers_step() {
        // One unit per sample, dropping by 30 at sample 5
        let levels: Vec<f64> = (0..10)
            .map(|i| 100.0 - i as f64 - if i >= 5 { 30.0 } else { 0.0 })
            .collect();

        let fit = level_shift_model().fit(&axis_with_snap(&levels, Some(5))).unwrap();

        assert_eq!(fit.shift_offset, Some(50.0));
        assert!((fit.level_shift + 30.0).abs() < 1e-9);
        assert!((fit.slope + 0.1).abs() < 1e-12);
        // 70 - t/10 = 0 at t = 700 minutes
        assert!((fit.t_star.unwrap() - 700.0).abs() < 1e-6);
        assert!((fit.value_at(40.0) - 96.0).abs() < 1e-9);
        assert!((fit.value_at(50.0) - 65.0).abs() < 1e-9);
        assert_eq!(fit.dof, 7);
        assert!(fit.interval.ok);
        assert!((fit.interval.lower.unwrap() - 700.0).abs() < 1e-6);
        assert!((fit.interval.upper.unwrap() - 700.0).abs() < 1e-6);
    }

    #[test]
    fn test_level_shift_needs_two_samples_each_side() {
        let levels = [10.0, 4.0, 3.0, 2.0, 1.0];

        let fit = level_shift_model().fit(&axis_with_snap(&levels, Some(1))).unwrap();

        assert_eq!(fit.shift_offset, None);
        assert_eq!(fit.level_shift, 0.0);
        assert_eq!(fit.dof, 3);
    }
}
