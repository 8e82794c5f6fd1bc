use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use stockout_forecast::{
    FitMethod, ForecastConfig, ForecastEngine, ForecastError, ForecastRequest, ForecastStatus,
    Observation, SnapAdjustment, Weighting,
};

const MINUTES_PER_DAY: f64 = 1440.0;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn daily_series(levels: &[f64]) -> Vec<Observation> {
    levels
        .iter()
        .enumerate()
        .map(|(i, &level)| Observation::new(start() + Duration::days(i as i64), level))
        .collect()
}

fn linear_decline() -> Vec<Observation> {
    daily_series(&(0..=10).map(|t| 100.0 - 2.0 * t as f64).collect::<Vec<_>>())
}

fn noisy_decline() -> Vec<Observation> {
    daily_series(&[
        100.0, 97.5, 96.8, 93.1, 92.0, 89.4, 88.6, 85.2, 84.1, 81.7, 80.3, 77.9,
    ])
}

#[test]
fn test_linear_decline_collapses_interval() {
    let result = ForecastEngine::default()
        .forecast(&linear_decline(), None)
        .unwrap();

    assert_eq!(result.status, ForecastStatus::Ok);
    let t_star = result.t_star().unwrap();
    assert_relative_eq!(t_star, 50.0 * MINUTES_PER_DAY, max_relative = 1e-9);

    assert!(result.ci.ok);
    let (lo, hi) = (result.ci.ci_lo.unwrap(), result.ci.ci_hi.unwrap());
    assert_relative_eq!(lo, t_star, max_relative = 1e-9);
    assert_relative_eq!(hi, t_star, max_relative = 1e-9);

    assert_eq!(result.t_0, Some(start()));
    assert_eq!(result.t_star_ts, Some(start() + Duration::days(50)));
    assert_eq!(result.ci_lo_ts, result.t_star_ts);
    assert_eq!(result.result.n_obs, 11);
    assert_eq!(result.result.dof, 9);
}

#[test]
fn test_constant_series_is_degenerate() {
    let result = ForecastEngine::default()
        .forecast(&daily_series(&[50.0; 8]), None)
        .unwrap();

    assert_eq!(result.status, ForecastStatus::DegenerateFit);
    assert_eq!(result.t_star(), None);
    assert!(!result.ci.ok);
    assert_eq!(result.ci.ci_lo, None);
    assert_relative_eq!(result.result.slope.unwrap(), 0.0, epsilon = 1e-12);
    assert!(!result.line.is_empty());
}

#[test]
fn test_empty_stock_is_already_depleted() {
    let result = ForecastEngine::default()
        .forecast(&daily_series(&[0.0; 4]), None)
        .unwrap();

    assert_eq!(result.t_star(), Some(0.0));
    assert_eq!(result.t_star_ts, Some(start()));
    assert!(!result.ci.ok);
}

#[rstest]
#[case::empty(vec![])]
#[case::single(daily_series(&[42.0]))]
#[case::duplicate_timestamp(vec![
    Observation::new(start(), 10.0),
    Observation::new(start(), 12.0),
])]
fn test_insufficient_data(#[case] observations: Vec<Observation>) {
    let result = ForecastEngine::default().forecast(&observations, None).unwrap();

    assert_eq!(result.status, ForecastStatus::InsufficientData);
    assert!(result.line.is_empty());
    assert!(!result.ci.ok);
    assert_eq!(result.t_star(), None);
    assert_eq!(result.t_star_ts, None);
}

#[rstest]
#[case::least_squares(FitMethod::LeastSquares)]
#[case::theil_sen(FitMethod::TheilSen)]
fn test_two_points_have_no_interval(#[case] method: FitMethod) {
    let result = ForecastEngine::new(ForecastConfig::default().with_method(method))
        .unwrap()
        .forecast(&daily_series(&[10.0, 8.0]), None)
        .unwrap();

    assert_eq!(result.result.dof, 0);
    assert_relative_eq!(result.t_star().unwrap(), 5.0 * MINUTES_PER_DAY, max_relative = 1e-9);
    assert!(!result.ci.ok);
    assert_eq!(result.ci.ci_hi, None);
    assert_eq!(result.ci_lo_ts, None);
}

#[rstest]
#[case::least_squares(FitMethod::LeastSquares)]
#[case::theil_sen(FitMethod::TheilSen)]
fn test_noise_without_trend_has_no_interval(#[case] method: FitMethod) {
    let levels = [50.0, 53.0, 47.0, 52.0, 46.0, 51.0, 48.0, 50.5, 47.5, 49.0, 49.5, 48.0];
    let result = ForecastEngine::new(ForecastConfig::default().with_method(method))
        .unwrap()
        .forecast(&daily_series(&levels), None)
        .unwrap();

    assert!(!result.ci.ok);
    assert_eq!(result.ci.ci_lo, None);
    assert_eq!(result.ci.ci_hi, None);
    assert_eq!(result.ci_hi_ts, None);
}

#[rstest]
#[case::least_squares(FitMethod::LeastSquares)]
#[case::theil_sen(FitMethod::TheilSen)]
fn test_identical_input_gives_identical_output(#[case] method: FitMethod) {
    let engine = ForecastEngine::new(ForecastConfig::default().with_method(method)).unwrap();

    let first = engine.forecast(&noisy_decline(), None).unwrap();
    let second = engine.forecast(&noisy_decline(), None).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[rstest]
#[case(1.0, 2.0)]
#[case(0.5, 0.6)]
#[case(3.0, 3.0)]
fn test_steeper_decline_depletes_sooner(#[case] gentle: f64, #[case] steep: f64) {
    let engine = ForecastEngine::default();
    let series = |rate: f64| daily_series(&(0..8).map(|t| 60.0 - rate * t as f64).collect::<Vec<_>>());

    let gentle = engine.forecast(&series(gentle), None).unwrap();
    let steep = engine.forecast(&series(steep), None).unwrap();

    assert!(steep.t_star().unwrap() <= gentle.t_star().unwrap());
}

#[test]
fn test_trend_line_is_clamped() {
    let engine = ForecastEngine::new(
        ForecastConfig::default().with_method(FitMethod::TheilSen),
    )
    .unwrap();
    let result = engine
        .forecast(&daily_series(&[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]), None)
        .unwrap();

    assert!(result.line.values.iter().all(|&v| v >= 0.0));
    assert_eq!(result.line.len(), 50);
    assert_eq!(result.line.timestamps[0], start());
}

#[test]
fn test_end_date_excludes_later_samples() {
    let mut observations = linear_decline();
    // A restock after the cutoff must not affect the fit
    observations.push(Observation::new(start() + Duration::days(11), 500.0));
    let end_date = start() + Duration::days(10);

    let result = ForecastEngine::default()
        .forecast(&observations, Some(end_date))
        .unwrap();

    assert_eq!(result.result.n_obs, 11);
    assert_eq!(result.result.excluded, 1);
    assert_eq!(result.t_star_ts, Some(start() + Duration::days(50)));
}

#[test]
fn test_unsorted_input_matches_sorted() {
    let mut shuffled = noisy_decline();
    shuffled.reverse();
    shuffled.swap(2, 7);

    let engine = ForecastEngine::default();
    assert_eq!(
        engine.forecast(&shuffled, None).unwrap(),
        engine.forecast(&noisy_decline(), None).unwrap()
    );
}

#[test]
fn test_duplicate_timestamps_are_averaged() {
    let mut observations = daily_series(&[20.0, 18.0, 16.0]);
    observations.push(Observation::new(start() + Duration::days(1), 14.0));

    let result = ForecastEngine::default().forecast(&observations, None).unwrap();

    // Samples become 20, 16, 16
    assert_eq!(result.result.n_obs, 3);
    assert_relative_eq!(
        result.result.slope.unwrap(),
        -2.0 / MINUTES_PER_DAY,
        max_relative = 1e-9
    );
}

#[rstest]
#[case::negative(-1.0)]
#[case::nan(f64::NAN)]
#[case::infinite(f64::INFINITY)]
fn test_malformed_stock_is_rejected(#[case] level: f64) {
    let mut observations = linear_decline();
    observations[3].stock_level = level;

    let err = ForecastEngine::default()
        .forecast(&observations, None)
        .unwrap_err();

    assert!(matches!(err, ForecastError::InvalidInput(_)));
}

#[test]
fn test_rising_stock_looks_ahead() {
    let result = ForecastEngine::default()
        .forecast(&daily_series(&[10.0, 12.0, 13.5, 16.0]), None)
        .unwrap();

    assert_eq!(result.status, ForecastStatus::NoDepletion);
    assert_eq!(result.t_star(), None);
    assert_eq!(
        *result.line.timestamps.last().unwrap(),
        start() + Duration::days(3 + 7)
    );
}

#[test]
fn test_theil_sen_ignores_outlier() {
    let mut levels: Vec<f64> = (0..15).map(|t| 90.0 - 3.0 * t as f64).collect();
    levels[4] = 400.0;
    let engine =
        ForecastEngine::new(ForecastConfig::default().with_method(FitMethod::TheilSen)).unwrap();

    let result = engine.forecast(&daily_series(&levels), None).unwrap();

    assert_eq!(result.result.method, FitMethod::TheilSen);
    assert_eq!(result.t_star_ts, Some(start() + Duration::days(30)));
}

#[rstest]
#[case::least_squares(FitMethod::LeastSquares)]
#[case::theil_sen(FitMethod::TheilSen)]
fn test_level_shift_recovers_depletion(#[case] method: FitMethod) {
    // Stock halves on day 5 and keeps falling two units a day
    let levels: Vec<f64> = (0..10)
        .map(|t| if t < 5 { 80.0 - 2.0 * t as f64 } else { 40.0 - 2.0 * t as f64 })
        .collect();
    let mut observations = daily_series(&levels);
    observations[5].snap_event = true;

    let engine = ForecastEngine::new(
        ForecastConfig::default()
            .with_method(method)
            .with_snap_adjustment(SnapAdjustment::LevelShift),
    )
    .unwrap();
    let result = engine.forecast(&observations, None).unwrap();

    assert_relative_eq!(result.result.level_shift.unwrap(), -40.0, epsilon = 1e-6);
    assert_eq!(result.t_star_ts, Some(start() + Duration::days(20)));
    assert!(result.ci.ok);
}

#[test]
fn test_harmonic_weighting_favours_early_samples() {
    let levels = [100.0, 98.0, 96.0, 94.0, 80.0, 60.0];
    let uniform = ForecastEngine::default()
        .forecast(&daily_series(&levels), None)
        .unwrap();
    let harmonic = ForecastEngine::new(ForecastConfig::default().with_weighting(Weighting::Harmonic))
        .unwrap()
        .forecast(&daily_series(&levels), None)
        .unwrap();

    assert!(harmonic.result.slope.unwrap() > uniform.result.slope.unwrap());
}

#[test]
fn test_ridge_shrinks_slope() {
    let plain = ForecastEngine::default()
        .forecast(&noisy_decline(), None)
        .unwrap();
    let ridged = ForecastEngine::new(ForecastConfig::default().with_ridge_lambda(1e6))
        .unwrap()
        .forecast(&noisy_decline(), None)
        .unwrap();

    assert!(ridged.result.slope.unwrap().abs() < plain.result.slope.unwrap().abs());
}

#[test]
fn test_request_overrides_confidence() {
    let engine = ForecastEngine::default();
    let narrow = engine
        .run(ForecastRequest::new(noisy_decline()).with_confidence_level(0.5))
        .unwrap();
    let wide = engine
        .run(ForecastRequest::new(noisy_decline()).with_confidence_level(0.99))
        .unwrap();

    assert_relative_eq!(narrow.result.confidence_level, 0.5);
    let width = |r: &stockout_forecast::ForecastResult| r.ci.ci_hi.unwrap() - r.ci.ci_lo.unwrap();
    assert!(width(&narrow) < width(&wide));
}

#[test]
fn test_json_field_names() {
    let result = ForecastEngine::default()
        .forecast(&linear_decline(), None)
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

    assert_eq!(value["status"], "ok");
    assert_eq!(value["ci"]["OK"], true);
    assert!(value["ci"]["ci_lo"].is_number());
    assert!(value["ci"]["ci_hi"].is_number());
    assert!(value["ci"]["t_star"].is_number());
    assert!(value["line"]["timestamps"].is_array());
    assert!(value["line"]["values"].is_array());
    assert_eq!(value["result"]["method"], "least_squares");
    assert_relative_eq!(value["result"]["mape"].as_f64().unwrap(), 0.0, epsilon = 1e-9);
    assert_eq!(value["t_0"], "2026-03-01T00:00:00Z");
    assert_eq!(value["t_star_ts"], "2026-04-20T00:00:00Z");
}
