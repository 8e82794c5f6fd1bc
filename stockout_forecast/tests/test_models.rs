use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use rstest::rstest;
use stockout_forecast::data::TimeAxis;
use stockout_forecast::models::{DepletionModel, LeastSquaresModel, TheilSenModel};

fn hourly_axis(levels: &[f64]) -> TimeAxis {
    TimeAxis {
        t_0: Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
        offsets: (0..levels.len()).map(|i| i as f64 * 60.0).collect(),
        levels: levels.to_vec(),
        snaps: vec![false; levels.len()],
    }
}

fn models() -> Vec<Box<dyn DepletionModel>> {
    vec![
        Box::new(LeastSquaresModel::new(0.95).unwrap()),
        Box::new(TheilSenModel::new(0.95, 300, 42).unwrap()),
    ]
}

#[test]
fn test_models_agree_on_exact_line() {
    let axis = hourly_axis(&[30.0, 27.0, 24.0, 21.0, 18.0, 15.0]);

    for model in models() {
        let fit = model.fit(&axis).unwrap();
        assert_relative_eq!(fit.slope, -3.0 / 60.0, max_relative = 1e-9);
        // 30 units at 3 per hour
        assert_relative_eq!(fit.t_star.unwrap(), 600.0, max_relative = 1e-9);
        assert_relative_eq!(fit.value_at(600.0), 0.0, epsilon = 1e-9);
        assert!(!model.name().is_empty());
    }
}

#[test]
fn test_least_squares_textbook_statistics() {
    let axis = TimeAxis {
        offsets: vec![1.0, 2.0, 3.0, 4.0, 5.0],
        levels: vec![2.0, 4.0, 5.0, 4.0, 5.0],
        ..hourly_axis(&[0.0; 5])
    };

    let fit = LeastSquaresModel::new(0.95).unwrap().fit(&axis).unwrap();

    assert_relative_eq!(fit.slope, 0.6, epsilon = 1e-10);
    assert_relative_eq!(fit.intercept, 2.2, epsilon = 1e-10);
    assert_relative_eq!(fit.sigma2.unwrap(), 0.8, epsilon = 1e-10);
    assert_relative_eq!(fit.slope_std_err.unwrap(), 0.08_f64.sqrt(), epsilon = 1e-10);
    assert_relative_eq!(fit.r_squared.unwrap(), 0.6, epsilon = 1e-10);
    assert_eq!(fit.dof, 3);
    assert_eq!(fit.t_star, None);
}

#[rstest]
#[case(0.8)]
#[case(0.95)]
#[case(0.99)]
fn test_interval_contains_estimate(#[case] level: f64) {
    let axis = hourly_axis(&[50.0, 48.1, 46.5, 43.8, 42.6, 40.2, 38.9, 36.0, 34.7, 32.1]);

    let fit = LeastSquaresModel::new(level).unwrap().fit(&axis).unwrap();
    let interval = fit.interval;

    assert!(interval.ok);
    let t_star = fit.t_star.unwrap();
    assert!(interval.lower.unwrap() < t_star && t_star < interval.upper.unwrap());
}

#[test]
fn test_wider_level_gives_wider_interval() {
    let axis = hourly_axis(&[50.0, 48.1, 46.5, 43.8, 42.6, 40.2, 38.9, 36.0, 34.7, 32.1]);
    let width = |level: f64| {
        LeastSquaresModel::new(level)
            .unwrap()
            .fit(&axis)
            .unwrap()
            .interval
            .width()
            .unwrap()
    };

    assert!(width(0.8) < width(0.95));
    assert!(width(0.95) < width(0.99));
}

#[test]
fn test_noise_dominated_slope_is_not_significant() {
    let axis = hourly_axis(&[50.0, 58.0, 41.0, 57.0, 44.0, 52.0, 43.0, 49.0]);

    let fit = LeastSquaresModel::new(0.95).unwrap().fit(&axis).unwrap();

    assert!(fit.t_star.is_some());
    assert!(!fit.interval.ok);
}
