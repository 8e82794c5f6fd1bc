//! # Stockout
//!
//! Workspace facade for the depletion forecaster.
//!
//! - [`math`]: least squares, Theil–Sen and the small linear algebra they need
//! - [`forecast`]: the forecast engine, its configuration and history loading
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use stockout_workspace::forecast::{forecast_depletion, ForecastStatus, Observation};
//!
//! let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
//! let history = vec![
//!     Observation::new(start, 10.0),
//!     Observation::new(start + Duration::hours(1), 8.0),
//!     Observation::new(start + Duration::hours(2), 6.0),
//! ];
//!
//! let result = forecast_depletion(&history, None).unwrap();
//! assert_eq!(result.status, ForecastStatus::Ok);
//! assert_eq!(result.t_star_ts, Some(start + Duration::hours(5)));
//! ```

pub use stock_math as math;
pub use stockout_forecast as forecast;
