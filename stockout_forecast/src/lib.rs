//! # Stockout Forecast
//!
//! Projects when a resource runs out of stock from its stock-level history.
//!
//! ## Features
//!
//! - Observation preparation (sorting, duplicate averaging, end-date cutoff)
//! - Least-squares trend with a delta-method confidence interval
//! - Optional harmonic weighting, slope ridge penalty and snap-event handling
//! - Robust Theil–Sen trend with a seeded bootstrap interval
//! - JSON-serializable results with a clamped trend line
//! - Stock history loading from CSV and report-mention matching
//!
//! ## Time axis
//!
//! Offsets are **minutes** since the first fitted observation (`t_0`).
//! Slopes are stock units per minute and `t_star` is a minute offset;
//! `t_star_ts`, `ci_lo_ts` and `ci_hi_ts` carry the same instants as
//! timestamps.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use stockout_forecast::{ForecastEngine, Observation};
//!
//! let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
//! let history: Vec<Observation> = (0..10)
//!     .map(|day| Observation::new(start + Duration::days(day), 100.0 - 2.0 * day as f64))
//!     .collect();
//!
//! let engine = ForecastEngine::default();
//! let result = engine.forecast(&history, None)?;
//!
//! // 50 days after the first observation
//! assert_eq!(result.t_star_ts, Some(start + Duration::days(50)));
//! assert!(result.ci.ok);
//! # Ok::<(), stockout_forecast::ForecastError>(())
//! ```

pub mod confidence;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod result;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{FitMethod, ForecastConfig, SnapAdjustment, Weighting};
pub use crate::data::{Observation, SeriesKey, StockHistory};
pub use crate::engine::{forecast_depletion, ForecastEngine, ForecastRequest};
pub use crate::error::{ForecastError, Result};
pub use crate::matching::{match_mention, match_mention_or_first, ReportMatch};
pub use crate::models::{DepletionFit, DepletionModel};
pub use crate::result::{ConfidenceInterval, FitSummary, ForecastResult, ForecastStatus, TrendLine};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
