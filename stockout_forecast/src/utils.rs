//! Utility functions for the stockout_forecast crate
//!
//! The time axis used for fitting is measured in **minutes** since a
//! reference timestamp `t_0`. Slopes are therefore stock units per minute
//! and `t_star` is a minute offset from `t_0`.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

pub const MINUTES_PER_DAY: f64 = 1440.0;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

// Roughly thirty thousand years; keeps offsets well inside chrono's range.
const MAX_OFFSET_MILLIS: f64 = 1e15;

/// Minutes from `t_0` to `t` (negative when `t` is earlier)
pub fn minutes_between(t_0: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - t_0).num_milliseconds() as f64 / MILLIS_PER_MINUTE
}

/// Convert a minute offset back into a timestamp, rounding to the
/// millisecond. Returns `None` for non-finite or absurdly large offsets.
pub fn offset_to_timestamp(t_0: DateTime<Utc>, minutes: f64) -> Option<DateTime<Utc>> {
    let millis = (minutes * MILLIS_PER_MINUTE).round();
    if !millis.is_finite() || millis.abs() > MAX_OFFSET_MILLIS {
        return None;
    }
    t_0.checked_add_signed(Duration::milliseconds(millis as i64))
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Timestamp parsing for stock history files
pub mod date_parser {
    use super::*;

    const NAIVE_DATETIME_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    /// Parse a timestamp. Accepts RFC 3339, naive ISO-8601 date-times
    /// (taken as UTC) and bare dates (midnight UTC).
    pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
        let input = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        for format in NAIVE_DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                return Ok(naive.and_utc());
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }

        Err(ForecastError::DataError(format!(
            "Unrecognized timestamp: {}",
            input
        )))
    }
}
