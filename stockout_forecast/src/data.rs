//! Stock-level observations and history loading

use crate::error::{ForecastError, Result};
use crate::utils::{date_parser, minutes_between};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// One stock-level sample for a resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub stock_level: f64,
    /// Sample taken right after a snap event halved the stock
    #[serde(default)]
    pub snap_event: bool,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, stock_level: f64) -> Self {
        Self {
            timestamp,
            stock_level,
            snap_event: false,
        }
    }

    /// Mark this sample as a snap event
    pub fn with_snap_event(mut self, snap_event: bool) -> Self {
        self.snap_event = snap_event;
        self
    }

    /// Reject stock levels that are not finite or are negative
    pub fn validate(&self) -> Result<()> {
        if !self.stock_level.is_finite() {
            return Err(ForecastError::InvalidInput(format!(
                "Stock level at {} is not a finite number",
                self.timestamp
            )));
        }
        if self.stock_level < 0.0 {
            return Err(ForecastError::InvalidInput(format!(
                "Stock level at {} is negative ({})",
                self.timestamp, self.stock_level
            )));
        }
        Ok(())
    }
}

/// Observations prepared for fitting: validated, sorted, de-duplicated
/// and cut off at an optional end date.
///
/// Samples sharing a timestamp are merged by averaging their stock levels;
/// the merged sample is a snap event if any of its parts was.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    observations: Vec<Observation>,
    excluded: usize,
    latest_supplied: Option<DateTime<Utc>>,
}

impl SeriesWindow {
    /// Prepare a window from raw observations
    pub fn prepare(observations: &[Observation], end_date: Option<DateTime<Utc>>) -> Result<Self> {
        for observation in observations {
            observation.validate()?;
        }

        let mut sorted = observations.to_vec();
        sorted.sort_by_key(|o| o.timestamp);

        let latest_supplied = sorted.last().map(|o| o.timestamp);
        let mut excluded = 0;
        let mut merged: Vec<Observation> = Vec::with_capacity(sorted.len());
        let mut group_size = 0usize;
        let mut group_sum = 0.0;

        for observation in sorted {
            if end_date.map_or(false, |end| observation.timestamp > end) {
                excluded += 1;
                continue;
            }

            match merged.last_mut() {
                Some(last) if last.timestamp == observation.timestamp => {
                    group_size += 1;
                    group_sum += observation.stock_level;
                    last.stock_level = group_sum / group_size as f64;
                    last.snap_event |= observation.snap_event;
                }
                _ => {
                    group_size = 1;
                    group_sum = observation.stock_level;
                    merged.push(observation);
                }
            }
        }

        debug!(
            supplied = observations.len(),
            kept = merged.len(),
            excluded,
            "prepared observation window"
        );

        Ok(Self {
            observations: merged,
            excluded,
            latest_supplied,
        })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations dropped because they fall after the end date
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    /// Latest timestamp among all supplied observations, cut off or not
    pub fn latest_supplied(&self) -> Option<DateTime<Utc>> {
        self.latest_supplied
    }

    /// Reference timestamp of the time axis (first kept observation)
    pub fn t_0(&self) -> Option<DateTime<Utc>> {
        self.observations.first().map(|o| o.timestamp)
    }

    /// Numeric time axis for fitting, `None` when the window is empty
    pub fn time_axis(&self) -> Option<TimeAxis> {
        let t_0 = self.t_0()?;
        Some(TimeAxis {
            t_0,
            offsets: self
                .observations
                .iter()
                .map(|o| minutes_between(t_0, o.timestamp))
                .collect(),
            levels: self.observations.iter().map(|o| o.stock_level).collect(),
            snaps: self.observations.iter().map(|o| o.snap_event).collect(),
        })
    }
}

/// Observations on a minute axis starting at `t_0`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub t_0: DateTime<Utc>,
    /// Minutes since `t_0`, strictly increasing
    pub offsets: Vec<f64>,
    pub levels: Vec<f64>,
    pub snaps: Vec<bool>,
}

impl TimeAxis {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset of the last sample
    pub fn last_offset(&self) -> f64 {
        self.offsets.last().copied().unwrap_or(0.0)
    }
}

/// Identifies one resource's series within a sector
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub sector: String,
    pub resource: String,
}

impl SeriesKey {
    pub fn new(sector: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            sector: sector.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.sector, self.resource)
    }
}

/// Raw row of the historical stock CSV
#[derive(Debug, Deserialize)]
struct StockRecord {
    timestamp: String,
    sector_id: String,
    resource_type: String,
    stock_level: String,
    #[serde(default)]
    snap_event_detected: Option<String>,
}

/// Stock histories grouped per (sector, resource), in first-seen order
#[derive(Debug, Clone, Default)]
pub struct StockHistory {
    keys: Vec<SeriesKey>,
    series: HashMap<SeriesKey, Vec<Observation>>,
}

impl StockHistory {
    /// Load a history from a CSV file with the columns
    /// `timestamp,sector_id,resource_type,stock_level,usage_rate_hourly,snap_event_detected`
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a history from any CSV reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut history = Self::default();
        for (index, row) in csv_reader.deserialize::<StockRecord>().enumerate() {
            // Header is line 1
            let line = index + 2;
            let record = row?;

            let timestamp = date_parser::parse_timestamp(&record.timestamp)
                .map_err(|e| at_line(line, e))?;
            let stock_level: f64 = record.stock_level.parse().map_err(|_| {
                ForecastError::InvalidInput(format!(
                    "line {}: stock level '{}' is not a number",
                    line, record.stock_level
                ))
            })?;
            let snap_event = record
                .snap_event_detected
                .as_deref()
                .map_or(false, parse_flag);

            let observation = Observation::new(timestamp, stock_level).with_snap_event(snap_event);
            observation.validate().map_err(|e| at_line(line, e))?;

            history.push(
                SeriesKey::new(record.sector_id, record.resource_type),
                observation,
            );
        }

        debug!(series = history.len(), "loaded stock history");
        Ok(history)
    }

    /// Append one observation to a series
    pub fn push(&mut self, key: SeriesKey, observation: Observation) {
        if !self.series.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.series.entry(key).or_default().push(observation);
    }

    /// Series keys in first-seen order
    pub fn keys(&self) -> &[SeriesKey] {
        &self.keys
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&[Observation]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Observations for one sector and resource
    pub fn series(&self, sector: &str, resource: &str) -> Option<&[Observation]> {
        self.get(&SeriesKey::new(sector, resource))
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Distinct sector names in first-seen order
    pub fn sectors(&self) -> Vec<&str> {
        distinct(self.keys.iter().map(|k| k.sector.as_str()))
    }

    /// Distinct resource names in first-seen order
    pub fn resources(&self) -> Vec<&str> {
        distinct(self.keys.iter().map(|k| k.resource.as_str()))
    }
}

fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn at_line(line: usize, err: ForecastError) -> ForecastError {
    match err {
        ForecastError::InvalidInput(msg) => {
            ForecastError::InvalidInput(format!("line {}: {}", line, msg))
        }
        ForecastError::DataError(msg) => ForecastError::DataError(format!("line {}: {}", line, msg)),
        other => other,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
