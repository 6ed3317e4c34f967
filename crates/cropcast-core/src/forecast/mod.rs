//! Value forecasting over historical records
//!
//! Records are ordered by timestamp, keeping input order for equal
//! timestamps. Histories with fewer than `min_points` records get a naive
//! flat-line forecast at the last record's value, emitted as observed. Longer
//! ones are fitted with a ridge regression on one row per record,
//! `[month, year, day_index, previous_value]`, and projected one day at a
//! time; projected values are rounded to cents.
//!
//! With [`LagMode::Predicted`] (the default) each projected value becomes the
//! `previous_value` of the next step, so model error compounds over the
//! horizon. [`LagMode::LastObserved`] pins the lag to the last real value.

mod regression;

pub use regression::RidgeRegression;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::round2;
use crate::config::ForecastConfig;
use crate::error::{Error, Result};
use crate::models::{ForecastPoint, Record};

/// Ridge penalty on standardized features
const RIDGE_LAMBDA: f64 = 1e-3;

/// Source of the lag feature while projecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LagMode {
    /// Feed each prediction back as the next lag
    #[default]
    Predicted,
    /// Always use the last observed value
    LastObserved,
}

/// Projects future values from a record history
#[derive(Debug, Clone)]
pub struct Forecaster {
    min_points: usize,
    lag_mode: LagMode,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::from_config(&ForecastConfig::default())
    }
}

impl Forecaster {
    /// Create a forecaster from configuration
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            min_points: config.min_points,
            lag_mode: config.lag_mode,
        }
    }

    /// Override the lag mode
    #[must_use]
    pub fn with_lag_mode(mut self, lag_mode: LagMode) -> Self {
        self.lag_mode = lag_mode;
        self
    }

    /// `horizon_days` daily predictions starting the day after the last record
    pub fn forecast(&self, records: &[Record], horizon_days: u32) -> Result<Vec<ForecastPoint>> {
        let series = ordered(records);
        let Some(last) = series.last() else {
            return Err(Error::insufficient("forecast history", 1, 0));
        };
        let (last_date, last_value) = (last.date(), last.value);

        if horizon_days == 0 {
            return Ok(Vec::new());
        }

        if series.len() < self.min_points {
            debug!(
                records = series.len(),
                required = self.min_points,
                "Too little history, using flat-line forecast"
            );
            return Ok(naive(last_date, last_value, horizon_days));
        }

        let start = series[0].date();
        let mean = series.iter().map(|r| r.value).sum::<f64>() / series.len() as f64;

        let mut x = Vec::with_capacity(series.len());
        let mut y = Vec::with_capacity(series.len());
        let mut lag = mean;
        for record in &series {
            x.push(features(record.date(), start, lag));
            y.push(record.value);
            lag = record.value;
        }

        let Some(model) = RidgeRegression::fit(&x, &y, RIDGE_LAMBDA) else {
            warn!(records = series.len(), "Regression fit failed, using flat-line forecast");
            return Ok(naive(last_date, last_value, horizon_days));
        };

        let mut previous = last_value;
        let points = (1..=i64::from(horizon_days))
            .map(|offset| {
                let date = last_date + Duration::days(offset);
                let lag = match self.lag_mode {
                    LagMode::Predicted => previous,
                    LagMode::LastObserved => last_value,
                };
                let predicted = model.predict(&features(date, start, lag));
                previous = predicted;
                ForecastPoint {
                    date,
                    predicted_value: round2(predicted),
                }
            })
            .collect();

        Ok(points)
    }
}

/// Records by ascending timestamp; the sort is stable
fn ordered(records: &[Record]) -> Vec<&Record> {
    let mut series: Vec<&Record> = records.iter().collect();
    series.sort_by_key(|r| r.timestamp);
    series
}

fn features(date: NaiveDate, start: NaiveDate, lag: f64) -> Vec<f64> {
    vec![
        f64::from(date.month()),
        f64::from(date.year()),
        (date - start).num_days() as f64,
        lag,
    ]
}

/// Flat line at the last observed value, left unrounded
fn naive(last_date: NaiveDate, last_value: f64, horizon_days: u32) -> Vec<ForecastPoint> {
    (1..=i64::from(horizon_days))
        .map(|offset| ForecastPoint {
            date: last_date + Duration::days(offset),
            predicted_value: last_value,
        })
        .collect()
}
