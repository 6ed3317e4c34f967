//! Weather reading and alert models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal to
    Gte,
    /// Less than or equal to
    Lte,
}

impl Operator {
    /// Compare a value against a threshold
    pub fn check(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
        }
    }
}

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Warning
    #[default]
    Warning,
    /// Critical
    Critical,
}

/// Field of a weather reading that a threshold applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingField {
    Temperature,
    Humidity,
    Wind,
}

impl ReadingField {
    /// Evaluation order
    pub const ALL: [ReadingField; 3] = [Self::Temperature, Self::Humidity, Self::Wind];

    /// Record category the field is fetched under
    pub fn category(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Wind => "wind",
        }
    }
}

/// Current weather at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Short condition description
    pub conditions: Option<String>,
    /// Observation time reported by the source
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    /// Assemble a reading from weather records, one per field
    ///
    /// Returns `None` when any field is missing. The latest record per field wins.
    pub fn from_records(records: &[Record]) -> Option<Self> {
        let latest = |field: ReadingField| {
            records
                .iter()
                .filter(|r| r.category == field.category())
                .max_by_key(|r| r.timestamp)
        };

        let temperature = latest(ReadingField::Temperature)?;
        let humidity = latest(ReadingField::Humidity)?;
        let wind = latest(ReadingField::Wind)?;

        Some(Self {
            temperature: temperature.value,
            humidity: humidity.value,
            wind_speed: wind.value,
            conditions: temperature.detail.clone(),
            observed_at: temperature.timestamp,
        })
    }

    /// Value of a given field
    pub fn value(&self, field: ReadingField) -> f64 {
        match field {
            ReadingField::Temperature => self.temperature,
            ReadingField::Humidity => self.humidity,
            ReadingField::Wind => self.wind_speed,
        }
    }
}

/// A fired threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity level
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Field that fired
    pub field: ReadingField,
}

/// A reading with the alerts it fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Latitude the reading was taken for
    pub lat: f64,
    /// Longitude the reading was taken for
    pub lon: f64,
    /// Current conditions
    #[serde(flatten)]
    pub reading: Reading,
    /// Fired alerts, in evaluation order
    pub alerts: Vec<Alert>,
}
