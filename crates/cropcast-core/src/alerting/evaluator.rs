//! Threshold evaluation over weather readings

use serde::{Deserialize, Serialize};

use crate::models::{Alert, Operator, Reading, ReadingField, Severity};

/// A single static comparison against one reading field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Comparison operator
    pub operator: Operator,
    /// Threshold value
    pub value: f64,
    /// Severity of the resulting alert
    #[serde(default)]
    pub severity: Severity,
}

impl ThresholdRule {
    /// Rule that fires when the field exceeds `value`
    pub fn above(value: f64) -> Self {
        Self {
            operator: Operator::Gt,
            value,
            severity: Severity::Warning,
        }
    }
}

/// Per-field threshold rules; a `None` field is never checked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Rule for temperature in °C
    pub temperature: Option<ThresholdRule>,
    /// Rule for relative humidity in percent
    pub humidity: Option<ThresholdRule>,
    /// Rule for wind speed in m/s
    pub wind: Option<ThresholdRule>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: Some(ThresholdRule::above(30.0)),
            humidity: Some(ThresholdRule::above(80.0)),
            wind: Some(ThresholdRule::above(20.0)),
        }
    }
}

impl Thresholds {
    /// Rule for a field
    pub fn rule(&self, field: ReadingField) -> Option<&ThresholdRule> {
        match field {
            ReadingField::Temperature => self.temperature.as_ref(),
            ReadingField::Humidity => self.humidity.as_ref(),
            ReadingField::Wind => self.wind.as_ref(),
        }
    }
}

/// Alerts fired by `reading`, in temperature, humidity, wind order
pub fn evaluate(reading: &Reading, thresholds: &Thresholds) -> Vec<Alert> {
    ReadingField::ALL
        .into_iter()
        .filter_map(|field| {
            let rule = thresholds.rule(field)?;
            let value = reading.value(field);
            rule.operator.check(value, rule.value).then(|| Alert {
                severity: rule.severity,
                message: format_message(field, rule.operator, value),
                field,
            })
        })
        .collect()
}

fn format_message(field: ReadingField, operator: Operator, value: f64) -> String {
    let high = matches!(operator, Operator::Gt | Operator::Gte);
    match (field, high) {
        (ReadingField::Temperature, true) => {
            format!("High temperature alert: {value}°C. Consider additional irrigation.")
        }
        (ReadingField::Temperature, false) => {
            format!("Low temperature alert: {value}°C. Protect crops from frost.")
        }
        (ReadingField::Humidity, true) => {
            format!("High humidity alert: {value}%. Monitor for fungal diseases.")
        }
        (ReadingField::Humidity, false) => {
            format!("Low humidity alert: {value}%. Check soil moisture.")
        }
        (ReadingField::Wind, true) => {
            format!("Strong wind alert: {value}m/s. Protect delicate crops.")
        }
        (ReadingField::Wind, false) => {
            format!("Calm wind alert: {value}m/s. Watch for frost pockets and poor pollination.")
        }
    }
}
