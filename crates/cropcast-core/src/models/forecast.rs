//! Forecast output model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single projected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Day the prediction applies to
    pub date: NaiveDate,

    /// Predicted value
    pub predicted_value: f64,
}
