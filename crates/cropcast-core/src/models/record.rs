//! Fetched record model

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Request parameters for a data source, kept ordered so cache keys are stable
pub type Params = BTreeMap<String, String>;

/// A single observation fetched from an external data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// When the observation applies
    pub timestamp: DateTime<Utc>,

    /// Grouping dimension (market for prices, reading field for weather)
    pub category: String,

    /// Observed value
    pub value: f64,

    /// Unit of `value` as reported by the source
    pub unit: String,

    /// Free-text annotation carried from the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Record {
    /// Create a record without a detail annotation
    pub fn new(
        timestamp: DateTime<Utc>,
        category: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            category: category.into(),
            value,
            unit: unit.into(),
            detail: None,
        }
    }

    /// Attach a detail annotation
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Calendar day of the observation
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Build the cache key for a source and its parameters
pub fn cache_key(source_id: &str, params: &Params) -> String {
    if params.is_empty() {
        return source_id.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{source_id}?{query}")
}
