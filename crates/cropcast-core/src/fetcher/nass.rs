//! USDA NASS Quick Stats client.
//!
//! Fetches `PRICE RECEIVED` statistics from `quickstats.nass.usda.gov` and
//! turns each row into a [`Record`]. Rows carry a year and a free-form
//! reference period; the period is mapped to an approximate calendar day.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::models::{Params, Record};

use super::DataSource;

/// Source id for per-market crop prices
pub const NASS_PRICES: &str = "nass-prices";

/// Source id for the list of priced commodities
pub const NASS_COMMODITIES: &str = "nass-commodities";

/// Category used when a row names no state
pub const NATIONAL_AVERAGE: &str = "National Average";

/// Longest commodity name accepted from the API
const MAX_COMMODITY_LEN: usize = 30;

#[derive(Debug, Deserialize)]
struct QuickStatsResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Shared HTTP access to the Quick Stats `api_GET` endpoint
#[derive(Debug, Clone)]
pub struct NassClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl NassClient {
    /// Create a client against `base_url` (e.g. `https://quickstats.nass.usda.gov/api`)
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Raw rows for a query
    async fn rows(&self, source_id: &str, params: &Params) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/api_GET/", self.base_url);

        let mut query: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k.as_str() != "format" && k.as_str() != "key")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.push(("format", "JSON"));
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        debug!(url = %url, params = ?params, "Fetching NASS Quick Stats");

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::network(source_id, format!("HTTP error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::network(source_id, format!("body read error: {e}")))?;

        if !status.is_success() {
            return Err(FetchError::network(
                source_id,
                format!("NASS returned {}: {}", status.as_u16(), truncate(&body, 500)),
            ));
        }

        let parsed: QuickStatsResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::parse(source_id, format!("JSON parse error: {e}")))?;

        match parsed.data {
            Some(rows) if !rows.is_empty() => Ok(rows),
            _ => Err(FetchError::empty(source_id, "response holds no data rows")),
        }
    }
}

/// Per-state price records for one commodity
#[derive(Debug, Clone)]
pub struct NassPriceSource {
    client: NassClient,
}

impl NassPriceSource {
    /// Source over a shared client
    pub fn new(client: NassClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl DataSource for NassPriceSource {
    fn id(&self) -> &str {
        NASS_PRICES
    }

    async fn fetch(&self, params: &Params) -> Result<Vec<Record>, FetchError> {
        let rows = self.client.rows(NASS_PRICES, params).await?;
        let records: Vec<Record> = rows.iter().filter_map(price_record).collect();

        if records.is_empty() {
            return Err(FetchError::empty(NASS_PRICES, "no rows carried a usable price"));
        }
        Ok(records)
    }
}

/// One record per listed commodity, categorized by its name
///
/// Only the name matters. Values are 0 and timestamps are Jan 1 of the row's
/// year, or the Unix epoch when the year is missing.
#[derive(Debug, Clone)]
pub struct NassCommoditySource {
    client: NassClient,
}

impl NassCommoditySource {
    /// Source over a shared client
    pub fn new(client: NassClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl DataSource for NassCommoditySource {
    fn id(&self) -> &str {
        NASS_COMMODITIES
    }

    async fn fetch(&self, params: &Params) -> Result<Vec<Record>, FetchError> {
        let rows = self.client.rows(NASS_COMMODITIES, params).await?;
        let records: Vec<Record> = rows.iter().filter_map(commodity_record).collect();

        if records.is_empty() {
            return Err(FetchError::empty(NASS_COMMODITIES, "no commodities found"));
        }
        Ok(records)
    }
}

fn commodity_record(row: &Value) -> Option<Record> {
    let commodity = field(row, "commodity_desc")?;
    let commodity = commodity.trim();
    if commodity.is_empty() || commodity.len() >= MAX_COMMODITY_LEN {
        return None;
    }

    let timestamp = field(row, "year")
        .and_then(|year| year.trim().parse::<i32>().ok())
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::UNIX_EPOCH);
    let unit = field(row, "unit_desc").unwrap_or_default();
    Some(Record::new(timestamp, title_case(commodity), 0.0, unit))
}

fn price_record(row: &Value) -> Option<Record> {
    let value = parse_value(&field(row, "Value")?)?;
    let year: i32 = field(row, "year")?.trim().parse().ok()?;
    let period = field(row, "reference_period_desc").unwrap_or_default();
    let date = period_date(year, &period)?;

    let category = field(row, "state_name")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NATIONAL_AVERAGE.to_string());
    let unit = field(row, "unit_desc").unwrap_or_default();

    let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc();
    let mut record = Record::new(timestamp, category, value, unit);
    if !period.is_empty() {
        record = record.with_detail(period);
    }
    Some(record)
}

/// String view of a row field; Quick Stats mixes strings and numbers
fn field(row: &Value, name: &str) -> Option<String> {
    match row.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a Quick Stats value like `"1,234.50"`; suppressed values like `"(D)"` yield `None`
fn parse_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Approximate calendar day for a year and reference period
///
/// Yearly periods map to Jan 1, months to the 15th, quarters to the 15th of
/// their middle month, anything unrecognized to Jan 1.
pub(crate) fn period_date(year: i32, period: &str) -> Option<NaiveDate> {
    let period = period.trim().to_uppercase();
    let (month, day) = match period.as_str() {
        "YEAR" | "MARKETING YEAR" => (1, 1),
        "JAN" | "JANUARY" => (1, 15),
        "FEB" | "FEBRUARY" => (2, 15),
        "MAR" | "MARCH" => (3, 15),
        "APR" | "APRIL" => (4, 15),
        "MAY" => (5, 15),
        "JUN" | "JUNE" => (6, 15),
        "JUL" | "JULY" => (7, 15),
        "AUG" | "AUGUST" => (8, 15),
        "SEP" | "SEPTEMBER" => (9, 15),
        "OCT" | "OCTOBER" => (10, 15),
        "NOV" | "NOVEMBER" => (11, 15),
        "DEC" | "DECEMBER" => (12, 15),
        p if p.contains("QUARTER") => {
            if p.contains('1') {
                (2, 15)
            } else if p.contains('2') {
                (5, 15)
            } else if p.contains('3') {
                (8, 15)
            } else if p.contains('4') {
                (11, 15)
            } else {
                (1, 1)
            }
        }
        _ => (1, 1),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
