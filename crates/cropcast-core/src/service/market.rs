//! Crop price orchestration

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Datelike;
use tracing::{debug, warn};

use crate::analytics::{self, ALL_MARKETS};
use crate::config::{Config, MarketConfig};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, NASS_COMMODITIES, NASS_PRICES, NATIONAL_AVERAGE};
use crate::forecast::Forecaster;
use crate::models::{
    ForecastPoint, MarketAverage, Params, PricePoint, Record, Recommendations, TrendSummary,
};

use super::MAX_DAYS;

/// Crops offered even when the commodity listing cannot be fetched
pub const COMMON_CROPS: [&str; 10] = [
    "Wheat", "Corn", "Soybeans", "Rice", "Cotton", "Barley", "Oats", "Sorghum", "Peanuts",
    "Potatoes",
];

/// Markets offered when a crop's prices cannot be fetched
pub const FALLBACK_MARKETS: [&str; 6] = [
    "Iowa",
    "Illinois",
    "Nebraska",
    "Minnesota",
    "Indiana",
    "National Average",
];

const STATISTIC: &str = "PRICE RECEIVED";

/// Market analytics for one crop at a time
pub struct MarketService {
    fetcher: Arc<Fetcher>,
    forecaster: Forecaster,
    config: MarketConfig,
}

impl MarketService {
    /// Build over `fetcher` with the market and forecast settings
    pub fn new(fetcher: Arc<Fetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            forecaster: Forecaster::from_config(&config.forecast),
            config: config.market.clone(),
        }
    }

    /// Known crops: the common list followed by any extra priced commodities
    pub async fn crops(&self) -> Vec<String> {
        let mut crops: Vec<String> = COMMON_CROPS.iter().map(|c| c.to_string()).collect();

        let mut params = Params::new();
        params.insert("statisticcat_desc".into(), STATISTIC.into());

        match self.fetcher.fetch(NASS_COMMODITIES, &params).await {
            Ok(records) => {
                let extra: BTreeSet<String> = records
                    .into_iter()
                    .map(|r| r.category)
                    .filter(|c| !COMMON_CROPS.contains(&c.as_str()))
                    .collect();
                crops.extend(extra);
            }
            Err(e) => warn!(error = %e, "Commodity listing unavailable, using common crops"),
        }
        crops
    }

    /// Quick Stats query for a crop's state-level prices over the configured history
    pub(crate) fn price_params(&self, crop: &str) -> Params {
        let end_year = self.fetcher.clock().now().year() - 1;
        let span = self.config.history_years.saturating_sub(1).min(100) as i32;

        let mut params = Params::new();
        params.insert("commodity_desc".into(), commodity_name(crop));
        params.insert("statisticcat_desc".into(), STATISTIC.into());
        params.insert("agg_level_desc".into(), "STATE".into());
        params.insert("year__GE".into(), (end_year - span).to_string());
        params.insert("year__LE".into(), end_year.to_string());
        params
    }

    /// Raw price records for a crop
    pub async fn records(&self, crop: &str) -> Result<Vec<Record>> {
        let crop = validate_crop(crop)?;
        self.fetcher.fetch(NASS_PRICES, &self.price_params(crop)).await
    }

    /// Markets with prices for a crop, in first-seen order
    ///
    /// Falls back to a fixed list when the prices cannot be fetched.
    pub async fn markets(&self, crop: &str) -> Result<Vec<String>> {
        match self.records(crop).await {
            Ok(records) => {
                let mut seen = BTreeSet::new();
                Ok(records
                    .into_iter()
                    .filter_map(|r| seen.insert(r.category.clone()).then_some(r.category))
                    .collect())
            }
            Err(Error::Fetch(e)) => {
                warn!(crop = %crop, error = %e, "Prices unavailable, using fallback markets");
                Ok(FALLBACK_MARKETS.iter().map(|m| m.to_string()).collect())
            }
            Err(e) => Err(e),
        }
    }

    /// Daily mean prices, optionally for one market
    pub async fn prices(&self, crop: &str, market: Option<&str>) -> Result<Vec<PricePoint>> {
        let records = self.records(crop).await?;
        Ok(analytics::daily_prices(&records, market))
    }

    /// Average price per market over the comparison window
    pub async fn comparison(&self, crop: &str) -> Result<Vec<MarketAverage>> {
        let records = self.records(crop).await?;
        Ok(analytics::market_averages(
            &records,
            self.config.comparison_window_days,
        ))
    }

    /// Per-market trends over `window_days`, or the configured trend window
    pub async fn trends(&self, crop: &str, window_days: Option<i64>) -> Result<Vec<TrendSummary>> {
        let window = validate_days(
            "window_days",
            window_days.unwrap_or(self.config.trend_window_days),
        )?;
        let records = self.records(crop).await?;
        Ok(analytics::compare_across_categories(&records, window))
    }

    /// Selling recommendations from trends over the configured trend window
    pub async fn recommendations(&self, crop: &str) -> Result<Recommendations> {
        let window = self.config.trend_window_days;
        let trends = self.trends(crop, Some(window)).await?;
        analytics::recommend(crop.trim(), &trends, window)
    }

    /// Price forecast for a market
    ///
    /// The series is the requested market's prices, else the national
    /// average, else every market's prices.
    pub async fn forecast(
        &self,
        crop: &str,
        market: Option<&str>,
        days: Option<u32>,
    ) -> Result<Vec<ForecastPoint>> {
        let days = days.unwrap_or(self.config.default_horizon_days);
        validate_days("days", i64::from(days))?;

        let records = self.records(crop).await?;
        let series = select_series(records, market);
        self.forecaster.forecast(&series, days)
    }
}

/// NASS commodity name for a display crop name
fn commodity_name(crop: &str) -> String {
    crop.trim().to_uppercase()
}

fn validate_crop(crop: &str) -> Result<&str> {
    let crop = crop.trim();
    if crop.is_empty() {
        return Err(Error::validation("crop must not be empty"));
    }
    Ok(crop)
}

fn validate_days(name: &str, days: i64) -> Result<i64> {
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(Error::validation(format!(
            "{name} must be between 1 and {MAX_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

fn select_series(records: Vec<Record>, market: Option<&str>) -> Vec<Record> {
    let requested = market.filter(|m| *m != ALL_MARKETS);

    for candidate in requested.into_iter().chain([NATIONAL_AVERAGE]) {
        let series: Vec<Record> = records
            .iter()
            .filter(|r| r.category == candidate)
            .cloned()
            .collect();
        if !series.is_empty() {
            debug!(market = candidate, points = series.len(), "Selected forecast series");
            return series;
        }
    }

    debug!(points = records.len(), "Forecasting over all markets");
    records
}
