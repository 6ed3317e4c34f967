//! Market analytics models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a price trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    /// Change above the stability band
    Rising,
    /// Change below the stability band
    Falling,
    /// Change within the stability band
    Stable,
}

impl TrendLabel {
    /// Half-width of the stability band, in percent
    pub const STABLE_BAND_PCT: f64 = 2.0;

    /// Classify a percentage change
    pub fn from_change(percent_change: f64) -> Self {
        if percent_change > Self::STABLE_BAND_PCT {
            Self::Rising
        } else if percent_change < -Self::STABLE_BAND_PCT {
            Self::Falling
        } else {
            Self::Stable
        }
    }

    /// Lowercase name for prose
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }
}

/// Trend of one category over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Category (market) the trend describes
    pub category: String,

    /// Most recent value in the window
    pub current_value: f64,

    /// Change from first to last value, in percent, rounded to 2 decimals
    pub percent_change: f64,

    /// Classification of the change
    pub trend_label: TrendLabel,

    /// Day of the most recent value
    pub last_updated: NaiveDate,
}

/// Mean price for one market on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Calendar day (UTC)
    pub date: NaiveDate,
    /// Market (category) name
    pub market: String,
    /// Mean of the day's values
    pub price: f64,
}

/// Mean price for one market over the comparison window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAverage {
    /// Market (category) name
    pub market: String,
    /// Mean value inside the window
    pub average_price: f64,
    /// Number of records averaged
    pub samples: usize,
}

/// Suggested action for a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advice {
    SellNow,
    Hold,
    SellQuickly,
    Standard,
}

impl Advice {
    /// Derive advice from a trend
    pub fn for_trend(trend: &TrendSummary) -> Self {
        match trend.trend_label {
            TrendLabel::Rising if trend.percent_change > 5.0 => Self::SellNow,
            TrendLabel::Rising => Self::Hold,
            TrendLabel::Falling if trend.percent_change < -5.0 => Self::SellQuickly,
            _ => Self::Standard,
        }
    }

    /// Human-readable text
    pub fn text(self) -> &'static str {
        match self {
            Self::SellNow => "Consider selling now",
            Self::Hold => "Hold if possible",
            Self::SellQuickly => "Sell quickly",
            Self::Standard => "Standard market conditions",
        }
    }
}

/// A highlighted market with the reason it was picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPick {
    /// Market (category) name
    pub market: String,
    /// Most recent value
    pub price: f64,
    /// Percent change over the trend window
    pub price_change: f64,
    /// Why this market was picked
    pub reason: String,
}

/// Per-market detail in a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInsight {
    /// Market (category) name
    pub market: String,
    /// Most recent value
    pub current_price: f64,
    /// Direction over the trend window
    pub trend: TrendLabel,
    /// Percent change over the trend window
    pub change: f64,
    /// Day of the most recent value
    pub last_updated: NaiveDate,
    /// Suggested action
    pub advice: Advice,
    /// Text for `advice`
    pub recommendation: String,
}

/// Selling recommendations for a crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    /// Crop display name
    pub crop: String,
    /// Market with the highest latest price
    pub best_price_market: MarketPick,
    /// Market with the largest percent rise
    pub trending_market: MarketPick,
    /// One entry per market, in category order
    pub market_insights: Vec<MarketInsight>,
}
