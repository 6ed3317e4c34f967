//! # Cropcast
//!
//! Cached crop-price and weather data service.
//!
//! Cropcast fetches USDA NASS price statistics and OpenWeather conditions
//! through a TTL cache, then derives trends, market comparisons, selling
//! recommendations, price forecasts and weather alerts from them.
//!
//! ## Architecture
//!
//! - **Cache**: TTL store with an injectable clock
//! - **Fetcher**: cache-fronted access to external data sources
//! - **Analytics**: grouping, trends and recommendations
//! - **Forecast**: ridge regression with iterative projection
//! - **Alerting**: threshold rules over weather readings, webhook delivery
//! - **API**: REST API over the market and climate services
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API server
//! cropcast serve
//!
//! # One-off queries
//! cropcast trends --crop Wheat
//! cropcast forecast --crop Corn --days 14 --format json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod forecast;
pub mod models;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, FetchError, FetchErrorKind, Result};
    pub use crate::fetcher::{DataSource, Fetcher};
    pub use crate::forecast::{Forecaster, LagMode};
    pub use crate::models::*;
    pub use crate::service::{ClimateService, MarketService, Services};
}
