//! Request orchestration over the fetcher, analytics and alerting
//!
//! [`MarketService`] answers crop price questions from NASS data and
//! [`ClimateService`] answers weather questions from OpenWeather. Both share
//! one [`Fetcher`] and therefore one cache.

mod climate;
mod market;

pub use climate::ClimateService;
pub use market::{MarketService, COMMON_CROPS, FALLBACK_MARKETS};

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::Fetcher;

/// Upper bound on a requested forecast horizon or trend window, in days
pub const MAX_DAYS: i64 = 3650;

/// Both services over a shared fetcher
#[derive(Clone)]
pub struct Services {
    /// Prices, trends, recommendations and forecasts
    pub market: Arc<MarketService>,
    /// Weather readings and alerts
    pub climate: Arc<ClimateService>,
}

impl Services {
    /// Wire the services from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::from_config(config)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Wire the services over an existing fetcher
    pub fn with_fetcher(config: &Config, fetcher: Arc<Fetcher>) -> Result<Self> {
        Ok(Self {
            market: Arc::new(MarketService::new(fetcher.clone(), config)),
            climate: Arc::new(ClimateService::new(fetcher, config)?),
        })
    }
}
