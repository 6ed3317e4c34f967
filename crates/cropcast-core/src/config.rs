//! Configuration management for Cropcast

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerting::Thresholds;
use crate::error::{Error, Result};
use crate::forecast::LagMode;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CROPCAST";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Outbound fetch configuration
    pub fetch: FetchConfig,

    /// External data source endpoints and credentials
    pub sources: SourcesConfig,

    /// Market analytics configuration
    pub market: MarketConfig,

    /// Forecaster configuration
    pub forecast: ForecastConfig,

    /// Weather lookup defaults
    pub weather: WeatherConfig,

    /// Alerting configuration
    pub alerting: AlertingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file, then `CROPCAST__*` environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;

        if config.sources.openweather_api_key.is_none() {
            config.sources.openweather_api_key = std::env::var("OPENWEATHER_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl.is_zero() {
            return Err(Error::config("cache.ttl must be greater than zero"));
        }
        if self.fetch.timeout.is_zero() {
            return Err(Error::config("fetch.timeout must be greater than zero"));
        }
        for (name, url) in [
            ("sources.nass_base_url", &self.sources.nass_base_url),
            ("sources.openweather_base_url", &self.sources.openweather_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::config(format!("{name} must be an http(s) URL, got '{url}'")));
            }
        }
        for (name, key) in [
            ("sources.nass_api_key", &self.sources.nass_api_key),
            ("sources.openweather_api_key", &self.sources.openweather_api_key),
        ] {
            if matches!(key.as_deref(), Some(key) if key.trim().is_empty()) {
                return Err(Error::config(format!("{name} is set but empty")));
            }
        }
        if self.forecast.min_points < 2 {
            return Err(Error::config("forecast.min_points must be at least 2"));
        }
        if self.market.history_years == 0 {
            return Err(Error::config("market.history_years must be at least 1"));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for fetched records
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Outbound fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Extra attempts after a network failure
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// External data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// USDA NASS Quick Stats base URL
    pub nass_base_url: String,
    /// NASS Quick Stats API key, sent as `key` when set
    #[serde(skip_serializing)]
    pub nass_api_key: Option<String>,
    /// OpenWeather base URL
    pub openweather_base_url: String,
    /// OpenWeather API key
    #[serde(skip_serializing)]
    pub openweather_api_key: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            nass_base_url: "https://quickstats.nass.usda.gov/api".to_string(),
            nass_api_key: None,
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            openweather_api_key: None,
        }
    }
}

/// Market analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Years of price history to request
    pub history_years: u32,
    /// Trailing window for market comparison
    pub comparison_window_days: i64,
    /// Trailing window for trend analysis
    pub trend_window_days: i64,
    /// Forecast horizon when none is requested
    pub default_horizon_days: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            history_years: 5,
            comparison_window_days: 90,
            trend_window_days: 180,
            default_horizon_days: 30,
        }
    }
}

/// Forecaster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Fewer daily points than this fall back to a flat-line forecast
    pub min_points: usize,
    /// Which value feeds the lag feature while projecting
    pub lag_mode: LagMode,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: 5,
            lag_mode: LagMode::default(),
        }
    }
}

/// Weather lookup defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Latitude used when a request omits one
    pub default_lat: f64,
    /// Longitude used when a request omits one
    pub default_lon: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_lat: 40.7128,
            default_lon: -74.0060,
        }
    }
}

/// Alerting configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Threshold rules per reading field
    pub thresholds: Thresholds,
    /// Webhooks notified when alerts fire
    pub webhooks: Vec<WebhookConfig>,
}

/// A notification webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL
    pub url: String,
    /// Payload style
    #[serde(default)]
    pub kind: WebhookKind,
}

/// Payload style for a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookKind {
    /// Plain JSON payload
    #[default]
    Generic,
    /// Slack incoming-webhook attachment
    Slack,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
