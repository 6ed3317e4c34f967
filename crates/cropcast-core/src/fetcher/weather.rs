//! OpenWeather current-conditions client.

use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::models::{Params, ReadingField, Record};

use super::DataSource;

/// Source id for current weather
pub const OPENWEATHER: &str = "openweather";

// ── OpenWeather response types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: MainBlock,
    wind: WindBlock,
    #[serde(default)]
    weather: Vec<Condition>,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(default)]
    description: String,
}

// ── Implementation ────────────────────────────────────────────────────

/// Current weather at `lat`/`lon` as temperature, humidity and wind records
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherSource {
    /// Source against `base_url` (e.g. `https://api.openweathermap.org`)
    pub fn new(http: reqwest::Client, base_url: &str, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl DataSource for OpenWeatherSource {
    fn id(&self) -> &str {
        OPENWEATHER
    }

    async fn fetch(&self, params: &Params) -> Result<Vec<Record>, FetchError> {
        let lat = params
            .get("lat")
            .ok_or_else(|| FetchError::parse(OPENWEATHER, "missing 'lat' parameter"))?;
        let lon = params
            .get("lon")
            .ok_or_else(|| FetchError::parse(OPENWEATHER, "missing 'lon' parameter"))?;

        let url = format!("{}/data/2.5/weather", self.base_url);
        debug!(url = %url, lat = %lat, lon = %lon, "Fetching current weather");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::network(OPENWEATHER, format!("HTTP error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::network(
                OPENWEATHER,
                format!("OpenWeather returned {}", status.as_u16()),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::network(OPENWEATHER, format!("body read error: {e}")))?;
        let data: CurrentWeather = serde_json::from_str(&body)
            .map_err(|e| FetchError::parse(OPENWEATHER, format!("JSON parse error: {e}")))?;

        let observed_at = DateTime::from_timestamp(data.dt, 0)
            .ok_or_else(|| {
                FetchError::parse(OPENWEATHER, format!("invalid timestamp {}", data.dt))
            })?;
        let description = data
            .weather
            .first()
            .map(|c| c.description.clone())
            .filter(|d| !d.is_empty());

        let readings = [
            (ReadingField::Temperature, data.main.temp, "°C"),
            (ReadingField::Humidity, data.main.humidity, "%"),
            (ReadingField::Wind, data.wind.speed, "m/s"),
        ];

        Ok(readings
            .into_iter()
            .map(|(field, value, unit)| {
                let record = Record::new(observed_at, field.category(), value, unit);
                match &description {
                    Some(d) => record.with_detail(d.clone()),
                    None => record,
                }
            })
            .collect())
    }
}
