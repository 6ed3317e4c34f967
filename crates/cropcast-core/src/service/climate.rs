//! Weather orchestration

use std::sync::Arc;

use tracing::{debug, info};

use crate::alerting::{self, NotificationSender, Thresholds};
use crate::config::{Config, WeatherConfig};
use crate::error::{Error, FetchError, Result};
use crate::fetcher::{Fetcher, OPENWEATHER};
use crate::models::{Params, Reading, WeatherReport};

/// Current weather and threshold alerts for a location
pub struct ClimateService {
    fetcher: Arc<Fetcher>,
    thresholds: Thresholds,
    defaults: WeatherConfig,
    notifier: Option<NotificationSender>,
}

impl ClimateService {
    /// Build over `fetcher`; a notifier is created when webhooks are configured
    pub fn new(fetcher: Arc<Fetcher>, config: &Config) -> Result<Self> {
        let notifier = if config.alerting.webhooks.is_empty() {
            None
        } else {
            Some(NotificationSender::new(
                config.alerting.webhooks.clone(),
                config.fetch.timeout,
            )?)
        };

        Ok(Self {
            fetcher,
            thresholds: config.alerting.thresholds.clone(),
            defaults: config.weather.clone(),
            notifier,
        })
    }

    /// Resolve a location against the configured defaults and check its range
    pub fn location(&self, lat: Option<f64>, lon: Option<f64>) -> Result<(f64, f64)> {
        let lat = lat.unwrap_or(self.defaults.default_lat);
        let lon = lon.unwrap_or(self.defaults.default_lon);

        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::validation(format!("lat must be within [-90, 90], got {lat}")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::validation(format!("lon must be within [-180, 180], got {lon}")));
        }
        Ok((lat, lon))
    }

    /// Current reading at a location
    pub async fn reading(&self, lat: Option<f64>, lon: Option<f64>) -> Result<Reading> {
        let (lat, lon) = self.location(lat, lon)?;
        self.fetch_reading(lat, lon).await
    }

    /// Current reading with the alerts it fires
    ///
    /// When alerts fire and webhooks are configured, they are notified in the
    /// background; delivery never affects the returned report.
    pub async fn weather_alerts(
        &self,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<WeatherReport> {
        let (lat, lon) = self.location(lat, lon)?;
        let reading = self.fetch_reading(lat, lon).await?;
        let alerts = alerting::evaluate(&reading, &self.thresholds);

        if alerts.is_empty() {
            debug!(lat, lon, "No weather alerts");
        } else {
            info!(lat, lon, count = alerts.len(), "Weather alerts fired");
            metrics::counter!("cropcast_weather_alerts_total").increment(alerts.len() as u64);

            if let Some(notifier) = self.notifier.clone() {
                let (reading, alerts) = (reading.clone(), alerts.clone());
                tokio::spawn(async move {
                    notifier.send_all((lat, lon), &reading, &alerts).await;
                });
            }
        }

        Ok(WeatherReport {
            lat,
            lon,
            reading,
            alerts,
        })
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let mut params = Params::new();
        params.insert("lat".into(), lat.to_string());
        params.insert("lon".into(), lon.to_string());

        let records = self.fetcher.fetch(OPENWEATHER, &params).await?;
        Reading::from_records(&records).ok_or_else(|| {
            Error::from(FetchError::parse(
                OPENWEATHER,
                "response lacked temperature, humidity or wind",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::{WebhookConfig, WebhookKind};
    use crate::fetcher::testing::ScriptedSource;
    use crate::models::{ReadingField, Record};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn weather(temperature: f64, humidity: f64, wind: f64) -> Vec<Record> {
        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 15, 0, 0).unwrap();
        vec![
            Record::new(ts, "temperature", temperature, "°C").with_detail("clear sky"),
            Record::new(ts, "humidity", humidity, "%").with_detail("clear sky"),
            Record::new(ts, "wind", wind, "m/s").with_detail("clear sky"),
        ]
    }

    fn service_with(config: &Config, source: Option<ScriptedSource>) -> ClimateService {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut fetcher = Fetcher::new(Duration::from_secs(600), clock);
        if let Some(source) = source {
            fetcher = fetcher.register(source);
        }
        ClimateService::new(Arc::new(fetcher), config).unwrap()
    }

    fn service(records: Vec<Record>) -> ClimateService {
        service_with(&Config::default(), Some(ScriptedSource::ok(OPENWEATHER, records)))
    }

    #[tokio::test]
    async fn reading_uses_default_location() {
        let svc = service(weather(21.0, 40.0, 3.0));
        assert_eq!(svc.location(None, None).unwrap(), (40.7128, -74.0060));

        let reading = svc.reading(None, None).await.unwrap();
        assert_eq!(reading.temperature, 21.0);
        assert_eq!(reading.conditions.as_deref(), Some("clear sky"));
    }

    #[tokio::test]
    async fn out_of_range_location_is_rejected() {
        let svc = service(weather(21.0, 40.0, 3.0));
        let err = svc.reading(Some(91.0), None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = svc.reading(None, Some(-181.0)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn missing_weather_source_is_not_found() {
        let svc = service_with(&Config::default(), None);
        let err = svc.reading(None, None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn incomplete_reading_is_parse_error() {
        let mut records = weather(21.0, 40.0, 3.0);
        records.pop();
        let svc = service(records);
        let err = svc.reading(None, None).await.unwrap_err();
        assert_eq!(err.kind(), "fetch_parse");
    }

    #[tokio::test]
    async fn report_carries_alerts_in_order() {
        let svc = service(weather(35.0, 85.0, 25.0));
        let report = svc.weather_alerts(Some(41.6), Some(-93.6)).await.unwrap();

        assert_eq!((report.lat, report.lon), (41.6, -93.6));
        let fields: Vec<ReadingField> = report.alerts.iter().map(|a| a.field).collect();
        assert_eq!(
            fields,
            vec![ReadingField::Temperature, ReadingField::Humidity, ReadingField::Wind]
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["temperature"], 35.0);
        assert_eq!(json["alerts"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fired_alerts_reach_webhooks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.alerting.webhooks = vec![WebhookConfig {
            url: format!("{}/hook", server.uri()),
            kind: WebhookKind::Generic,
        }];
        let svc = service_with(
            &config,
            Some(ScriptedSource::ok(OPENWEATHER, weather(35.0, 50.0, 5.0))),
        );

        let report = svc.weather_alerts(None, None).await.unwrap();
        assert_eq!(report.alerts.len(), 1);

        let mut delivered = 0;
        for _ in 0..50 {
            delivered = server.received_requests().await.map_or(0, |r| r.len());
            if delivered > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn quiet_reading_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.alerting.webhooks = vec![WebhookConfig {
            url: server.uri(),
            kind: WebhookKind::Slack,
        }];
        let svc = service_with(
            &config,
            Some(ScriptedSource::ok(OPENWEATHER, weather(20.0, 50.0, 5.0))),
        );

        let report = svc.weather_alerts(None, None).await.unwrap();
        assert!(report.alerts.is_empty());
    }
}
