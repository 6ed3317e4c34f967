//! Webhook delivery for weather alerts

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{WebhookConfig, WebhookKind};
use crate::error::{Error, Result};
use crate::models::{Alert, Reading, Severity};

/// Result of sending one notification
#[derive(Debug, Clone)]
pub struct NotificationResult {
    /// Webhook the payload was posted to
    pub url: String,
    /// Whether the webhook answered with a success status
    pub success: bool,
    /// Failure description when `success` is false
    pub error: Option<String>,
    /// When the attempt finished
    pub sent_at: DateTime<Utc>,
}

/// Posts alert summaries to configured webhooks
#[derive(Debug, Clone)]
pub struct NotificationSender {
    client: Client,
    webhooks: Vec<WebhookConfig>,
}

impl NotificationSender {
    /// Create a sender for `webhooks`
    pub fn new(webhooks: Vec<WebhookConfig>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build notification client: {e}")))?;

        Ok(Self { client, webhooks })
    }

    /// Send one notification per webhook, in configuration order
    pub async fn send_all(
        &self,
        location: (f64, f64),
        reading: &Reading,
        alerts: &[Alert],
    ) -> Vec<NotificationResult> {
        let mut results = Vec::with_capacity(self.webhooks.len());
        for webhook in &self.webhooks {
            let sent_at = Utc::now();
            let outcome = match webhook.kind {
                WebhookKind::Generic => {
                    let payload = WebhookPayload::new(location, reading, alerts);
                    self.post(&webhook.url, &payload).await
                }
                WebhookKind::Slack => {
                    let payload = SlackPayload::new(location, reading, alerts);
                    self.post(&webhook.url, &payload).await
                }
            };

            match &outcome {
                Ok(()) => {
                    info!(url = %webhook.url, alerts = alerts.len(), "Alert notification sent")
                }
                Err(e) => warn!(url = %webhook.url, error = %e, "Alert notification failed"),
            }

            results.push(NotificationResult {
                url: webhook.url.clone(),
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
                sent_at,
            });
        }
        results
    }

    async fn post<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> std::result::Result<(), NotificationError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    HttpError(String),
}

fn highest_severity(alerts: &[Alert]) -> Severity {
    let rank = |s: Severity| match s {
        Severity::Info => 0,
        Severity::Warning => 1,
        Severity::Critical => 2,
    };
    alerts
        .iter()
        .map(|a| a.severity)
        .max_by_key(|s| rank(*s))
        .unwrap_or(Severity::Info)
}

// Generic webhook payload
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    lat: f64,
    lon: f64,
    severity: Severity,
    reading: &'a Reading,
    alerts: &'a [Alert],
    triggered_at: DateTime<Utc>,
}

impl<'a> WebhookPayload<'a> {
    fn new(location: (f64, f64), reading: &'a Reading, alerts: &'a [Alert]) -> Self {
        Self {
            lat: location.0,
            lon: location.1,
            severity: highest_severity(alerts),
            reading,
            alerts,
            triggered_at: Utc::now(),
        }
    }
}

// Slack payload types
#[derive(Debug, Serialize)]
struct SlackPayload {
    username: String,
    icon_emoji: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: String,
    title: String,
    text: String,
    fields: Vec<SlackField>,
    footer: String,
    ts: i64,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

impl SlackPayload {
    fn new(location: (f64, f64), reading: &Reading, alerts: &[Alert]) -> Self {
        let severity = highest_severity(alerts);
        let color = match severity {
            Severity::Critical => "#dc3545",
            Severity::Warning => "#ffc107",
            Severity::Info => "#17a2b8",
        };
        let text = alerts
            .iter()
            .map(|a| a.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            username: "Cropcast".to_string(),
            icon_emoji: ":ear_of_rice:".to_string(),
            attachments: vec![SlackAttachment {
                color: color.to_string(),
                title: format!(
                    "{} weather alert(s) at {:.4}, {:.4}",
                    alerts.len(),
                    location.0,
                    location.1
                ),
                text,
                fields: vec![
                    SlackField {
                        title: "Temperature".to_string(),
                        value: format!("{:.1}°C", reading.temperature),
                        short: true,
                    },
                    SlackField {
                        title: "Humidity".to_string(),
                        value: format!("{:.0}%", reading.humidity),
                        short: true,
                    },
                    SlackField {
                        title: "Wind".to_string(),
                        value: format!("{:.1} m/s", reading.wind_speed),
                        short: true,
                    },
                ],
                footer: "Cropcast Alerting".to_string(),
                ts: reading.observed_at.timestamp(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadingField;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reading() -> Reading {
        Reading {
            temperature: 35.0,
            humidity: 85.0,
            wind_speed: 4.0,
            conditions: Some("clear sky".to_string()),
            observed_at: Utc::now(),
        }
    }

    fn alerts() -> Vec<Alert> {
        vec![
            Alert {
                severity: Severity::Warning,
                message: "High temperature alert: 35°C. Consider additional irrigation."
                    .to_string(),
                field: ReadingField::Temperature,
            },
            Alert {
                severity: Severity::Critical,
                message: "High humidity alert: 85%. Monitor for fungal diseases.".to_string(),
                field: ReadingField::Humidity,
            },
        ]
    }

    fn sender(hooks: Vec<WebhookConfig>) -> NotificationSender {
        NotificationSender::new(hooks, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn highest_severity_wins() {
        assert_eq!(highest_severity(&alerts()), Severity::Critical);
        assert_eq!(highest_severity(&[]), Severity::Info);
    }

    #[tokio::test]
    async fn posts_generic_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "severity": "critical",
                "lat": 40.0,
                "alerts": [{"field": "temperature"}, {"field": "humidity"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = sender(vec![WebhookConfig {
            url: format!("{}/hook", server.uri()),
            kind: WebhookKind::Generic,
        }]);
        let results = sender.send_all((40.0, -90.0), &reading(), &alerts()).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn posts_slack_attachment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slack"))
            .and(body_partial_json(serde_json::json!({
                "username": "Cropcast",
                "attachments": [{"color": "#dc3545"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = sender(vec![WebhookConfig {
            url: format!("{}/slack", server.uri()),
            kind: WebhookKind::Slack,
        }]);
        let results = sender.send_all((40.0, -90.0), &reading(), &alerts()).await;
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn failure_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sender = sender(vec![
            WebhookConfig {
                url: format!("{}/a", server.uri()),
                kind: WebhookKind::Generic,
            },
            WebhookConfig {
                url: format!("{}/b", server.uri()),
                kind: WebhookKind::Slack,
            },
        ]);
        let results = sender.send_all((1.0, 2.0), &reading(), &alerts()).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results[0].error.as_deref().unwrap().contains("500"));
    }
}
