//! API handlers for the HTTP REST API

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{Error, FetchErrorKind};
use crate::models::{
    ForecastPoint, MarketAverage, PricePoint, Reading, Recommendations, TrendSummary,
    WeatherReport,
};
use crate::service::Services;

/// Crop used when a request names none
const DEFAULT_CROP: &str = "Corn";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Market and climate services
    pub services: Services,
    /// Prometheus handle backing `/metrics`, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Stable error kind, e.g. `validation`
    pub kind: String,
}

/// Error as seen by HTTP clients
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Fetch(e) if e.kind == FetchErrorKind::Empty => StatusCode::NOT_FOUND,
            Error::Fetch(_) => StatusCode::BAD_GATEWAY,
            Error::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                status = status.as_u16(),
                kind = self.0.kind(),
                error = %self.0,
                "Request failed"
            );
        } else {
            warn!(
                status = status.as_u16(),
                kind = self.0.kind(),
                error = %self.0,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

// ── Markets ───────────────────────────────────────────────────────────

/// `?crop=`
#[derive(Debug, Deserialize)]
pub struct CropQuery {
    /// Crop display name, `Corn` when absent
    pub crop: Option<String>,
}

impl CropQuery {
    fn crop(&self) -> &str {
        self.crop.as_deref().unwrap_or(DEFAULT_CROP)
    }
}

/// `?crop=&market=`
#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    /// Crop display name, `Corn` when absent
    pub crop: Option<String>,
    /// Restrict to one market
    pub market: Option<String>,
}

/// `?crop=&window_days=`
#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    /// Crop display name, `Corn` when absent
    pub crop: Option<String>,
    /// Trend window, configured default when absent
    pub window_days: Option<i64>,
}

/// `?crop=&market=&days=`
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    /// Crop display name, `Corn` when absent
    pub crop: Option<String>,
    /// Market whose series is forecast
    pub market: Option<String>,
    /// Horizon, configured default when absent
    pub days: Option<u32>,
}

/// List known crops
pub async fn list_crops(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.services.market.crops().await)
}

/// List markets with prices for a crop
pub async fn list_markets(
    State(state): State<AppState>,
    Query(query): Query<CropQuery>,
) -> ApiResult<Vec<String>> {
    Ok(Json(state.services.market.markets(query.crop()).await?))
}

/// Daily prices for a crop
pub async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> ApiResult<Vec<PricePoint>> {
    let crop = query.crop.as_deref().unwrap_or(DEFAULT_CROP);
    let prices = state
        .services
        .market
        .prices(crop, query.market.as_deref())
        .await?;
    Ok(Json(prices))
}

/// Recent average price per market
pub async fn market_comparison(
    State(state): State<AppState>,
    Query(query): Query<CropQuery>,
) -> ApiResult<Vec<MarketAverage>> {
    Ok(Json(state.services.market.comparison(query.crop()).await?))
}

/// Per-market price trends
pub async fn get_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
) -> ApiResult<Vec<TrendSummary>> {
    let crop = query.crop.as_deref().unwrap_or(DEFAULT_CROP);
    Ok(Json(state.services.market.trends(crop, query.window_days).await?))
}

/// Price forecast
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<Vec<ForecastPoint>> {
    let crop = query.crop.as_deref().unwrap_or(DEFAULT_CROP);
    let forecast = state
        .services
        .market
        .forecast(crop, query.market.as_deref(), query.days)
        .await?;
    Ok(Json(forecast))
}

/// Selling recommendations
pub async fn get_recommendations(
    State(state): State<AppState>,
    Query(query): Query<CropQuery>,
) -> ApiResult<Recommendations> {
    Ok(Json(state.services.market.recommendations(query.crop()).await?))
}

// ── Weather ───────────────────────────────────────────────────────────

/// Location in a query string or JSON body
#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    /// Latitude, configured default when absent
    pub lat: Option<f64>,
    /// Longitude, configured default when absent
    pub lon: Option<f64>,
}

/// Current weather
pub async fn get_weather(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> ApiResult<Reading> {
    Ok(Json(state.services.climate.reading(query.lat, query.lon).await?))
}

/// Current weather with threshold alerts
///
/// An empty body uses the configured default location. A body that is not a
/// JSON location object is rejected.
pub async fn weather_alerts(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<WeatherReport> {
    let location = parse_location(&body)?;
    let report = state
        .services
        .climate
        .weather_alerts(location.lat, location.lon)
        .await?;
    Ok(Json(report))
}

fn parse_location(body: &[u8]) -> Result<LocationQuery, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LocationQuery::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("invalid location body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn status_mapping() {
        let cases = [
            (Error::not_found("data source", "x"), StatusCode::NOT_FOUND),
            (FetchError::empty("s", "none").into(), StatusCode::NOT_FOUND),
            (FetchError::network("s", "down").into(), StatusCode::BAD_GATEWAY),
            (FetchError::parse("s", "bad").into(), StatusCode::BAD_GATEWAY),
            (Error::insufficient("trends", 1, 0), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::validation("bad crop"), StatusCode::BAD_REQUEST),
            (Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn location_body_parsing() {
        let empty = parse_location(b"  \n").unwrap();
        assert!(empty.lat.is_none() && empty.lon.is_none());

        let partial = parse_location(br#"{"lat": 41.6}"#).unwrap();
        assert_eq!(partial.lat, Some(41.6));
        assert!(partial.lon.is_none());

        let err = parse_location(br#"{"lat": "not-a-number", "lon": -93.6}"#).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(parse_location(b"{"), Err(Error::Validation(_))));
    }
}
