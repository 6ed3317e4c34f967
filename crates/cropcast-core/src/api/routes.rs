//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))

        // Markets
        .route("/api/crops", get(handlers::list_crops))
        .route("/api/markets", get(handlers::list_markets))
        .route("/api/prices", get(handlers::get_prices))
        .route("/api/market_comparison", get(handlers::market_comparison))
        .route("/api/trends", get(handlers::get_trends))
        .route("/api/forecast", get(handlers::get_forecast))
        .route("/api/recommendations", get(handlers::get_recommendations))

        // Weather
        .route("/api/weather", get(handlers::get_weather))
        .route("/api/weather-alerts", post(handlers::weather_alerts))

        .with_state(state)
}
