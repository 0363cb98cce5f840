//! Weather API service library.
//!
//! HTTP surface over [`weather_service::WeatherService`]: weather data,
//! city lookup, cache administration, health and metrics.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Weather data
        .route(
            "/api/v1/weather/current/:city",
            get(handlers::weather::current_handler),
        )
        .route(
            "/api/v1/weather/forecast/:city",
            get(handlers::weather::forecast_handler),
        )
        .route(
            "/api/v1/weather/historical/:city",
            get(handlers::weather::historical_handler),
        )
        .route(
            "/api/v1/weather/stats/:city",
            get(handlers::weather::stats_handler),
        )
        // Cities
        .route("/api/v1/cities/list", get(handlers::cities::list_handler))
        .route("/api/v1/cities/search", get(handlers::cities::search_handler))
        // Cache administration
        .route("/api/v1/cache/stats", get(handlers::admin::stats_handler))
        .route("/api/v1/cache/:city", delete(handlers::admin::clear_handler))
        .route(
            "/api/v1/cache/populate/:city",
            post(handlers::admin::populate_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
