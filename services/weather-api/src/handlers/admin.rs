//! Cache administration and historical population.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use tracing::info;

use weather_common::WeatherError;
use weather_service::{
    CancellationToken, ClearReport, PopulationReport, PopulationRequest, StorageStatsReport,
};

use super::parse_number;
use crate::config::population_delay;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ClearParams {
    pub clear_historical: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopulateParams {
    pub days_back: Option<String>,
    pub delay: Option<String>,
}

/// GET /api/v1/cache/stats
pub async fn stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Json<StorageStatsReport>> {
    Ok(Json(state.service.cache_stats().await?))
}

/// DELETE /api/v1/cache/:city?clear_historical=
pub async fn clear_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<ClearParams>,
) -> ApiResult<Json<ClearReport>> {
    let clear_historical = match params.clear_historical.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
        Some(v) => {
            return Err(WeatherError::invalid(
                "clear_historical",
                format!("'{}' is not a boolean", v),
            )
            .into())
        }
    };
    Ok(Json(state.service.clear_cache(&city, clear_historical).await?))
}

/// POST /api/v1/cache/populate/:city?days_back=&delay=
///
/// The run happens on its own task and the response is sent when it ends.
/// If the client goes away the handler future is dropped and the run stops
/// after the date in flight.
pub async fn populate_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<PopulateParams>,
) -> ApiResult<Json<PopulationReport>> {
    let days_back: u32 = parse_number("days_back", params.days_back.as_deref())?;
    let delay = match params.delay.as_deref() {
        None => population_delay(None)?,
        delay => population_delay(Some(parse_number("delay", delay)?))?,
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    info!(city = %city, days_back, delay_ms = delay.as_millis() as u64, "Population requested");
    let request = PopulationRequest::new(city, days_back, delay);
    let task = tokio::spawn(async move { state.service.populate_historical(request, cancel).await });

    let report = task
        .await
        .map_err(|e| WeatherError::Internal(format!("population task failed: {}", e)))?;
    guard.disarm();

    Ok(Json(report?))
}
