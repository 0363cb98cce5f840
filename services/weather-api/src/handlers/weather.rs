//! Weather data endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;

use weather_common::parse_date;
use weather_service::{ForecastResponse, StatsResponse, WeatherResponse};

use super::{parse_number, parse_units, required};
use crate::config::DEFAULT_FORECAST_DAYS;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UnitsParams {
    pub units: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastParams {
    pub days: Option<String>,
    pub units: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoricalParams {
    pub date: Option<String>,
    pub units: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub units: Option<String>,
}

/// GET /api/v1/weather/current/:city
pub async fn current_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<UnitsParams>,
) -> ApiResult<Json<WeatherResponse>> {
    let units = parse_units(params.units.as_deref())?;
    Ok(Json(state.service.current_weather(&city, units).await?))
}

/// GET /api/v1/weather/forecast/:city
pub async fn forecast_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<ForecastParams>,
) -> ApiResult<Json<ForecastResponse>> {
    let units = parse_units(params.units.as_deref())?;
    let days = match params.days.as_deref() {
        None => DEFAULT_FORECAST_DAYS,
        days => parse_number("days", days)?,
    };
    Ok(Json(state.service.forecast(&city, days, units).await?))
}

/// GET /api/v1/weather/historical/:city
pub async fn historical_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<HistoricalParams>,
) -> ApiResult<Json<WeatherResponse>> {
    let units = parse_units(params.units.as_deref())?;
    let date = parse_date("date", required("date", params.date.as_deref())?)?;
    Ok(Json(state.service.historical(&city, date, units).await?))
}

/// GET /api/v1/weather/stats/:city
pub async fn stats_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<StatsParams>,
) -> ApiResult<Json<StatsResponse>> {
    let units = parse_units(params.units.as_deref())?;
    let start = parse_date("start_date", required("start_date", params.start_date.as_deref())?)?;
    let end = parse_date("end_date", required("end_date", params.end_date.as_deref())?)?;
    Ok(Json(state.service.stats(&city, start, end, units).await?))
}
