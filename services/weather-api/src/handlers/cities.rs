//! City lookup endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::{Deserialize, Serialize};

use weather_common::City;

use super::{parse_number, required};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CityListResponse {
    pub cities: Vec<City>,
}

#[derive(Debug, Serialize)]
pub struct CitySearchResponse {
    pub results: Vec<City>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/v1/cities/list
pub async fn list_handler(Extension(state): Extension<Arc<AppState>>) -> Json<CityListResponse> {
    Json(CityListResponse {
        cities: state.service.list_cities(),
    })
}

/// GET /api/v1/cities/search?q=&limit=
///
/// `q` is a name fragment, a `city,cc` identifier or a two-letter country
/// code. `limit` defaults to 1.
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<CitySearchResponse>> {
    let q = required("q", params.q.as_deref())?;
    let limit = match params.limit.as_deref() {
        None => 1,
        limit => parse_number("limit", limit)?,
    };
    Ok(Json(CitySearchResponse {
        results: state.service.search_cities(q, limit)?,
    }))
}
