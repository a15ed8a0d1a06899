use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::models::{Category, Coordinate, NearbyParams, NearbyResponse, Route, RouteParams};
use crate::state::AppState;

use super::error_response;

/// GET /api/nearby?lat=..&lon=..&radius=..&category=..&limit=..
pub async fn nearby(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, (StatusCode, String)> {
    let center = Coordinate {
        lat: params.lat,
        lon: params.lon,
    };
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(Category::from);
    let limit = params.limit.min(100);

    let results = state
        .nearby
        .nearby(center, params.radius, category, limit)
        .await
        .map_err(error_response)?;
    Ok(Json(NearbyResponse {
        total: results.len(),
        results,
    }))
}

/// GET /api/route?from=..&to=..
pub async fn route(
    State(state): State<AppState>,
    Query(params): Query<RouteParams>,
) -> Result<Json<Route>, (StatusCode, String)> {
    let route = state
        .routes
        .route(params.from, params.to)
        .await
        .map_err(error_response)?;
    Ok(Json(route))
}
