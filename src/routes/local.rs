//! Conditions at a single point, for the dashboard's location card.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::bounds::Coordinates;
use crate::error::AppError;
use crate::models::LocalAirQuality;
use crate::provider::WaqiClient;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/aqi/local", get(local_air_quality))
}

#[derive(Debug, Deserialize)]
struct PointQuery {
    lat: f64,
    lon: f64,
}

/// Handle `GET /aqi/local?lat=..&lon=..`.
///
/// Asks the provider directly; the answer is not stored in the station index.
async fn local_air_quality(
    Query(params): Query<PointQuery>,
    State(waqi): State<WaqiClient>,
) -> Result<Json<LocalAirQuality>, AppError> {
    // ---
    let point = Coordinates::new(params.lat, params.lon);
    point
        .validate()
        .map_err(|e| AppError::InvalidParameter(e.to_string()))?;

    let local = waqi.fetch_local(point).await?;
    info!(
        "GET /aqi/local - {} reports AQI {:?}",
        local.station_name, local.aqi
    );
    Ok(Json(local))
}
