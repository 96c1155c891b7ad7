//! Marker queries for the map widget.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::aqi::most_polluted;
use crate::bounds::BoundingBox;
use crate::error::AppError;
use crate::models::StationView;
use crate::service::StationMapHandle;

use super::AppState;

const DEFAULT_TOP_LIMIT: usize = 6;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/stations", get(stations_in_box))
        .route("/stations/top", get(top_polluted))
        .route("/stations/{id}", get(station_by_id))
}

/// Query parameters describing a viewport.
#[derive(Debug, Deserialize)]
pub struct BoxQuery {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl BoxQuery {
    fn to_bbox(&self) -> Result<BoundingBox, AppError> {
        Ok(BoundingBox::new(self.south, self.west, self.north, self.east)?)
    }
}

/// `BoxQuery` plus a result limit. Fields are repeated rather than flattened
/// because flattening breaks numeric parsing of query strings.
#[derive(Debug, Deserialize)]
pub struct TopQuery {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
    limit: Option<usize>,
}

async fn stations_in_box(
    Query(params): Query<BoxQuery>,
    State(map): State<StationMapHandle>,
) -> Result<Json<Vec<StationView>>, AppError> {
    // ---
    let bbox = params.to_bbox()?;
    let readings = map.query(bbox).await?;
    debug!("GET /stations - {} stations in {:?}", readings.len(), bbox);

    Ok(Json(readings.iter().map(StationView::from).collect()))
}

async fn top_polluted(
    Query(params): Query<TopQuery>,
    State(map): State<StationMapHandle>,
) -> Result<Json<Vec<StationView>>, AppError> {
    // ---
    let bbox = BoundingBox::new(params.south, params.west, params.north, params.east)?;
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);

    let readings = map.query(bbox).await?;
    let top = most_polluted(readings, limit, |r| r.aqi);
    info!("GET /stations/top - returning {} stations", top.len());

    Ok(Json(top.iter().map(StationView::from).collect()))
}

async fn station_by_id(
    Path(id): Path<String>,
    State(map): State<StationMapHandle>,
) -> Result<Json<StationView>, AppError> {
    // ---
    match map.lookup(id.clone()).await? {
        Some(reading) => Ok(Json(StationView::from(&reading))),
        None => Err(AppError::NotFound(id)),
    }
}
