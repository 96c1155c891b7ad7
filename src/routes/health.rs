// src/routes/health.rs
//! Liveness check for the station map service.
//!
//! `GET /health` answers `200` while the station map task is still taking
//! commands, and `503` once it has stopped. It never calls the upstream AQI
//! provider, so a WAQI outage does not mark the service unhealthy.
//!
//! Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::service::StationMapHandle;

use super::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    /// Stations currently indexed; absent when the map task is down.
    #[serde(skip_serializing_if = "Option::is_none")]
    stations: Option<usize>,
}

async fn health(State(map): State<StationMapHandle>) -> (StatusCode, Json<HealthResponse>) {
    // ---
    match map.status().await {
        Ok(report) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                stations: Some(report.stations),
            }),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    stations: None,
                }),
            )
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
