use axum::{extract::State, routing::get, Json, Router};

use crate::error::AppError;
use crate::service::{StationMapHandle, StatusReport};

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

async fn status(State(map): State<StationMapHandle>) -> Result<Json<StatusReport>, AppError> {
    Ok(Json(map.status().await?))
}
