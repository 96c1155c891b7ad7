//! Viewport change events from the map widget.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::debug;

use crate::bounds::BoundingBox;
use crate::error::AppError;
use crate::service::StationMapHandle;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/viewport", post(viewport_changed))
}

/// Handle `POST /viewport`.
///
/// Accepts the new bounding box and returns `202 Accepted` once it is queued.
/// Fetching happens later, after the viewport has settled.
async fn viewport_changed(
    State(map): State<StationMapHandle>,
    Json(viewport): Json<BoundingBox>,
) -> Result<StatusCode, AppError> {
    // ---
    debug!("POST /viewport - {:?}", viewport);
    map.viewport_changed(viewport).await?;
    Ok(StatusCode::ACCEPTED)
}
