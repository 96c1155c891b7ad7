use axum::{extract::FromRef, Router};

use crate::provider::WaqiClient;
use crate::service::StationMapHandle;

mod aqi;
mod health;
mod local;
mod stations;
mod status;
mod viewport;

// ---

/// Shared state for every route. Handlers extract the part they need.
#[derive(Debug, Clone)]
pub struct AppState {
    pub map: StationMapHandle,
    pub waqi: WaqiClient,
}

impl FromRef<AppState> for StationMapHandle {
    fn from_ref(state: &AppState) -> Self {
        state.map.clone()
    }
}

impl FromRef<AppState> for WaqiClient {
    fn from_ref(state: &AppState) -> Self {
        state.waqi.clone()
    }
}

pub fn router(map: StationMapHandle, waqi: WaqiClient) -> Router {
    // ---
    Router::new()
        .merge(stations::router())
        .merge(viewport::router())
        .merge(status::router())
        .merge(local::router())
        .merge(aqi::router())
        .merge(health::router())
        .with_state(AppState { map, waqi })
}
