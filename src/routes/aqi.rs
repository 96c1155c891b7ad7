//! Stateless AQI helpers exposed over HTTP.

use axum::{extract::Query, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::aqi::{aqi_from_pm25, health_recommendation, AqiCategory, HealthRecommendation};
use crate::error::AppError;

// ---

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/aqi/recommendation", get(recommendation))
        .route("/aqi/pm25", get(pm25))
}

#[derive(Debug, Deserialize)]
struct AqiQuery {
    aqi: u32,
}

#[derive(Debug, Deserialize)]
struct Pm25Query {
    concentration: f64,
}

#[derive(Debug, Serialize)]
struct RecommendationResponse {
    aqi: u32,
    category: &'static str,
    color: &'static str,
    recommendation: HealthRecommendation,
}

#[derive(Debug, Serialize)]
struct Pm25Response {
    concentration: f64,
    aqi: u32,
    category: &'static str,
    color: &'static str,
}

async fn recommendation(Query(params): Query<AqiQuery>) -> Json<RecommendationResponse> {
    // ---
    let category = AqiCategory::from_aqi(params.aqi);
    Json(RecommendationResponse {
        aqi: params.aqi,
        category: category.label(),
        color: category.color(),
        recommendation: health_recommendation(params.aqi),
    })
}

async fn pm25(Query(params): Query<Pm25Query>) -> Result<Json<Pm25Response>, AppError> {
    // ---
    let aqi = aqi_from_pm25(params.concentration).ok_or_else(|| {
        AppError::InvalidParameter(format!(
            "concentration must be a non-negative number, got {}",
            params.concentration
        ))
    })?;
    let category = AqiCategory::from_aqi(aqi);
    Ok(Json(Pm25Response {
        concentration: params.concentration,
        aqi,
        category: category.label(),
        color: category.color(),
    }))
}
