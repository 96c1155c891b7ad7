//! Outbound fetch boundary: where station readings for a viewport come from.
//!
//! [`WaqiClient`] talks to the World Air Quality Index map-bounds endpoint,
//! and to the geo feed for the conditions at a single point. Tests and
//! alternative providers implement [`StationSource`] directly.

use std::future::Future;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::bounds::{BoundingBox, Coordinates};
use crate::models::{LocalAirQuality, RawFeed, RawStation};

pub const DEFAULT_WAQI_API_URL: &str = "https://api.waqi.info";

// ---

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider reported an error: {0}")]
    Provider(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// Anything that can list the stations inside a bounding box.
pub trait StationSource: Send + Sync + 'static {
    /// Fetch raw station records for `viewport`.
    ///
    /// Individual malformed records should be skipped rather than failing
    /// the whole call.
    fn fetch(
        &self,
        viewport: BoundingBox,
    ) -> impl Future<Output = Result<Vec<RawStation>, FetchError>> + Send;
}

// ---

/// Client for `GET /v2/map/bounds/?latlng=S,W,N,E&token=...` and
/// `GET /feed/geo:LAT;LON/?token=...`.
#[derive(Debug, Clone)]
pub struct WaqiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl WaqiClient {
    // ---
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        // ---
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: token.into(),
        }
    }

    fn bounds_url(&self) -> String {
        format!("{}/v2/map/bounds/", self.base_url)
    }

    fn feed_url(&self, point: &Coordinates) -> String {
        format!("{}/feed/geo:{};{}/", self.base_url, point.lat, point.lon)
    }

    /// Current conditions, with pollutant breakdown, at the station nearest
    /// `point`.
    pub async fn fetch_local(&self, point: Coordinates) -> Result<LocalAirQuality, FetchError> {
        // ---
        debug!("Fetching local air quality at {};{}", point.lat, point.lon);

        let response: serde_json::Value = self
            .client
            .get(self.feed_url(&point))
            .query(&[("token", self.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_feed_response(&response)
    }

    /// One request for a box that does not wrap the antimeridian.
    async fn fetch_plain(&self, bbox: BoundingBox) -> Result<Vec<RawStation>, FetchError> {
        // ---
        let latlng = format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east);
        debug!("Fetching stations for latlng={}", latlng);

        let response: serde_json::Value = self
            .client
            .get(self.bounds_url())
            .query(&[("latlng", latlng.as_str()), ("token", self.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_bounds_response(&response)
    }
}

impl StationSource for WaqiClient {
    fn fetch(
        &self,
        viewport: BoundingBox,
    ) -> impl Future<Output = Result<Vec<RawStation>, FetchError>> + Send {
        // ---
        let this = self.clone();
        async move {
            let mut all = Vec::new();
            for part in viewport.split() {
                all.extend(this.fetch_plain(part).await?);
            }
            info!("Fetched {} station records", all.len());
            Ok(all)
        }
    }
}

/// The `data` member of an `"ok"` response, or the provider's error message.
fn response_data(response: &serde_json::Value) -> Result<&serde_json::Value, FetchError> {
    // ---
    let status = response.get("status").and_then(|s| s.as_str());
    if status != Some("ok") {
        let message = match response.get("data") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Object(o)) => o
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string(),
            _ => format!("status {:?}", status.unwrap_or("missing")),
        };
        return Err(FetchError::Provider(message));
    }

    response
        .get("data")
        .ok_or_else(|| FetchError::Malformed("'data' missing".into()))
}

/// Decode a map-bounds response body.
///
/// Records that fail to deserialize are logged and skipped.
pub fn parse_bounds_response(
    response: &serde_json::Value,
) -> Result<Vec<RawStation>, FetchError> {
    // ---
    let data = response_data(response)?
        .as_array()
        .ok_or_else(|| FetchError::Malformed("'data' is not an array".into()))?;

    let mut stations = Vec::with_capacity(data.len());
    for (i, item) in data.iter().enumerate() {
        match serde_json::from_value::<RawStation>(item.clone()) {
            Ok(station) => stations.push(station),
            Err(e) => {
                debug!("Failed to parse station {}: {} - Raw item: {}", i, e, item);
            }
        }
    }
    Ok(stations)
}

/// Decode a geo feed response body.
pub fn parse_feed_response(response: &serde_json::Value) -> Result<LocalAirQuality, FetchError> {
    // ---
    let data = response_data(response)?;
    let feed = serde_json::from_value::<RawFeed>(data.clone())
        .map_err(|e| FetchError::Malformed(format!("feed data: {}", e)))?;
    Ok(LocalAirQuality::from(feed))
}
