//! `airwatch-stations`: an air-quality station map service.
//!
//! A map widget reports its viewport; the service debounces those reports,
//! fetches monitoring-station readings for the settled viewport from the WAQI
//! API, keeps them in an in-memory spatial index, and answers "which stations
//! are in this box" queries for marker rendering.
//!
//! Module layout:
//! - `bounds`   – coordinates and bounding boxes (antimeridian aware)
//! - `models`   – raw provider records and validated station readings
//! - `index`    – grid-based spatial index keyed by station id
//! - `refresh`  – viewport debounce state machine
//! - `provider` – outbound fetch boundary and the WAQI client
//! - `service`  – the task that owns index + controller, and its handle
//! - `aqi`      – AQI banding, health guidance, PM2.5 conversion
//! - `routes`   – HTTP surface, merged into one router by the gateway
//! - `config`   – environment-driven configuration

pub mod aqi;
pub mod bounds;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod provider;
pub mod refresh;
pub mod routes;
pub mod service;

pub use bounds::{BoundingBox, Coordinates};
pub use config::Config;
pub use index::{InsertOutcome, SpatialStationIndex};
pub use models::{LocalAirQuality, PollutantLevels, RawStation, StationReading, StationView};
pub use provider::{FetchError, StationSource, WaqiClient};
pub use refresh::ViewportRefreshController;
pub use routes::AppState;
pub use service::{LocationContext, StationMapHandle, StationMapSettings};
