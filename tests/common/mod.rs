#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use airwatch_stations::provider::parse_bounds_response;
use airwatch_stations::{BoundingBox, FetchError, RawStation, StationSource};

/// In-memory provider that records every viewport it is asked for.
#[derive(Clone, Default)]
pub struct RecordingSource {
    pub calls: Arc<Mutex<Vec<BoundingBox>>>,
    pub records: Vec<Value>,
    pub delay: Duration,
    pub fail: bool,
}

impl RecordingSource {
    // ---
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<BoundingBox> {
        self.calls.lock().unwrap().clone()
    }
}

impl StationSource for RecordingSource {
    fn fetch(
        &self,
        viewport: BoundingBox,
    ) -> impl Future<Output = Result<Vec<RawStation>, FetchError>> + Send {
        // ---
        self.calls.lock().unwrap().push(viewport);
        let this = self.clone();
        async move {
            if !this.delay.is_zero() {
                tokio::time::sleep(this.delay).await;
            }
            if this.fail {
                return Err(FetchError::Provider("upstream unavailable".into()));
            }
            parse_bounds_response(&json!({ "status": "ok", "data": this.records }))
        }
    }
}

pub fn station(uid: &str, lat: f64, lon: f64, aqi: u32, name: &str) -> Value {
    json!({ "uid": uid, "lat": lat, "lon": lon, "aqi": aqi.to_string(), "station": { "name": name } })
}

/// Stations A(10,10,40), B(20,20,120), C(50,50,300).
pub fn abc_records() -> Vec<Value> {
    vec![
        station("A", 10.0, 10.0, 40, "Station A"),
        station("B", 20.0, 20.0, 120, "Station B"),
        station("C", 50.0, 50.0, 300, "Station C"),
    ]
}

pub fn bbox(south: f64, west: f64, north: f64, east: f64) -> BoundingBox {
    BoundingBox::new(south, west, north, east).unwrap()
}
