//! Station data models: the raw provider record and the validated reading
//! kept by the index.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aqi::AqiCategory;
use crate::bounds::{BoundsError, Coordinates};

// ---

/// Why a raw record could not become a [`StationReading`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadingError {
    #[error("station id is empty")]
    EmptyId,

    #[error("station id {0:?} has surrounding whitespace")]
    UntrimmedId(String),

    #[error("station {0} has no current AQI value")]
    MissingAqi(String),

    #[error("station {id}: {source}")]
    InvalidCoordinates { id: String, source: BoundsError },
}

/// Station identifier as sent by the provider: sometimes a number, sometimes
/// a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawStationId {
    Number(i64),
    Text(String),
}

impl RawStationId {
    // ---
    pub fn into_string(self) -> String {
        match self {
            RawStationId::Number(n) => n.to_string(),
            RawStationId::Text(s) => s.trim().to_string(),
        }
    }
}

/// AQI as sent by the provider. Strings such as `"57"` are common and `"-"`
/// marks a station with no current reading.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAqi {
    Number(f64),
    Text(String),
}

impl RawAqi {
    // ---
    /// Numeric AQI, rounded, or `None` when absent or negative.
    pub fn value(&self) -> Option<u32> {
        // ---
        let n = match self {
            RawAqi::Number(n) => *n,
            RawAqi::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        if n.is_finite() && n >= 0.0 {
            Some(n.round() as u32)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStationMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// One record of a map-bounds response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStation {
    // ---
    #[serde(alias = "id")]
    pub uid: RawStationId,
    pub lat: f64,
    pub lon: f64,
    pub aqi: RawAqi,
    #[serde(default)]
    pub station: RawStationMeta,
}

/// A monitoring station's most recent reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    // ---
    pub id: String,
    pub coordinates: Coordinates,
    pub aqi: u32,
    pub station_name: String,
    pub observed_at: Option<DateTime<FixedOffset>>,
}

impl StationReading {
    // ---
    pub fn new(
        id: impl Into<String>,
        lat: f64,
        lon: f64,
        aqi: u32,
        station_name: impl Into<String>,
    ) -> Self {
        // ---
        Self {
            id: id.into(),
            coordinates: Coordinates::new(lat, lon),
            aqi,
            station_name: station_name.into(),
            observed_at: None,
        }
    }

    /// Data-quality guard applied before a reading enters the index.
    pub fn validate(&self) -> Result<(), ReadingError> {
        // ---
        if self.id.trim().is_empty() {
            return Err(ReadingError::EmptyId);
        }
        if self.id.trim() != self.id {
            return Err(ReadingError::UntrimmedId(self.id.clone()));
        }
        self.coordinates
            .validate()
            .map_err(|source| ReadingError::InvalidCoordinates {
                id: self.id.clone(),
                source,
            })
    }

    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi)
    }
}

impl TryFrom<RawStation> for StationReading {
    type Error = ReadingError;

    fn try_from(raw: RawStation) -> Result<Self, Self::Error> {
        // ---
        let id = raw.uid.into_string();
        if id.is_empty() {
            return Err(ReadingError::EmptyId);
        }
        let aqi = raw
            .aqi
            .value()
            .ok_or_else(|| ReadingError::MissingAqi(id.clone()))?;

        // Unparseable timestamps are dropped; the reading itself is still good
        let observed_at = raw
            .station
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok());

        let reading = StationReading {
            id,
            coordinates: Coordinates::new(raw.lat, raw.lon),
            aqi,
            station_name: raw.station.name,
            observed_at,
        };
        reading.validate()?;
        Ok(reading)
    }
}

/// Marker payload returned to the map widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationView {
    // ---
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub aqi: u32,
    pub station_name: String,
    pub observed_at: Option<DateTime<FixedOffset>>,
    pub category: String,
    pub color: String,
}

impl From<&StationReading> for StationView {
    fn from(reading: &StationReading) -> Self {
        // ---
        let category = reading.category();
        StationView {
            id: reading.id.clone(),
            lat: reading.coordinates.lat,
            lon: reading.coordinates.lon,
            aqi: reading.aqi,
            station_name: reading.station_name.clone(),
            observed_at: reading.observed_at,
            category: category.label().to_string(),
            color: category.color().to_string(),
        }
    }
}

// ---

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawIaqiValue {
    pub v: f64,
}

/// Individual pollutant sub-indices of a feed response. Keys the service
/// does not report (weather readings such as `t`, `h`, `w`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIaqi {
    pub pm25: Option<RawIaqiValue>,
    pub pm10: Option<RawIaqiValue>,
    pub o3: Option<RawIaqiValue>,
    pub no2: Option<RawIaqiValue>,
    pub so2: Option<RawIaqiValue>,
    pub co: Option<RawIaqiValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCity {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFeedTime {
    pub iso: Option<String>,
}

/// The `data` block of a `feed/geo:LAT;LON/` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeed {
    // ---
    pub aqi: RawAqi,
    #[serde(default)]
    pub city: RawCity,
    #[serde(default)]
    pub iaqi: RawIaqi,
    #[serde(default)]
    pub time: RawFeedTime,
    #[serde(default, rename = "dominentpol")]
    pub dominant_pollutant: Option<String>,
}

/// Pollutant breakdown at a location. Absent readings stay `None` rather
/// than being reported as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutantLevels {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
}

impl From<RawIaqi> for PollutantLevels {
    fn from(raw: RawIaqi) -> Self {
        // ---
        let v = |entry: Option<RawIaqiValue>| entry.map(|e| e.v);
        PollutantLevels {
            pm25: v(raw.pm25),
            pm10: v(raw.pm10),
            o3: v(raw.o3),
            no2: v(raw.no2),
            so2: v(raw.so2),
            co: v(raw.co),
        }
    }
}

/// Air quality reported by the station nearest a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalAirQuality {
    // ---
    pub aqi: Option<u32>,
    pub station_name: String,
    pub observed_at: Option<DateTime<FixedOffset>>,
    pub dominant_pollutant: Option<String>,
    pub pollutants: PollutantLevels,
    pub category: Option<String>,
    pub color: Option<String>,
}

impl From<RawFeed> for LocalAirQuality {
    fn from(raw: RawFeed) -> Self {
        // ---
        let aqi = raw.aqi.value();
        let category = aqi.map(AqiCategory::from_aqi);
        LocalAirQuality {
            aqi,
            station_name: raw.city.name,
            observed_at: raw
                .time
                .iso
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok()),
            dominant_pollutant: raw.dominant_pollutant.filter(|p| !p.is_empty()),
            pollutants: PollutantLevels::from(raw.iaqi),
            category: category.map(|c| c.label().to_string()),
            color: category.map(|c| c.color().to_string()),
        }
    }
}
