//! Configuration loader for the `airwatch-stations` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::bounds::Coordinates;
use crate::provider::DEFAULT_WAQI_API_URL;
use crate::service::{LocationContext, StationMapSettings};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional floating point environment variable.
macro_rules! parse_env_f64 {
    ($var_name:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// WAQI API token.
    pub waqi_token: String,

    /// WAQI API base URL.
    pub waqi_api_url: String,

    /// Quiet period before a viewport change triggers a fetch.
    pub debounce_ms: u32,

    /// Edge length of a spatial index grid cell, in degrees.
    pub grid_cell_degrees: f64,

    /// Capacity of the service command channel.
    pub command_queue_depth: u32,

    /// Port the HTTP server binds on.
    pub http_port: u16,

    /// Optional home location used to prime the first fetch.
    pub home: Option<LocationContext>,

    /// Half-width of the initial viewport around `home`, in degrees.
    pub home_span_degrees: f64,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `WAQI_TOKEN` – WAQI API token
///
/// Optional:
/// - `WAQI_API_URL` – API base URL (default: `https://api.waqi.info`)
/// - `DEBOUNCE_MS` – viewport debounce window (default: 300)
/// - `GRID_CELL_DEGREES` – index cell size (default: 1.0)
/// - `COMMAND_QUEUE_DEPTH` – service channel capacity (default: 64)
/// - `HTTP_PORT` – listen port (default: 8080)
/// - `HOME_LAT` / `HOME_LON` – home location, both or neither
/// - `HOME_NAME` – display name for the home location (default: empty)
/// - `HOME_SPAN_DEGREES` – initial viewport half-width (default: 5.0)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let waqi_token = require_env!("WAQI_TOKEN");
    let waqi_api_url =
        env::var("WAQI_API_URL").unwrap_or_else(|_| DEFAULT_WAQI_API_URL.to_string());
    let debounce_ms = parse_env_u32!("DEBOUNCE_MS", 300);
    let grid_cell_degrees = parse_env_f64!("GRID_CELL_DEGREES").unwrap_or(1.0);
    let command_queue_depth = parse_env_u32!("COMMAND_QUEUE_DEPTH", 64);
    let http_port = u16::try_from(parse_env_u32!("HTTP_PORT", 8080))
        .map_err(|e| anyhow!("Invalid HTTP_PORT: {}", e))?;
    let home_span_degrees = parse_env_f64!("HOME_SPAN_DEGREES").unwrap_or(5.0);

    let home = match (parse_env_f64!("HOME_LAT"), parse_env_f64!("HOME_LON")) {
        (Some(lat), Some(lon)) => {
            let home = Coordinates::new(lat, lon);
            home.validate()
                .map_err(|e| anyhow!("Invalid HOME_LAT/HOME_LON: {}", e))?;
            Some(LocationContext {
                home,
                name: env::var("HOME_NAME").unwrap_or_default(),
            })
        }
        (None, None) => None,
        _ => bail!("HOME_LAT and HOME_LON must be set together"),
    };

    if !grid_cell_degrees.is_finite() || grid_cell_degrees <= 0.0 || grid_cell_degrees > 180.0 {
        bail!("Invalid GRID_CELL_DEGREES: {}", grid_cell_degrees);
    }

    Ok(Config {
        waqi_token,
        waqi_api_url,
        debounce_ms,
        grid_cell_degrees,
        command_queue_depth,
        http_port,
        home,
        home_span_degrees,
    })
}

impl Config {
    // ---
    pub fn station_map_settings(&self) -> StationMapSettings {
        StationMapSettings {
            debounce: Duration::from_millis(u64::from(self.debounce_ms)),
            cell_degrees: self.grid_cell_degrees,
            queue_depth: self.command_queue_depth as usize,
            home_span_degrees: self.home_span_degrees,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the API token while showing all other configuration values that
    /// were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_token = mask_secret(&self.waqi_token);

        tracing::info!("Configuration loaded:");
        tracing::info!("  WAQI_TOKEN          : {}", masked_token);
        tracing::info!("  WAQI_API_URL        : {}", self.waqi_api_url);
        tracing::info!("  DEBOUNCE_MS         : {}", self.debounce_ms);
        tracing::info!("  GRID_CELL_DEGREES   : {}", self.grid_cell_degrees);
        tracing::info!("  COMMAND_QUEUE_DEPTH : {}", self.command_queue_depth);
        tracing::info!("  HTTP_PORT           : {}", self.http_port);
        match &self.home {
            Some(loc) => tracing::info!(
                "  HOME                : {} ({}, {}) ±{}°",
                loc.name,
                loc.home.lat,
                loc.home.lon,
                self.home_span_degrees
            ),
            None => tracing::info!("  HOME                : <unset>"),
        }
    }
}

/// Keep the last four characters of a secret, star out the rest.
fn mask_secret(secret: &str) -> String {
    // ---
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
