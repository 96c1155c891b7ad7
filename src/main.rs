//! Application entry point for the `airwatch-stations` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Spawning the station map task with the WAQI client as its source
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `WAQI_TOKEN` (**required**) – WAQI API token
//! - `HTTP_PORT` (optional) – listen port (default: 8080)
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the remaining tunables.
use std::{env, net::SocketAddr};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use airwatch_stations::{config, routes, service, WaqiClient};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let waqi = WaqiClient::new(&cfg.waqi_api_url, &cfg.waqi_token);
    let (map, map_task) =
        service::spawn(waqi.clone(), cfg.station_map_settings(), cfg.home.clone())
            .map_err(|e| anyhow::anyhow!("Failed to start station map: {}", e))?;

    // Build app from routes gateway
    let app: Router = routes::router(map, waqi);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    // The router owned the last handle; the map task winds down on its own
    map_task.await?;
    Ok(())
}

// ---

/// Install the global tracing subscriber.
///
/// Output is compact, with target, file and line. Colour follows
/// `FORCE_COLOR` (`1|true|yes` on, `0|false|no` off) and otherwise a TTY
/// check. `AXUM_SPAN_EVENTS` picks span events: `full`, `enter_exit`, or
/// close-only by default.
///
/// `RUST_LOG` wins when set. Otherwise `AXUM_LOG_LEVEL` applies to this
/// crate and the HTTP stack underneath it is held at `info`, so a `trace`
/// run shows debounce and merge decisions without connection-pool noise.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => {
            let level = env::var("AXUM_LOG_LEVEL").ok();
            EnvFilter::new(default_directives(level.as_deref()))
        }
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

/// Filter directives for a given `AXUM_LOG_LEVEL`; unknown or unset means
/// `debug`.
fn default_directives(level: Option<&str>) -> String {
    // ---
    let level = match level {
        Some(l @ ("trace" | "debug" | "info" | "warn" | "error")) => l,
        _ => "debug",
    };
    let stack = if level == "trace" || level == "debug" { "info" } else { level };
    format!("{level},airwatch_stations={level},hyper={stack},reqwest={stack},h2={stack}")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_directives() {
        // ---
        assert_eq!(
            default_directives(None),
            "debug,airwatch_stations=debug,hyper=info,reqwest=info,h2=info"
        );
        assert_eq!(
            default_directives(Some("warn")),
            "warn,airwatch_stations=warn,hyper=warn,reqwest=warn,h2=warn"
        );
        assert_eq!(default_directives(Some("loud")), default_directives(Some("debug")));
        assert!(EnvFilter::try_new(default_directives(Some("trace"))).is_ok());
    }
}
