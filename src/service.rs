//! The station map service: one task that owns the index and the refresh
//! controller.
//!
//! Nothing here is shared behind a lock. HTTP handlers (or any other caller)
//! hold a cloneable [`StationMapHandle`] and talk to the task over a channel.
//! The task's loop waits on three things at once:
//! - the next command from a handle
//! - the debounce deadline, when one is armed
//! - the single in-flight fetch, when there is one
//!
//! Queries are answered from the index immediately, including while a fetch
//! is outstanding. A superseded fetch is not cancelled; its results still
//! describe real stations and are merged when it completes.

use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::bounds::{BoundingBox, BoundsError, Coordinates};
use crate::index::{IndexError, InsertOutcome, SpatialStationIndex, DEFAULT_CELL_DEGREES};
use crate::models::{RawStation, StationReading};
use crate::provider::{FetchError, StationSource};
use crate::refresh::{
    FetchRequest, FetchTicket, RefreshPhase, ViewportRefreshController, DEFAULT_DEBOUNCE,
};

// ---

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("station map service has stopped")]
    Stopped,

    #[error("invalid bounding box: {0}")]
    InvalidBounds(#[from] BoundsError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// The user's chosen home location, passed in explicitly at startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationContext {
    pub home: Coordinates,
    pub name: String,
}

/// Tunables for [`spawn`].
#[derive(Debug, Clone)]
pub struct StationMapSettings {
    pub debounce: Duration,
    pub cell_degrees: f64,
    pub queue_depth: usize,
    /// Half-width of the initial viewport around the home location.
    pub home_span_degrees: f64,
}

impl Default for StationMapSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            cell_degrees: DEFAULT_CELL_DEGREES,
            queue_depth: 64,
            home_span_degrees: 5.0,
        }
    }
}

/// Per-fetch merge tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub phase: RefreshPhase,
    pub latest_viewport: Option<BoundingBox>,
    pub stations: usize,
    pub fetches_issued: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub last_merge: Option<MergeStats>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub location: Option<LocationContext>,
}

// ---

enum Command {
    ViewportChanged(BoundingBox),
    Query {
        viewport: BoundingBox,
        reply: oneshot::Sender<Vec<StationReading>>,
    },
    Lookup {
        id: String,
        reply: oneshot::Sender<Option<StationReading>>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
}

/// Cheap, cloneable access to a running station map. The service stops once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct StationMapHandle {
    tx: mpsc::Sender<Command>,
}

impl StationMapHandle {
    // ---
    /// Report a new map viewport. Returns once the change is queued.
    pub async fn viewport_changed(&self, viewport: BoundingBox) -> Result<(), ServiceError> {
        // ---
        viewport.validate()?;
        self.send(Command::ViewportChanged(viewport)).await
    }

    /// Stations currently known inside `viewport`, in insertion order.
    pub async fn query(
        &self,
        viewport: BoundingBox,
    ) -> Result<Vec<StationReading>, ServiceError> {
        // ---
        viewport.validate()?;
        let (reply, rx) = oneshot::channel();
        self.send(Command::Query { viewport, reply }).await?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    pub async fn lookup(
        &self,
        id: impl Into<String>,
    ) -> Result<Option<StationReading>, ServiceError> {
        // ---
        let (reply, rx) = oneshot::channel();
        self.send(Command::Lookup {
            id: id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    pub async fn status(&self) -> Result<StatusReport, ServiceError> {
        // ---
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    async fn send(&self, cmd: Command) -> Result<(), ServiceError> {
        self.tx.send(cmd).await.map_err(|_| ServiceError::Stopped)
    }
}

// ---

type FetchOutcome = (FetchTicket, Result<Vec<RawStation>, FetchError>);
type InFlight = Pin<Box<dyn Future<Output = FetchOutcome> + Send>>;

struct StationMap<S> {
    source: Arc<S>,
    index: SpatialStationIndex,
    controller: ViewportRefreshController,
    in_flight: Option<InFlight>,
    location: Option<LocationContext>,
    fetches_succeeded: u64,
    fetches_failed: u64,
    last_merge: Option<MergeStats>,
    last_refresh: Option<DateTime<Utc>>,
}

/// Start the station map task.
///
/// When a location context is supplied, a viewport around the home location
/// is armed straight away so the first fetch happens without waiting for the
/// map widget.
pub fn spawn<S: StationSource>(
    source: S,
    settings: StationMapSettings,
    location: Option<LocationContext>,
) -> Result<(StationMapHandle, JoinHandle<()>), ServiceError> {
    // ---
    let index = SpatialStationIndex::new(settings.cell_degrees)?;
    let mut controller = ViewportRefreshController::new(settings.debounce);

    if let Some(loc) = &location {
        let viewport = BoundingBox::around(loc.home, settings.home_span_degrees)?;
        info!("Priming viewport around home location '{}'", loc.name);
        controller.viewport_changed(viewport, Instant::now());
    }

    let (tx, rx) = mpsc::channel(settings.queue_depth.max(1));
    let map = StationMap {
        source: Arc::new(source),
        index,
        controller,
        in_flight: None,
        location,
        fetches_succeeded: 0,
        fetches_failed: 0,
        last_merge: None,
        last_refresh: None,
    };

    let task = tokio::spawn(map.run(rx));
    Ok((StationMapHandle { tx }, task))
}

impl<S: StationSource> StationMap<S> {
    // ---
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        // ---
        info!(
            "Station map started (debounce {:?}, grid {}°)",
            self.controller.debounce(),
            self.index.cell_degrees()
        );

        loop {
            let deadline = self.controller.deadline();

            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => {
                        info!("All station map handles dropped, stopping");
                        break;
                    }
                },
                _ = wait_until(deadline) => {
                    if let Some(request) = self.controller.poll(Instant::now()) {
                        self.start_fetch(request);
                    }
                }
                (ticket, result) = next_completion(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.finish_fetch(ticket, result);
                }
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        // ---
        match cmd {
            Command::ViewportChanged(viewport) => {
                self.controller.viewport_changed(viewport, Instant::now());
            }
            Command::Query { viewport, reply } => {
                let results: Vec<StationReading> =
                    self.index.query(&viewport).into_iter().cloned().collect();
                debug!("Query returned {} stations", results.len());
                let _ = reply.send(results);
            }
            Command::Lookup { id, reply } => {
                let _ = reply.send(self.index.get(&id).cloned());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn start_fetch(&mut self, request: FetchRequest) {
        // ---
        let FetchRequest { ticket, viewport } = request;
        info!("Issuing fetch {:?} for {:?}", ticket, viewport);

        let source = Arc::clone(&self.source);
        let fetch: InFlight = Box::pin(async move {
            let result = source.fetch(viewport).await;
            (ticket, result)
        });
        self.in_flight = Some(fetch);
    }

    fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<RawStation>, FetchError>,
    ) {
        // ---
        match result {
            Ok(records) => {
                let stats = self.merge(records);
                info!(
                    "Fetch {:?} merged: {} inserted, {} replaced, {} unchanged, {} rejected ({} stations indexed)",
                    ticket,
                    stats.inserted,
                    stats.replaced,
                    stats.unchanged,
                    stats.rejected,
                    self.index.len()
                );
                self.fetches_succeeded += 1;
                self.last_merge = Some(stats);
                self.last_refresh = Some(Utc::now());
            }
            Err(e) => {
                // The next viewport change is the retry
                error!("Fetch {:?} failed: {}", ticket, e);
                self.fetches_failed += 1;
            }
        }

        self.controller.fetch_completed(ticket, Instant::now());
    }

    fn merge(&mut self, records: Vec<RawStation>) -> MergeStats {
        // ---
        let mut stats = MergeStats::default();
        for raw in records {
            let reading = match StationReading::try_from(raw) {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("Skipping station record: {}", e);
                    stats.rejected += 1;
                    continue;
                }
            };
            match self.index.insert(reading) {
                InsertOutcome::Inserted => stats.inserted += 1,
                InsertOutcome::Replaced => stats.replaced += 1,
                InsertOutcome::Unchanged => stats.unchanged += 1,
                InsertOutcome::Rejected => stats.rejected += 1,
            }
        }
        stats
    }

    fn status(&self) -> StatusReport {
        // ---
        StatusReport {
            phase: self.controller.phase(),
            latest_viewport: self.controller.latest_viewport().copied(),
            stations: self.index.len(),
            fetches_issued: self.controller.fetches_issued(),
            fetches_succeeded: self.fetches_succeeded,
            fetches_failed: self.fetches_failed,
            last_merge: self.last_merge,
            last_refresh: self.last_refresh,
            location: self.location.clone(),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn next_completion(in_flight: &mut Option<InFlight>) -> FetchOutcome {
    match in_flight {
        Some(fut) => fut.as_mut().await,
        None => pending().await,
    }
}
