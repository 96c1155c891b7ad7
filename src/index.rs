//! In-memory spatial index of station readings.
//!
//! Readings are bucketed into a uniform grid of lat/lon cells. A range query
//! walks only the cells overlapping the requested box, or only the occupied
//! cells when there are fewer of those, so its cost tracks the stations near
//! the box rather than every station ever seen.
//!
//! Duplicate ids replace the stored reading. The replacement keeps the
//! station's original insertion sequence, so query results stay in the same
//! order across refreshes.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use thiserror::Error;
use tracing::{trace, warn};

use crate::bounds::{BoundingBox, Coordinates, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
use crate::models::StationReading;

pub const DEFAULT_CELL_DEGREES: f64 = 1.0;

// ---

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("grid cell size must be finite and within (0, 180] degrees, got {0}")]
    InvalidCellSize(f64),
}

/// What [`SpatialStationIndex::insert`] did with a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New station id.
    Inserted,
    /// Known id, reading differed and was replaced.
    Replaced,
    /// Known id, identical reading; nothing changed.
    Unchanged,
    /// Failed validation; nothing changed.
    Rejected,
}

/// Grid cell address: (row from the south pole, column from -180°).
type CellKey = (u32, u32);

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    cell: CellKey,
    reading: StationReading,
}

#[derive(Debug, Clone)]
pub struct SpatialStationIndex {
    cell_degrees: f64,
    rows: u32,
    cols: u32,
    entries: HashMap<String, Entry>,
    cells: HashMap<CellKey, Vec<String>>,
    next_seq: u64,
}

impl Default for SpatialStationIndex {
    fn default() -> Self {
        Self::with_cell_degrees(DEFAULT_CELL_DEGREES)
    }
}

impl SpatialStationIndex {
    // ---
    pub fn new(cell_degrees: f64) -> Result<Self, IndexError> {
        // ---
        if !cell_degrees.is_finite() || cell_degrees <= 0.0 || cell_degrees > 180.0 {
            return Err(IndexError::InvalidCellSize(cell_degrees));
        }
        Ok(Self::with_cell_degrees(cell_degrees))
    }

    fn with_cell_degrees(cell_degrees: f64) -> Self {
        // ---
        let rows = ((MAX_LAT - MIN_LAT) / cell_degrees).ceil() as u32;
        let cols = ((MAX_LON - MIN_LON) / cell_degrees).ceil() as u32;
        Self {
            cell_degrees,
            rows: rows.max(1),
            cols: cols.max(1),
            entries: HashMap::new(),
            cells: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&StationReading> {
        self.entries.get(id).map(|e| &e.reading)
    }

    /// Add or replace a reading.
    ///
    /// Invalid readings (empty id, coordinates out of range) are logged and
    /// dropped; they never abort the caller's batch.
    pub fn insert(&mut self, reading: StationReading) -> InsertOutcome {
        // ---
        if let Err(e) = reading.validate() {
            warn!("Dropping station reading: {}", e);
            return InsertOutcome::Rejected;
        }

        let cell = self.cell_of(&reading.coordinates);

        if let Some(entry) = self.entries.get_mut(&reading.id) {
            if entry.reading == reading {
                return InsertOutcome::Unchanged;
            }
            let old_cell = entry.cell;
            entry.cell = cell;
            entry.reading = reading;

            if old_cell != cell {
                let id = entry.reading.id.clone();
                self.detach(old_cell, &id);
                self.cells.entry(cell).or_default().push(id);
            }
            return InsertOutcome::Replaced;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let id = reading.id.clone();
        self.cells.entry(cell).or_default().push(id.clone());
        self.entries.insert(id, Entry { seq, cell, reading });
        InsertOutcome::Inserted
    }

    /// Every reading inside `bbox` (inclusive edges), in insertion order.
    pub fn query(&self, bbox: &BoundingBox) -> Vec<&StationReading> {
        // ---
        let ranges = self.cell_ranges(bbox);
        let span: u64 = ranges
            .iter()
            .map(|(rows, cols)| span_of(rows) * span_of(cols))
            .sum();

        let mut hits: Vec<&Entry> = Vec::new();
        let mut collect = |ids: &Vec<String>| {
            for id in ids {
                if let Some(entry) = self.entries.get(id) {
                    if bbox.contains(&entry.reading.coordinates) {
                        hits.push(entry);
                    }
                }
            }
        };

        if span > self.cells.len() as u64 {
            trace!("query scanning {} occupied cells", self.cells.len());
            for (key, ids) in &self.cells {
                if ranges
                    .iter()
                    .any(|(rows, cols)| rows.contains(&key.0) && cols.contains(&key.1))
                {
                    collect(ids);
                }
            }
        } else {
            trace!("query visiting {} grid cells", span);
            for (rows, cols) in &ranges {
                for row in rows.clone() {
                    for col in cols.clone() {
                        if let Some(ids) = self.cells.get(&(row, col)) {
                            collect(ids);
                        }
                    }
                }
            }
        }

        hits.sort_unstable_by_key(|e| e.seq);
        hits.into_iter().map(|e| &e.reading).collect()
    }

    // ---

    fn detach(&mut self, cell: CellKey, id: &str) {
        // ---
        if let Some(ids) = self.cells.get_mut(&cell) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    fn row_of(&self, lat: f64) -> u32 {
        let row = ((lat - MIN_LAT) / self.cell_degrees).floor() as u32;
        row.min(self.rows - 1)
    }

    fn col_of(&self, lon: f64) -> u32 {
        let col = ((lon - MIN_LON) / self.cell_degrees).floor() as u32;
        col.min(self.cols - 1)
    }

    fn cell_of(&self, point: &Coordinates) -> CellKey {
        (self.row_of(point.lat), self.col_of(point.lon))
    }

    /// Disjoint inclusive row and column ranges covering `bbox`, one pair per
    /// plain longitude range.
    ///
    /// A wrapping box whose two halves land in overlapping columns covers
    /// every column, so it collapses to a single full-width range.
    fn cell_ranges(&self, bbox: &BoundingBox) -> Vec<(RangeInclusive<u32>, RangeInclusive<u32>)> {
        // ---
        let rows = self.row_of(bbox.south)..=self.row_of(bbox.north);
        let mut cols: Vec<RangeInclusive<u32>> = bbox
            .lon_ranges()
            .into_iter()
            .map(|(west, east)| self.col_of(west)..=self.col_of(east))
            .collect();

        let overlapping = matches!(
            cols.as_slice(),
            [eastern, western] if western.end() >= eastern.start()
        );
        if overlapping {
            cols = vec![0..=self.cols - 1];
        }

        cols.into_iter().map(|c| (rows.clone(), c)).collect()
    }
}

/// Number of cells in an inclusive range.
fn span_of(range: &RangeInclusive<u32>) -> u64 {
    u64::from(range.end().saturating_sub(*range.start())) + 1
}
