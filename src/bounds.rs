//! Geographic primitives shared by the station index and the refresh loop.
//!
//! A [`BoundingBox`] whose `west` edge is greater than its `east` edge wraps
//! the antimeridian. Such a box is handled as the union of two longitude
//! ranges (`[west, 180]` and `[-180, east]`) rather than being normalized.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

// ---

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("south edge {south} is north of north edge {north}")]
    Inverted { south: f64, north: f64 },
}

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    // ---
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check both components are finite and inside their valid ranges.
    pub fn validate(&self) -> Result<(), BoundsError> {
        // ---
        check_lat(self.lat)?;
        check_lon(self.lon)?;
        Ok(())
    }
}

fn check_lat(lat: f64) -> Result<(), BoundsError> {
    // NaN fails the range test too
    if (MIN_LAT..=MAX_LAT).contains(&lat) {
        Ok(())
    } else {
        Err(BoundsError::LatitudeOutOfRange(lat))
    }
}

fn check_lon(lon: f64) -> Result<(), BoundsError> {
    if (MIN_LON..=MAX_LON).contains(&lon) {
        Ok(())
    } else {
        Err(BoundsError::LongitudeOutOfRange(lon))
    }
}

// ---

/// Rectangular query region in latitude/longitude space.
///
/// All four edges are inclusive. Construct through [`BoundingBox::new`] or
/// [`BoundingBox::around`] to get a validated box; deserialized boxes should
/// be checked with [`BoundingBox::validate`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    // ---
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, BoundsError> {
        // ---
        let bbox = Self {
            south,
            west,
            north,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Box of `half_span` degrees in every direction around a point.
    ///
    /// Latitudes are clamped to the poles. Longitudes that run past the
    /// antimeridian wrap, producing a wrap-around box; a span covering the
    /// whole globe yields `[-180, 180]`.
    pub fn around(center: Coordinates, half_span: f64) -> Result<Self, BoundsError> {
        // ---
        center.validate()?;
        let half_span = half_span.abs();

        let south = (center.lat - half_span).max(MIN_LAT);
        let north = (center.lat + half_span).min(MAX_LAT);

        let (west, east) = if half_span >= 180.0 {
            (MIN_LON, MAX_LON)
        } else {
            (
                wrap_lon(center.lon - half_span),
                wrap_lon(center.lon + half_span),
            )
        };

        Self::new(south, west, north, east)
    }

    pub fn validate(&self) -> Result<(), BoundsError> {
        // ---
        check_lat(self.south)?;
        check_lat(self.north)?;
        check_lon(self.west)?;
        check_lon(self.east)?;
        if self.south > self.north {
            return Err(BoundsError::Inverted {
                south: self.south,
                north: self.north,
            });
        }
        Ok(())
    }

    /// True when the box crosses the antimeridian.
    pub fn wraps_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// The one or two plain longitude ranges this box covers, as
    /// `(west, east)` pairs with `west <= east`.
    pub fn lon_ranges(&self) -> Vec<(f64, f64)> {
        // ---
        if self.wraps_antimeridian() {
            vec![(self.west, MAX_LON), (MIN_LON, self.east)]
        } else {
            vec![(self.west, self.east)]
        }
    }

    /// Split into boxes that do not wrap the antimeridian.
    pub fn split(&self) -> Vec<BoundingBox> {
        // ---
        self.lon_ranges()
            .into_iter()
            .map(|(west, east)| BoundingBox {
                south: self.south,
                west,
                north: self.north,
                east,
            })
            .collect()
    }

    /// Inclusive containment test on all four edges.
    pub fn contains(&self, point: &Coordinates) -> bool {
        // ---
        if point.lat < self.south || point.lat > self.north {
            return false;
        }
        self.lon_ranges()
            .iter()
            .any(|(west, east)| point.lon >= *west && point.lon <= *east)
    }
}

/// Bring a longitude that overshot by less than a full turn back into range.
fn wrap_lon(lon: f64) -> f64 {
    // ---
    if lon > MAX_LON {
        lon - 360.0
    } else if lon < MIN_LON {
        lon + 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_rejects_out_of_range_edges() {
        // ---
        assert_eq!(
            BoundingBox::new(-91.0, 0.0, 10.0, 10.0),
            Err(BoundsError::LatitudeOutOfRange(-91.0))
        );
        assert_eq!(
            BoundingBox::new(0.0, 0.0, 10.0, 181.0),
            Err(BoundsError::LongitudeOutOfRange(181.0))
        );
        assert!(BoundingBox::new(0.0, f64::NAN, 10.0, 10.0).is_err());
    }

    #[test]
    fn test_rejects_inverted_latitudes() {
        // ---
        let err = BoundingBox::new(20.0, 0.0, 10.0, 10.0).unwrap_err();
        assert_eq!(
            err,
            BoundsError::Inverted {
                south: 20.0,
                north: 10.0
            }
        );
    }

    #[test]
    fn test_contains_is_inclusive() {
        // ---
        let bbox = BoundingBox::new(0.0, 0.0, 30.0, 30.0).unwrap();
        assert!(bbox.contains(&Coordinates::new(0.0, 0.0)));
        assert!(bbox.contains(&Coordinates::new(30.0, 30.0)));
        assert!(bbox.contains(&Coordinates::new(15.0, 30.0)));
        assert!(!bbox.contains(&Coordinates::new(30.000001, 15.0)));
        assert!(!bbox.contains(&Coordinates::new(15.0, -0.000001)));
    }

    #[test]
    fn test_zero_area_box_contains_only_its_point() {
        // ---
        let bbox = BoundingBox::new(10.0, 10.0, 10.0, 10.0).unwrap();
        assert!(bbox.contains(&Coordinates::new(10.0, 10.0)));
        assert!(!bbox.contains(&Coordinates::new(10.0, 10.0001)));
    }

    #[test]
    fn test_antimeridian_box() {
        // ---
        let bbox = BoundingBox::new(-10.0, 170.0, 10.0, -170.0).unwrap();
        assert!(bbox.wraps_antimeridian());
        assert_eq!(bbox.lon_ranges(), vec![(170.0, 180.0), (-180.0, -170.0)]);
        assert!(bbox.contains(&Coordinates::new(0.0, 175.0)));
        assert!(bbox.contains(&Coordinates::new(0.0, -175.0)));
        assert!(!bbox.contains(&Coordinates::new(0.0, 0.0)));
        assert_eq!(bbox.split().len(), 2);
    }

    #[test]
    fn test_around_clamps_and_wraps() {
        // ---
        let near_pole = BoundingBox::around(Coordinates::new(88.0, 0.0), 5.0).unwrap();
        assert_eq!(near_pole.north, 90.0);
        assert_eq!(near_pole.south, 83.0);

        let fiji = BoundingBox::around(Coordinates::new(-17.0, 178.0), 5.0).unwrap();
        assert!(fiji.wraps_antimeridian());
        assert_eq!(fiji.west, 173.0);
        assert_eq!(fiji.east, -177.0);

        let world = BoundingBox::around(Coordinates::new(0.0, 0.0), 200.0).unwrap();
        assert_eq!((world.west, world.east), (-180.0, 180.0));
    }
}
