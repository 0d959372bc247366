//! Bounding boxes and centroids over point sets.

use serde::{Deserialize, Serialize};

use crate::point::LatLon;

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Southern latitude boundary.
    pub south: f64,
    /// Western longitude boundary.
    pub west: f64,
    /// Northern latitude boundary.
    pub north: f64,
    /// Eastern longitude boundary.
    pub east: f64,
}

impl GeoBounds {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn contains(&self, p: LatLon) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lon >= self.west && p.lon <= self.east
    }

    /// Expand each side by `ratio` of the box's own span (0.1 adds 10% of
    /// the latitude span on the south and north sides, and likewise for
    /// longitude).
    pub fn padded(&self, ratio: f64) -> Self {
        let dlat = self.lat_span() * ratio;
        let dlon = self.lon_span() * ratio;
        Self {
            south: self.south - dlat,
            west: self.west - dlon,
            north: self.north + dlat,
            east: self.east + dlon,
        }
    }

    /// Expand each side by an absolute margin in degrees.
    pub fn expanded(&self, margin_deg: f64) -> Self {
        Self {
            south: self.south - margin_deg,
            west: self.west - margin_deg,
            north: self.north + margin_deg,
            east: self.east + margin_deg,
        }
    }

    /// Clamp this box into `outer`. Expansion helpers call this so a padded
    /// box never grows past the region of interest.
    pub fn clamped_to(&self, outer: &GeoBounds) -> Self {
        Self {
            south: self.south.max(outer.south),
            west: self.west.max(outer.west),
            north: self.north.min(outer.north),
            east: self.east.min(outer.east),
        }
    }
}

/// Bounding box over the valid points of `points`.
///
/// Returns `None` when no valid point exists; a zero-valued box would be
/// indistinguishable from a real result near (0, 0).
pub fn bounds_of(points: &[LatLon]) -> Option<GeoBounds> {
    let mut valid = points.iter().filter(|p| p.is_valid());
    let first = valid.next()?;
    let mut b = GeoBounds::new(first.lat, first.lon, first.lat, first.lon);
    for p in valid {
        b.south = b.south.min(p.lat);
        b.west = b.west.min(p.lon);
        b.north = b.north.max(p.lat);
        b.east = b.east.max(p.lon);
    }
    Some(b)
}

/// Arithmetic-mean centroid of the valid points of `points`.
pub fn centroid_of(points: &[LatLon]) -> Option<LatLon> {
    let mut count = 0usize;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    for p in points.iter().filter(|p| p.is_valid()) {
        count += 1;
        lat_sum += p.lat;
        lon_sum += p.lon;
    }
    if count == 0 {
        return None;
    }
    Some(LatLon::new(lat_sum / count as f64, lon_sum / count as f64))
}
