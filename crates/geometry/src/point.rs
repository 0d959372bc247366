//! WGS84 coordinate pair with validity checks.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// A coordinate is usable iff both components are finite and within
    /// latitude [-90, 90] / longitude [-180, 180].
    ///
    /// Geometry functions filter on this before doing any math, so NaN and
    /// out-of-range junk from a remote response never reaches a formula.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}
