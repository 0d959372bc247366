//! Geographic math for garden-plot polygons.
//!
//! Everything here is pure and synchronous: coordinate validation,
//! polygon area, point-in-polygon, bounds/centroid, and viewport zoom
//! fitting. Inputs are small rings (well under 200 vertices), so the
//! straightforward O(n) formulas are all we need.

pub mod area;
pub mod bounds;
pub mod point;
pub mod viewport;

pub use area::{point_in_polygon, polygon_area_sqm, EARTH_RADIUS_M};
pub use bounds::{bounds_of, centroid_of, GeoBounds};
pub use point::LatLon;
pub use viewport::{optimal_zoom, MAX_ZOOM, MIN_ZOOM, TILE_SIZE_PX};
