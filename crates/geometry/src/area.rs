//! Polygon area and containment tests on geographic rings.

use crate::point::LatLon;

/// Mean Earth radius in meters, matching the sphere the remote geometry
/// is interpreted on.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Drop invalid vertices and a duplicated closing vertex.
///
/// Rings are treated as implicitly closed, so `A B C A` and `A B C` must
/// produce identical results downstream.
fn sanitized_ring(ring: &[LatLon]) -> Vec<LatLon> {
    let mut pts: Vec<LatLon> = ring.iter().copied().filter(LatLon::is_valid).collect();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

/// Area of a simple polygon in square meters, rounded to the nearest
/// integer value.
///
/// Uses the spherical-excess accumulation over consecutive vertex pairs.
/// Rings that come out below 1 m² (near-collinear vertices, very small
/// rings) fall back to a planar bounding-box estimate. Fewer than 3 valid
/// vertices yields 0.0 — never an error, never NaN.
pub fn polygon_area_sqm(ring: &[LatLon]) -> f64 {
    let pts = sanitized_ring(ring);
    if pts.len() < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..pts.len() {
        let j = (i + 1) % pts.len();
        let lat_i = pts[i].lat.to_radians();
        let lat_j = pts[j].lat.to_radians();
        let lon_i = pts[i].lon.to_radians();
        let lon_j = pts[j].lon.to_radians();
        sum += (lon_j - lon_i) * (2.0 + lat_i.sin() + lat_j.sin());
    }

    let area = (sum.abs() * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).round();
    if area >= 1.0 {
        return area;
    }

    planar_bbox_area_sqm(&pts)
}

/// Planar fallback: bounding-box area with a cos(latitude) width
/// correction. Only meaningful for the degenerate rings the spherical
/// accumulation cannot resolve.
fn planar_bbox_area_sqm(pts: &[LatLon]) -> f64 {
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    for p in pts {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lon = min_lon.min(p.lon);
        max_lon = max_lon.max(p.lon);
    }

    let dlat = (max_lat - min_lat).to_radians();
    let dlon = (max_lon - min_lon).to_radians();
    let avg_lat = ((min_lat + max_lat) / 2.0).to_radians();
    (EARTH_RADIUS_M * EARTH_RADIUS_M * dlat * dlon * avg_lat.cos()).round()
}

/// Even-odd ray-casting containment test in (lon, lat) pair space.
///
/// Points exactly on an edge are not guaranteed either way; callers test
/// centroids against much larger parcels, where the convention does not
/// matter.
pub fn point_in_polygon(pt: LatLon, ring: &[LatLon]) -> bool {
    if !pt.is_valid() {
        return false;
    }
    let pts = sanitized_ring(ring);
    if pts.len() < 3 {
        return false;
    }

    let (x, y) = (pt.lon, pt.lat);
    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (xi, yi) = (pts[i].lon, pts[i].lat);
        let (xj, yj) = (pts[j].lon, pts[j].lat);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
