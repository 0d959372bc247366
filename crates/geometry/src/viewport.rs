//! Zoom-level fitting for a bounding box inside a pixel viewport.

use crate::bounds::GeoBounds;

/// Slippy-map tile edge length in pixels.
pub const TILE_SIZE_PX: f64 = 256.0;
/// Zoom levels below this show far more than the association grounds.
pub const MIN_ZOOM: u8 = 10;
/// Zoom levels above this exceed what the tile providers serve.
pub const MAX_ZOOM: u8 = 22;

/// Integer zoom level at which `bounds` fits a `viewport_w_px` x
/// `viewport_h_px` viewport with `padding_px` reserved on every edge.
///
/// The longitude term carries a cos(latitude) correction for meridian
/// convergence. Degenerate spans (a single point) resolve to `MAX_ZOOM`
/// instead of an unbounded value.
pub fn optimal_zoom(
    bounds: &GeoBounds,
    viewport_w_px: u32,
    viewport_h_px: u32,
    padding_px: u32,
) -> u8 {
    let avail_w = (f64::from(viewport_w_px) - 2.0 * f64::from(padding_px)).max(1.0);
    let avail_h = (f64::from(viewport_h_px) - 2.0 * f64::from(padding_px)).max(1.0);

    let lat_span = bounds.lat_span();
    let lon_span = bounds.lon_span();
    let cos_lat = bounds.center().lat.to_radians().cos();

    let zoom_for_height = if lat_span > 0.0 {
        (avail_h * 360.0 / (lat_span * TILE_SIZE_PX)).log2()
    } else {
        f64::INFINITY
    };
    let zoom_for_width = if lon_span > 0.0 && cos_lat > 0.0 {
        (avail_w * 360.0 / (lon_span * TILE_SIZE_PX * cos_lat)).log2()
    } else {
        f64::INFINITY
    };

    let zoom = zoom_for_height.min(zoom_for_width).floor();
    if !zoom.is_finite() {
        return MAX_ZOOM;
    }
    zoom.clamp(f64::from(MIN_ZOOM), f64::from(MAX_ZOOM)) as u8
}
