//! OverpassQL query builders.
//!
//! The association maps its grounds with standard allotment tagging:
//! individual plots carry `allotments` and a `ref` number, parcels are
//! named `allotments` ways, the whole site is `leisure=garden`, and the
//! surrounding designation is `landuse=allotments`.

use geometry::GeoBounds;

fn bbox(bounds: &GeoBounds) -> String {
    format!(
        "{},{},{},{}",
        bounds.south, bounds.west, bounds.north, bounds.east
    )
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Query for the single plot tagged `ref=<number>` inside the home region.
pub fn plot_by_ref_query(bounds: &GeoBounds, number: &str, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout}];\
         way[\"allotments\"][\"ref\"=\"{number}\"]({bbox});\
         out geom;",
        timeout = timeout_secs,
        number = escape(number),
        bbox = bbox(bounds),
    )
}

/// Query for every numbered plot inside the region.
pub fn region_plots_query(bounds: &GeoBounds, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout}];\
         way[\"allotments\"][\"ref\"]({bbox});\
         out geom;",
        timeout = timeout_secs,
        bbox = bbox(bounds),
    )
}

/// Query for parcel-like candidates around a plot: named sub-plots, the
/// site itself, and the land-use designation.
pub fn parcel_candidates_query(bounds: &GeoBounds, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout}];\
         (\
         way[\"allotments\"]({bbox});\
         way[\"leisure\"=\"garden\"]({bbox});\
         way[\"landuse\"=\"allotments\"]({bbox});\
         );\
         out geom;",
        timeout = timeout_secs,
        bbox = bbox(bounds),
    )
}

#[cfg(test)]
mod tests {
    use super::{parcel_candidates_query, plot_by_ref_query, region_plots_query};
    use geometry::GeoBounds;

    fn region() -> GeoBounds {
        GeoBounds::new(52.245, 10.495, 52.275, 10.545)
    }

    #[test]
    fn test_plot_query_carries_ref_bbox_and_timeout() {
        let q = plot_by_ref_query(&region(), "1027", 25);
        assert!(q.starts_with("[out:json][timeout:25];"));
        assert!(q.contains("[\"ref\"=\"1027\"]"));
        assert!(q.contains("(52.245,10.495,52.275,10.545)"));
        assert!(q.ends_with("out geom;"));
    }

    #[test]
    fn test_plot_query_escapes_quotes() {
        let q = plot_by_ref_query(&region(), "10\"27", 25);
        assert!(q.contains("[\"ref\"=\"10\\\"27\"]"));
    }

    #[test]
    fn test_region_query_selects_all_numbered_plots() {
        let q = region_plots_query(&region(), 25);
        assert!(q.contains("way[\"allotments\"][\"ref\"]"));
        assert!(!q.contains("\"ref\"=\""));
    }

    #[test]
    fn test_parcel_query_unions_all_candidate_classes() {
        let q = parcel_candidates_query(&region(), 25);
        assert!(q.contains("way[\"allotments\"]("));
        assert!(q.contains("way[\"leisure\"=\"garden\"]("));
        assert!(q.contains("way[\"landuse\"=\"allotments\"]("));
    }
}
