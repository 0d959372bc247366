//! Enclosing-parcel selection heuristics.
//!
//! Given the candidate ways returned by the parcel query, pick the name of
//! the tightest sensible parent for a plot. Candidate classes, in ranking
//! order: named sub-plots (an `allotments` way with a name), then
//! site-level and land-use ways. Named candidates must be meaningfully
//! larger than the plot itself so a neighboring garden never passes as a
//! parent; the multipliers are config, tuned to this association's tagging.

use common::config::ParcelConfig;
use geometry::{point_in_polygon, polygon_area_sqm, LatLon};
use overpass_client::OsmWay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateClass {
    /// `allotments` way with a name: a specific named sub-plot.
    NamedSubPlot,
    /// `leisure=garden`: the association site itself.
    SiteLevel,
    /// `landuse=allotments`: the broader designation.
    LandUse,
    /// None of the above.
    Untagged,
}

fn classify(way: &OsmWay) -> CandidateClass {
    if way.tag("leisure") == Some("garden") {
        CandidateClass::SiteLevel
    } else if way.tag("landuse") == Some("allotments") {
        CandidateClass::LandUse
    } else if way.tag("allotments").is_some() && way.name().is_some() {
        CandidateClass::NamedSubPlot
    } else {
        CandidateClass::Untagged
    }
}

struct Candidate<'a> {
    way: &'a OsmWay,
    class: CandidateClass,
    area: f64,
}

/// Name of the best enclosing parcel for the plot, or `None`.
///
/// `plot_area` is the plot's own approximate area; `centroid` is the point
/// the winning polygon must contain.
pub(crate) fn select_parcel(
    plot_id: i64,
    centroid: LatLon,
    plot_area: f64,
    elements: &[OsmWay],
    cfg: &ParcelConfig,
) -> Option<String> {
    let others: Vec<Candidate> = elements
        .iter()
        .filter(|w| w.id != plot_id)
        .map(|w| Candidate {
            way: w,
            class: classify(w),
            area: polygon_area_sqm(&w.geometry),
        })
        .collect();

    let mut filtered: Vec<&Candidate> = others
        .iter()
        .filter(|c| {
            if c.way.tag("highway").is_some() {
                return false;
            }
            match c.class {
                CandidateClass::SiteLevel | CandidateClass::LandUse => true,
                CandidateClass::NamedSubPlot => c.area >= plot_area * cfg.named_plot_area_factor,
                CandidateClass::Untagged => c.area >= plot_area * cfg.untagged_area_factor,
            }
        })
        .collect();

    // Specific named sub-plots before broad site/land-use ways; tightest
    // (smallest) candidate first within each tier.
    filtered.sort_by(|a, b| {
        let tier = |c: &Candidate| match c.class {
            CandidateClass::NamedSubPlot | CandidateClass::Untagged => 0u8,
            CandidateClass::SiteLevel | CandidateClass::LandUse => 1,
        };
        tier(a)
            .cmp(&tier(b))
            .then(a.area.total_cmp(&b.area))
    });

    for candidate in &filtered {
        if let Some(name) = candidate.way.name() {
            if point_in_polygon(centroid, &candidate.way.geometry) {
                return Some(name.to_string());
            }
        }
    }

    // Fallbacks, loosest last: a containing site-level way even if it was
    // filtered out, the largest containing polygon of any kind, and finally
    // the first candidate that has a name at all.
    let containing_site = others.iter().find(|c| {
        c.class == CandidateClass::SiteLevel
            && c.way.name().is_some()
            && point_in_polygon(centroid, &c.way.geometry)
    });
    if let Some(c) = containing_site {
        return c.way.name().map(str::to_string);
    }

    let largest_containing = others
        .iter()
        .filter(|c| c.way.name().is_some() && point_in_polygon(centroid, &c.way.geometry))
        .max_by(|a, b| a.area.total_cmp(&b.area));
    if let Some(c) = largest_containing {
        return c.way.name().map(str::to_string);
    }

    others
        .iter()
        .find_map(|c| c.way.name())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::select_parcel;
    use common::config::ParcelConfig;
    use geometry::LatLon;
    use overpass_client::OsmWay;
    use std::collections::BTreeMap;

    /// Square ring of roughly `side_m` meters centered on (lat, lon).
    fn ring(center: LatLon, side_m: f64) -> Vec<LatLon> {
        let half_lat = side_m / 2.0 / 111_320.0;
        let half_lon = half_lat / center.lat.to_radians().cos();
        vec![
            LatLon::new(center.lat - half_lat, center.lon - half_lon),
            LatLon::new(center.lat - half_lat, center.lon + half_lon),
            LatLon::new(center.lat + half_lat, center.lon + half_lon),
            LatLon::new(center.lat + half_lat, center.lon - half_lon),
        ]
    }

    fn way(id: i64, tags: &[(&str, &str)], geometry: Vec<LatLon>) -> OsmWay {
        OsmWay {
            id,
            nodes: Vec::new(),
            geometry,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    const CENTER: LatLon = LatLon { lat: 52.26, lon: 10.52 };
    const PLOT_AREA: f64 = 400.0;

    fn cfg() -> ParcelConfig {
        ParcelConfig::default()
    }

    #[test]
    fn test_named_sub_plot_preferred_over_land_use() {
        let candidates = vec![
            way(
                2,
                &[("allotments", "yes"), ("name", "Süd")],
                ring(CENTER, 35.0), // ~1225 m², > 2x the plot
            ),
            way(
                3,
                &[("landuse", "allotments"), ("name", "Kleingartenverein")],
                ring(CENTER, 300.0),
            ),
        ];
        let parcel = select_parcel(1, CENTER, PLOT_AREA, &candidates, &cfg());
        assert_eq!(parcel.as_deref(), Some("Süd"));
    }

    #[test]
    fn test_tightest_candidate_wins_within_tier() {
        let candidates = vec![
            way(
                2,
                &[("allotments", "yes"), ("name", "Wide")],
                ring(CENTER, 120.0),
            ),
            way(
                3,
                &[("allotments", "yes"), ("name", "Tight")],
                ring(CENTER, 40.0),
            ),
        ];
        let parcel = select_parcel(1, CENTER, PLOT_AREA, &candidates, &cfg());
        assert_eq!(parcel.as_deref(), Some("Tight"));
    }

    #[test]
    fn test_plot_itself_and_roads_excluded() {
        let candidates = vec![
            way(
                1, // the plot's own id
                &[("allotments", "yes"), ("name", "Self")],
                ring(CENTER, 40.0),
            ),
            way(
                2,
                &[("highway", "service"), ("name", "Wirtschaftsweg")],
                ring(CENTER, 40.0),
            ),
            way(
                3,
                &[("leisure", "garden"), ("name", "Gartenverein")],
                ring(CENTER, 200.0),
            ),
        ];
        let parcel = select_parcel(1, CENTER, PLOT_AREA, &candidates, &cfg());
        assert_eq!(parcel.as_deref(), Some("Gartenverein"));
    }

    #[test]
    fn test_named_plot_of_similar_size_is_not_a_parent() {
        // A neighboring garden barely larger than the plot must not be
        // mistaken for its parcel.
        let candidates = vec![
            way(
                2,
                &[("allotments", "yes"), ("name", "Nachbar")],
                ring(LatLon::new(52.2603, 10.52), 22.0),
            ),
            way(
                3,
                &[("leisure", "garden"), ("name", "Gartenverein")],
                ring(CENTER, 200.0),
            ),
        ];
        let parcel = select_parcel(1, CENTER, PLOT_AREA, &candidates, &cfg());
        assert_eq!(parcel.as_deref(), Some("Gartenverein"));
    }

    #[test]
    fn test_untagged_candidate_needs_higher_factor() {
        // ~900 m² is 2.25x the plot: enough for a named sub-plot, not for
        // an untagged way (3x bar).
        let untagged_small = way(2, &[("name", "Irgendwas")], ring(CENTER, 30.0));
        let parcel = select_parcel(1, CENTER, PLOT_AREA, &[untagged_small.clone()], &cfg());
        // Too small for the primary pass; surfaces only through the
        // containing-polygon fallback.
        assert_eq!(parcel.as_deref(), Some("Irgendwas"));

        let untagged_large = way(3, &[("name", "Gelände")], ring(CENTER, 50.0));
        let parcel = select_parcel(
            1,
            CENTER,
            PLOT_AREA,
            &[untagged_small, untagged_large],
            &cfg(),
        );
        assert_eq!(parcel.as_deref(), Some("Gelände"));
    }

    #[test]
    fn test_fallback_to_largest_containing_polygon() {
        // No filtered candidate contains the centroid: the named sub-plot
        // sits elsewhere and the containing ways are all under the untagged
        // 3x bar. The largest containing named polygon wins.
        let candidates = vec![
            way(
                2,
                &[("allotments", "yes"), ("name", "Abseits")],
                ring(LatLon::new(52.28, 10.55), 60.0), // elsewhere
            ),
            way(
                3,
                &[("landuse", "allotments")],
                ring(CENTER, 300.0), // contains, but nameless
            ),
            way(4, &[("name", "Kleine Fläche")], ring(CENTER, 25.0)),
            way(5, &[("name", "Große Fläche")], ring(CENTER, 33.0)),
        ];
        let parcel = select_parcel(1, CENTER, PLOT_AREA, &candidates, &cfg());
        assert_eq!(parcel.as_deref(), Some("Große Fläche"));
    }

    #[test]
    fn test_no_candidates_yields_none() {
        assert_eq!(select_parcel(1, CENTER, PLOT_AREA, &[], &cfg()), None);
        // Only the plot itself returned.
        let only_self = vec![way(1, &[("name", "Self")], ring(CENTER, 20.0))];
        assert_eq!(select_parcel(1, CENTER, PLOT_AREA, &only_self, &cfg()), None);
    }
}
