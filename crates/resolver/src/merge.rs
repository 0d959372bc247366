//! Merging remote geometry with registry records.

use common::{Availability, PlotRecord, WaterSupply};
use geometry::{bounds_of, centroid_of, polygon_area_sqm, GeoBounds, LatLon};
use overpass_client::OsmWay;
use serde::Serialize;

/// The unified plot view consumers operate on.
///
/// Built fresh on every merge and never mutated afterwards; a refresh
/// replaces the whole value. The registry's `size_sqm` and the
/// geometry-derived area are distinct fields on purpose — neither ever
/// overwrites the other, and consumers pick which one to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPlot {
    /// Plot number, from the geometry's `ref` tag or the registry record.
    pub number: String,

    /// OSM way id; absent when the plot has no known geometry.
    pub way_id: Option<i64>,

    /// Enclosing parcel name; empty when unknown.
    pub parcel: String,

    /// Area computed from geometry. Always set when geometry is present,
    /// even if it computes to zero; absent only without geometry.
    pub derived_area_sqm: Option<f64>,

    pub centroid: Option<LatLon>,
    pub bounds: Option<GeoBounds>,

    /// The registry's own size figure.
    pub registry_size_sqm: Option<f64>,

    /// Raw availability string from the registry.
    pub available_from: Option<String>,

    pub valuation_cents: Option<i64>,
    pub reduction_cents: Option<i64>,

    /// Tri-state: `None` means the registry does not say, not "no".
    pub electricity: Option<bool>,

    pub water: WaterSupply,
}

impl ResolvedPlot {
    /// A plot known only to the registry: all derived fields absent.
    pub fn from_registry(record: &PlotRecord) -> Self {
        Self {
            number: record.number.clone(),
            way_id: None,
            parcel: record.parcel.clone(),
            derived_area_sqm: None,
            centroid: None,
            bounds: None,
            registry_size_sqm: Some(record.size_sqm),
            available_from: Some(record.available_from.clone()),
            valuation_cents: Some(record.valuation_cents),
            reduction_cents: Some(record.reduction_cents),
            electricity: record.electricity,
            water: record.water,
        }
    }

    /// Parsed availability; `None` when no registry record was merged in.
    pub fn availability(&self) -> Option<Availability> {
        self.available_from.as_deref().map(common::parse_availability)
    }
}

/// Pure merge of one geometry, an optional registry record, and an
/// optional pre-resolved parcel name. No I/O.
///
/// Requires at least one vertex; returns `None` otherwise. Parcel name
/// precedence: explicit argument, then the registry record, then empty.
pub fn merge_plot(
    way: &OsmWay,
    record: Option<&PlotRecord>,
    parcel_name: Option<&str>,
) -> Option<ResolvedPlot> {
    if way.geometry.is_empty() {
        return None;
    }

    let number = way
        .plot_ref()
        .map(str::to_string)
        .or_else(|| record.map(|r| r.number.clone()))
        .unwrap_or_default();

    let parcel = parcel_name
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .or_else(|| record.map(|r| r.parcel.clone()))
        .unwrap_or_default();

    Some(ResolvedPlot {
        number,
        way_id: Some(way.id),
        parcel,
        derived_area_sqm: Some(polygon_area_sqm(&way.geometry)),
        centroid: centroid_of(&way.geometry),
        bounds: bounds_of(&way.geometry),
        registry_size_sqm: record.map(|r| r.size_sqm),
        available_from: record.map(|r| r.available_from.clone()),
        valuation_cents: record.map(|r| r.valuation_cents),
        reduction_cents: record.map(|r| r.reduction_cents),
        electricity: record.and_then(|r| r.electricity),
        water: record.map(|r| r.water).unwrap_or_default(),
    })
}
