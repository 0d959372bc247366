//! Overpass wire types.

use geometry::LatLon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A way-like element from an Overpass `out geom;` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmWay {
    pub id: i64,

    #[serde(default)]
    pub nodes: Vec<i64>,

    /// Ordered ring vertices; Overpass serializes them as `{lat, lon}`.
    #[serde(default)]
    pub geometry: Vec<LatLon>,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OsmWay {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// The plot number this way is tagged with.
    pub fn plot_ref(&self) -> Option<&str> {
        self.tag("ref")
    }

    pub fn name(&self) -> Option<&str> {
        self.tag("name")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OsmWay>,
}
