//! Plot resolution service.
//!
//! Orchestrates the TTL cache, the Overpass client, and the geometry
//! toolkit: find a plot by number, load the whole region, attribute an
//! enclosing parcel, and merge remote geometry with the registry record
//! into a [`ResolvedPlot`]. Remote failures never escape this layer; they
//! degrade to a stale cache read or an explicit absence.

pub mod merge;
mod parcel;
pub mod service;

pub use merge::{merge_plot, ResolvedPlot};
pub use service::PlotResolver;
