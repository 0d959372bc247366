//! Resilient client for the Overpass API.
//!
//! Executes an OverpassQL query against an ordered list of interchangeable
//! endpoints, retrying transient failures (503/504, timeouts) with
//! exponential backoff before failing over to the next endpoint. No caching
//! happens here; that is the caller's job.

pub mod client;
pub mod query;
pub mod types;

pub use client::{HttpTransport, OverpassClient, QueryTransport, TransportResponse};
pub use query::{parcel_candidates_query, plot_by_ref_query, region_plots_query};
pub use types::{OsmWay, OverpassResponse};
