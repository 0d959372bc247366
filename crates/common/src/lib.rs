//! Shared types, config, and error definitions for the plot-locator.

pub mod config;
pub mod error;
pub mod registry;

pub use config::{ConsentState, LocatorConfig};
pub use error::Error;
pub use registry::{parse_availability, Availability, PlotRecord, PlotRegistry, WaterSupply};

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
