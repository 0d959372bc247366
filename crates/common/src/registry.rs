//! The authoritative plot registry.
//!
//! A static list of plot records (price, availability, utilities) keyed by
//! plot number, loaded once at startup from `registry.toml` and immutable
//! afterwards. Geometry never lives here; it is merged in later from the
//! remote map data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// How a plot is supplied with water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterSupply {
    /// Own well on the plot.
    Well,
    /// Mains water connection.
    Mains,
    /// Shared well outside the plot.
    ExternalWell,
    /// Known to have no water supply.
    None,
    /// Not recorded in the registry.
    #[default]
    Unknown,
}

/// Parsed view of a record's `available_from` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// The sentinel "sofort" / "ab sofort".
    Immediately,
    /// Available from a given date, kept as the raw registry string.
    From(String),
    /// Empty field — the plot is not up for lease.
    NotAvailable,
}

/// One authoritative plot record.
///
/// Monetary amounts are in euro cents. `size_sqm` is the registry's own
/// size figure; it is kept separate from any geometry-derived area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotRecord {
    /// Stable business key, e.g. "1027".
    pub number: String,

    /// Named parcel the plot belongs to; may be empty.
    #[serde(default)]
    pub parcel: String,

    /// Registry size in square meters.
    #[serde(default)]
    pub size_sqm: f64,

    /// Raw availability string: a date, "sofort"/"ab sofort", or empty.
    #[serde(default)]
    pub available_from: String,

    /// Valuation in euro cents.
    #[serde(default)]
    pub valuation_cents: i64,

    /// Value reduction in euro cents.
    #[serde(default)]
    pub reduction_cents: i64,

    /// Electricity on the plot; `None` means not recorded, not "no".
    #[serde(default)]
    pub electricity: Option<bool>,

    /// Water supply type.
    #[serde(default)]
    pub water: WaterSupply,
}

/// Interpret a raw `available_from` string: empty means not available, the
/// sentinel "sofort"/"ab sofort" means immediately, anything else is a date.
pub fn parse_availability(raw: &str) -> Availability {
    let raw = raw.trim();
    if raw.is_empty() {
        return Availability::NotAvailable;
    }
    let lowered = raw.to_lowercase();
    if lowered == "sofort" || lowered == "ab sofort" {
        return Availability::Immediately;
    }
    Availability::From(raw.to_string())
}

impl PlotRecord {
    pub fn availability(&self) -> Availability {
        parse_availability(&self.available_from)
    }

    pub fn is_available(&self) -> bool {
        self.availability() != Availability::NotAvailable
    }
}

/// The full registry: every plot record plus the date the list was last
/// maintained.
#[derive(Debug, Clone, Deserialize)]
pub struct PlotRegistry {
    /// Date the registry data was last updated.
    pub updated: NaiveDate,

    #[serde(default)]
    pub plots: Vec<PlotRecord>,
}

impl PlotRegistry {
    /// Parse and validate a registry from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let registry: PlotRegistry = toml::from_str(raw)
            .map_err(|e| Error::Registry(format!("failed to parse registry: {}", e)))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load the registry from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Registry(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        let mut issues: Vec<String> = Vec::new();

        for (idx, plot) in self.plots.iter().enumerate() {
            if plot.number.trim().is_empty() {
                issues.push(format!("plots[{idx}].number must not be empty"));
            }
            if plot.size_sqm < 0.0 {
                issues.push(format!("plots[{idx}].size_sqm must be >= 0"));
            }
            if plot.valuation_cents < 0 {
                issues.push(format!("plots[{idx}].valuation_cents must be >= 0"));
            }
            if plot.reduction_cents < 0 {
                issues.push(format!("plots[{idx}].reduction_cents must be >= 0"));
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for plot in &self.plots {
            let number = plot.number.trim();
            if !number.is_empty() {
                if seen.contains(&number) {
                    issues.push(format!("duplicate plot number {number}"));
                } else {
                    seen.push(number);
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Registry(format!(
                "Invalid registry:\n - {}",
                issues.join("\n - ")
            )))
        }
    }

    /// Look up a record by plot number.
    pub fn lookup(&self, number: &str) -> Option<&PlotRecord> {
        self.plots.iter().find(|p| p.number == number)
    }

    /// Records whose `available_from` field marks them as up for lease.
    pub fn available_plots(&self) -> impl Iterator<Item = &PlotRecord> {
        self.plots.iter().filter(|p| p.is_available())
    }
}
