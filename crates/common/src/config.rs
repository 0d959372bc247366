//! Locator configuration types.

use geometry::GeoBounds;
use serde::{Deserialize, Serialize};

/// Top-level locator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Overpass endpoints, tried in order (first entry is preferred).
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Bounding box of the association grounds; every targeted query is
    /// limited to this box.
    #[serde(default = "default_home_region")]
    pub home_region: GeoBounds,

    /// Outer regional boundary that padded/expanded boxes are clamped to.
    #[serde(default = "default_outer_region")]
    pub outer_region: GeoBounds,

    /// Path to the registry TOML file.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Cache location and TTLs.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry and timeout knobs for the Overpass client.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Enclosing-parcel search heuristics.
    #[serde(default)]
    pub parcel: ParcelConfig,

    /// Default viewport for zoom fitting.
    #[serde(default)]
    pub viewport: ViewportConfig,

    /// User consent flags; no network call is made without them.
    #[serde(default)]
    pub consent: ConsentState,
}

/// Cache directory, key prefix, and per-kind TTLs (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Prefix on every cache file; `clear` only ever touches files that
    /// carry it.
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,

    /// TTL for a single plot's geometry.
    #[serde(default = "default_plot_ttl")]
    pub plot_ttl_secs: u64,

    /// TTL for the full-region listing.
    #[serde(default = "default_region_ttl")]
    pub region_ttl_secs: u64,

    /// TTL used when no explicit TTL is given.
    #[serde(default = "default_default_ttl")]
    pub default_ttl_secs: u64,
}

/// Retry/backoff/timeout parameters for the Overpass client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per endpoint before failing over to the next one.
    #[serde(default = "default_max_retries")]
    pub max_retries_per_server: u32,

    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Client-side timeout on the first attempt against an endpoint.
    #[serde(default = "default_first_timeout")]
    pub first_attempt_timeout_secs: u64,

    /// Client-side timeout on retries — a slow-but-alive server gets more
    /// time than a first probe.
    #[serde(default = "default_retry_timeout")]
    pub retry_attempt_timeout_secs: u64,

    /// Server-side timeout hint embedded in the OverpassQL header.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

/// Heuristics for enclosing-parcel attribution.
///
/// The area multipliers are tuned to this association's tagging habits and
/// deliberately live in config rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelConfig {
    /// Margin added around a plot's bounding box when searching for parcel
    /// candidates, in degrees (~0.001° ≈ 100 m).
    #[serde(default = "default_search_margin")]
    pub search_margin_deg: f64,

    /// A named sub-plot only counts as a parent when its area exceeds the
    /// plot's by this factor.
    #[serde(default = "default_named_factor")]
    pub named_plot_area_factor: f64,

    /// Higher bar for candidates without a classifying tag.
    #[serde(default = "default_untagged_factor")]
    pub untagged_area_factor: f64,
}

/// Default viewport used for zoom fitting in the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_viewport_width")]
    pub width_px: u32,

    #[serde(default = "default_viewport_height")]
    pub height_px: u32,

    #[serde(default = "default_viewport_padding")]
    pub padding_px: u32,
}

/// Explicit user consent flags.
///
/// Injected into the resolution service; nothing in this layer reads
/// ambient state. `map_data` gates every Overpass fetch. `aerial_imagery`
/// is carried for consumers that render satellite layers; no fetch in this
/// layer depends on it. Missing consent is a valid branch, never an error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConsentState {
    #[serde(default)]
    pub map_data: bool,

    #[serde(default)]
    pub aerial_imagery: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_endpoints() -> Vec<String> {
    vec![
        "https://overpass-api.de/api/interpreter".into(),
        "https://overpass.kumi.systems/api/interpreter".into(),
        "https://overpass.osm.ch/api/interpreter".into(),
    ]
}

fn default_home_region() -> GeoBounds {
    // Association grounds south of Braunschweig.
    GeoBounds::new(52.245, 10.495, 52.275, 10.545)
}

fn default_outer_region() -> GeoBounds {
    GeoBounds::new(52.20, 10.40, 52.32, 10.62)
}

fn default_registry_path() -> String {
    "registry.toml".into()
}

fn default_cache_dir() -> String {
    ".plot-cache".into()
}
fn default_cache_prefix() -> String {
    "plotloc_".into()
}
fn default_plot_ttl() -> u64 {
    2 * 60 * 60
}
fn default_region_ttl() -> u64 {
    60 * 60
}
fn default_default_ttl() -> u64 {
    60 * 60
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_first_timeout() -> u64 {
    30
}
fn default_retry_timeout() -> u64 {
    45
}
fn default_query_timeout() -> u64 {
    25
}

fn default_search_margin() -> f64 {
    0.001
}
fn default_named_factor() -> f64 {
    2.0
}
fn default_untagged_factor() -> f64 {
    3.0
}

fn default_viewport_width() -> u32 {
    800
}
fn default_viewport_height() -> u32 {
    600
}
fn default_viewport_padding() -> u32 {
    50
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            prefix: default_cache_prefix(),
            plot_ttl_secs: default_plot_ttl(),
            region_ttl_secs: default_region_ttl(),
            default_ttl_secs: default_default_ttl(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries_per_server: default_max_retries(),
            base_delay_ms: default_base_delay(),
            first_attempt_timeout_secs: default_first_timeout(),
            retry_attempt_timeout_secs: default_retry_timeout(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl Default for ParcelConfig {
    fn default() -> Self {
        Self {
            search_margin_deg: default_search_margin(),
            named_plot_area_factor: default_named_factor(),
            untagged_area_factor: default_untagged_factor(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width_px: default_viewport_width(),
            height_px: default_viewport_height(),
            padding_px: default_viewport_padding(),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            home_region: default_home_region(),
            outer_region: default_outer_region(),
            registry_path: default_registry_path(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            parcel: ParcelConfig::default(),
            viewport: ViewportConfig::default(),
            consent: ConsentState::default(),
        }
    }
}
