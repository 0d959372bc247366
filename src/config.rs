//! Configuration loader — merges defaults, config.toml, and env vars.

use common::{Error, LocatorConfig};
use std::path::Path;

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &LocatorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.endpoints.is_empty() {
        issues.push("endpoints must contain at least one URL".into());
    }
    for endpoint in &config.endpoints {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            issues.push(format!("endpoint {endpoint} must be an http(s) URL"));
        }
    }

    if config.home_region.south >= config.home_region.north
        || config.home_region.west >= config.home_region.east
    {
        issues.push("home_region must have south < north and west < east".into());
    }
    if config.outer_region.south >= config.outer_region.north
        || config.outer_region.west >= config.outer_region.east
    {
        issues.push("outer_region must have south < north and west < east".into());
    }
    if config.outer_region.south > config.home_region.south
        || config.outer_region.north < config.home_region.north
        || config.outer_region.west > config.home_region.west
        || config.outer_region.east < config.home_region.east
    {
        issues.push("outer_region must contain home_region".into());
    }

    if config.registry_path.trim().is_empty() {
        issues.push("registry_path must not be empty".into());
    }
    if config.cache.dir.trim().is_empty() {
        issues.push("cache.dir must not be empty".into());
    }
    if config.cache.prefix.trim().is_empty() {
        issues.push("cache.prefix must not be empty".into());
    }
    if config.cache.plot_ttl_secs == 0 {
        issues.push("cache.plot_ttl_secs must be > 0".into());
    }
    if config.cache.region_ttl_secs == 0 {
        issues.push("cache.region_ttl_secs must be > 0".into());
    }
    if config.cache.default_ttl_secs == 0 {
        issues.push("cache.default_ttl_secs must be > 0".into());
    }

    if config.retry.max_retries_per_server == 0 {
        issues.push("retry.max_retries_per_server must be > 0".into());
    }
    if config.retry.first_attempt_timeout_secs == 0 {
        issues.push("retry.first_attempt_timeout_secs must be > 0".into());
    }
    if config.retry.retry_attempt_timeout_secs == 0 {
        issues.push("retry.retry_attempt_timeout_secs must be > 0".into());
    }
    if config.retry.query_timeout_secs == 0 {
        issues.push("retry.query_timeout_secs must be > 0".into());
    }

    if config.parcel.search_margin_deg < 0.0 {
        issues.push("parcel.search_margin_deg must be >= 0".into());
    }
    if config.parcel.named_plot_area_factor < 1.0 {
        issues.push("parcel.named_plot_area_factor must be >= 1".into());
    }
    if config.parcel.untagged_area_factor < config.parcel.named_plot_area_factor {
        issues.push(
            "parcel.untagged_area_factor must be >= parcel.named_plot_area_factor".into(),
        );
    }

    if config.viewport.width_px <= 2 * config.viewport.padding_px
        || config.viewport.height_px <= 2 * config.viewport.padding_px
    {
        issues.push("viewport must be larger than twice its padding".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load locator configuration from environment and optional config file.
pub fn load_config() -> Result<LocatorConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = LocatorConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(raw) = std::env::var("PLOT_ENDPOINTS") {
        let endpoints: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if endpoints.is_empty() {
            return Err(Error::Config(
                "PLOT_ENDPOINTS must be a comma-separated list of URLs".into(),
            ));
        }
        config.endpoints = endpoints;
    }
    if let Ok(dir) = std::env::var("PLOT_CACHE_DIR") {
        config.cache.dir = dir;
    }
    if let Ok(path) = std::env::var("PLOT_REGISTRY_PATH") {
        config.registry_path = path;
    }
    if let Ok(raw) = std::env::var("PLOT_CONSENT_MAP_DATA") {
        config.consent.map_data = parse_bool(&raw);
    }
    if let Ok(raw) = std::env::var("PLOT_CONSENT_AERIAL_IMAGERY") {
        config.consent.aerial_imagery = parse_bool(&raw);
    }
    if let Ok(raw) = std::env::var("PLOT_MAX_RETRIES_PER_SERVER") {
        config.retry.max_retries_per_server =
            parse_positive_u64(&raw, "PLOT_MAX_RETRIES_PER_SERVER")? as u32;
    }
    if let Ok(raw) = std::env::var("PLOT_BASE_DELAY_MS") {
        config.retry.base_delay_ms = parse_positive_u64(&raw, "PLOT_BASE_DELAY_MS")?;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
