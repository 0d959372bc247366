//! Unified error type for the plot-locator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Overpass API error (status={status}): {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("all Overpass endpoints failed; last error: {last}")]
    AllEndpointsFailed { last: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
