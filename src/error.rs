use thiserror::Error;

/// Main error type for the watchlist service
#[derive(Error, Debug)]
pub enum WatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Storage errors
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported store version: {0}")]
    UnsupportedVersion(u32),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Outbound call timed out after {elapsed_secs}s")]
    OutboundTimeout { elapsed_secs: u64 },

    // Market data errors
    #[error("Quote unavailable for symbol: {symbol}")]
    QuoteUnavailable { symbol: String },

    // Delivery errors
    #[error("No delivery target for group: {group_id}")]
    TargetNotFound { group_id: String },

    #[error("Snapshot delivery failed: {0}")]
    DeliveryFailed(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for WatchError
pub type Result<T> = std::result::Result<T, WatchError>;
