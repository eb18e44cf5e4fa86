//! Error types for fluidglass_core

use thiserror::Error;

/// Errors raised while loading a configuration record
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// TOML document did not match the configuration shape
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON document did not match the configuration shape
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither `.toml` nor `.json`
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
