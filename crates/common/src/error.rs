//! Error types for CyNova

use thiserror::Error;

/// Result type alias using CyNova Error
pub type Result<T> = std::result::Result<T, Error>;

/// CyNova error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Live server error: {0}")]
    Live(String),
}
