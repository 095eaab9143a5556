//! Common error types for CueDeck

use thiserror::Error;

/// Common result type for CueDeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by CueDeck crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// music.json could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bootstrap TOML could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
