//! Error types for cuedeck-md
//!
//! Nothing raised here is fatal to the host: the director logs load and host
//! failures and degrades to silence. Errors only surface from construction
//! (configuration) and from explicit loader calls.

use thiserror::Error;

/// Failures reported by the primary video collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// Capability not available on this platform
    #[error("Unsupported host capability: {0}")]
    Unsupported(String),

    /// Capability exists but the call failed
    #[error("Host call failed: {0}")]
    Failed(String),
}

/// Main error type for cuedeck-md
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clip resource missing or unreadable
    #[error("Failed to load clip '{locator}': {reason}")]
    ClipLoad { locator: String, reason: String },

    /// Locator scheme the loader cannot handle
    #[error("Unsupported locator: {0}")]
    UnsupportedLocator(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Load dropped before it completed (scene change, shutdown)
    #[error("Clip load cancelled: {0}")]
    LoadCancelled(String),

    /// Load exceeded the configured timeout
    #[error("Clip load timed out after {secs:.1}s: {locator}")]
    LoadTimeout { locator: String, secs: f64 },

    /// Channel pool misuse (double loan, wrong role)
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Convenience Result type using cuedeck-md Error
pub type Result<T> = std::result::Result<T, Error>;
