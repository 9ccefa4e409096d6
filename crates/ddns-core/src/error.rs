//! Error types for the DDNS authority
//!
//! This module defines all error types used throughout the crate.
//!
//! The `Display` text of each variant is user-visible: the control API
//! renders store and callback failures as the literal response body.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS authority
#[derive(Error, Debug)]
pub enum Error {
    /// A name that is not a syntactically valid domain name
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// An address string that is neither IPv4 nor IPv6
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A line that does not parse as a resource record
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Lookup or delete against an absent key
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Snapshot flush or load failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Missing, unknown or insufficiently permissioned API key
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Non-2xx status or transport failure talking to the callback endpoint
    #[error("Callback failed: {0}")]
    Callback(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid domain error
    pub fn invalid_domain(msg: impl Into<String>) -> Self {
        Self::InvalidDomain(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::RecordNotFound(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an authorization error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a callback error
    pub fn callback(msg: impl Into<String>) -> Self {
        Self::Callback(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that mean "the caller may not do this"
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
