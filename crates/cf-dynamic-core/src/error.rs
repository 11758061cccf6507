//! Error types for cf-dynamic
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for cf-dynamic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cf-dynamic
#[derive(Error, Debug)]
pub enum Error {
    /// Public address discovery errors
    #[error("IP source error: {0}")]
    IpSource(String),

    /// State store errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration file or settings errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record, zone or domain not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (domain names, suffixes, addresses)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Domain is already present in the domains file
    #[error("Domain '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Domain is absent from the domains file
    #[error("Domain '{0}' is not registered")]
    NotRegistered(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the requested record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether repeating the same request cannot succeed
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Authentication(_) | Self::InvalidInput(_) | Self::Config(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_messages() {
        assert_eq!(
            Error::AlreadyRegistered("home.example.com".into()).to_string(),
            "Domain 'home.example.com' is already registered"
        );
        assert_eq!(
            Error::NotRegistered("home.example.com".into()).to_string(),
            "Domain 'home.example.com' is not registered"
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(Error::not_found("A home.example.com").is_not_found());
        assert!(!Error::provider("cloudflare", "boom").is_not_found());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(Error::auth("bad token").is_permanent());
        assert!(Error::not_found("A home.example.com").is_permanent());
        assert!(!Error::http("connection reset").is_permanent());
        assert!(!Error::rate_limited("slow down").is_permanent());
        assert!(!Error::provider("cloudflare", "transient").is_permanent());
    }
}
