//! Common error types for Huddle.

use thiserror::Error;

/// Result type alias using Huddle's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Huddle operations.
///
/// Each operation owns its failure path; nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// The RTC or chat SDK rejected a call (join, publish, subscribe, open, send...)
    #[error("sdk error: {0}")]
    Sdk(String),

    /// The token gateway could not issue a token
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Chat was used before a successful login
    #[error("chat client is not initialized")]
    NotInitialized,

    /// Operation issued in the wrong session state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an SDK error from any displayable type.
    pub fn sdk(msg: impl std::fmt::Display) -> Self {
        Self::Sdk(msg.to_string())
    }

    /// Create a gateway error from any displayable type.
    pub fn gateway(msg: impl std::fmt::Display) -> Self {
        Self::Gateway(msg.to_string())
    }

    /// Create an invalid state error from any displayable type.
    pub fn invalid_state(msg: impl std::fmt::Display) -> Self {
        Self::InvalidState(msg.to_string())
    }

    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// True for failures that came from the token gateway.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        assert_eq!(Error::sdk("join refused").to_string(), "sdk error: join refused");
        assert_eq!(
            Error::gateway("status 503").to_string(),
            "gateway error: status 503"
        );
        assert_eq!(
            Error::NotInitialized.to_string(),
            "chat client is not initialized"
        );
    }

    #[test]
    fn test_is_gateway() {
        assert!(Error::gateway("x").is_gateway());
        assert!(!Error::sdk("x").is_gateway());
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(Error::from(err), Error::Serialization(_)));
    }
}
