//! Error taxonomy shared by every trust-core crate.

use thiserror::Error;

/// Result type used across the trust core.
pub type TrustResult<T> = Result<T, TrustError>;

/// Trust-core error.
///
/// Deny and Elevate outcomes are *not* errors; they are ordinary return values
/// of the decision engine. Variants here describe caller mistakes, broken
/// configuration, and primitive failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// A required argument was missing or malformed (never retried).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No usable key/certificate, or an unsupported algorithm was requested.
    ///
    /// Fatal at first use; `SecurityConfig::validate` reports these at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A looked-up item (e.g. a TFA mechanism) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A cryptographic primitive failed (bad key length, tag mismatch, ...).
    #[error("cryptographic failure: {0}")]
    Crypto(String),

    /// The policy information source could not be queried.
    #[error("policy catalog unavailable: {0}")]
    Catalog(String),
}

impl TrustError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Whether this error comes from configuration (and should abort startup).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_and_detail() {
        let err = TrustError::not_found("tfa mechanism 42");
        assert_eq!(err.to_string(), "not found: tfa mechanism 42");

        let err = TrustError::configuration("no signing key named 'jwt'");
        assert!(err.is_configuration());
        assert!(err.to_string().starts_with("configuration error"));
    }
}
