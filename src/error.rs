//! Error taxonomy shared by the dispatcher, the retrievers and the cache.
//!
//! `TokenError` is `Clone` so that the outcome of a single refresh can be
//! handed to every caller that waited on it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Mechanism disabled or a required setting is missing.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("credentials of type '{0}' not supported by authentication provider")]
    UnsupportedCredential(String),

    #[error("the cloud '{0}' is not supported")]
    UnsupportedCloud(String),

    #[error("user identity authentication not possible: fallback credentials not enabled")]
    FallbackNotEnabled,

    #[error("user identity authentication not valid for fallback credentials: '{0}'")]
    InvalidFallbackCredential(String),

    #[error("user identity authentication not possible because there's no ID token associated with the user")]
    MissingDelegatedToken,

    #[error("user identity authentication only possible in context of a user: request not associated with a user")]
    UnassociatedRequest,

    /// Network or identity-provider failure. Never carries secrets.
    #[error("failed to request token: {0}")]
    TokenRequest(String),

    #[error("token request cancelled")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl TokenError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        TokenError::Configuration(msg.into())
    }

    pub fn token_request(msg: impl Into<String>) -> Self {
        TokenError::TokenRequest(msg.into())
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Configuration(_) => "configuration",
            TokenError::UnsupportedCredential(_) => "unsupported_credential",
            TokenError::UnsupportedCloud(_) => "unsupported_cloud",
            TokenError::FallbackNotEnabled => "fallback_not_enabled",
            TokenError::InvalidFallbackCredential(_) => "invalid_fallback_credential",
            TokenError::MissingDelegatedToken => "missing_delegated_token",
            TokenError::UnassociatedRequest => "unassociated_request",
            TokenError::TokenRequest(_) => "token_request",
            TokenError::Cancelled => "cancelled",
            TokenError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        TokenError::TokenRequest(err.to_string())
    }
}

/// Raised while compiling an endpoint allowlist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowlistError {
    #[error("invalid allow endpoint '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl AllowlistError {
    pub fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        AllowlistError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: reason.into(),
        }
    }
}
