use http::StatusCode;
use thiserror::Error;

/// Operator-facing message for a cache that cannot reach its issuer because of setup.
pub const MISCONFIGURED_MESSAGE: &str = "service misconfigured, contact administrator";
/// Message for failures that may resolve on their own.
pub const ISSUER_UNAVAILABLE_MESSAGE: &str = "token issuer temporarily unavailable, please retry";

/// Errors surfaced by [`TokenCache::get_valid_token`](crate::cache::token_cache::TokenCache::get_valid_token).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenCacheError {
    /// Issuer client credentials are missing or unreadable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The issuer rejected the request, could not be reached, or answered garbage.
    #[error("issuance failed (status: {}): {detail}", display_status(.status))]
    Issuance { status: Option<u16>, detail: String },

    #[error("subject must not be empty")]
    InvalidSubject,
}

impl TokenCacheError {
    pub fn issuance(status: Option<u16>, detail: impl Into<String>) -> Self {
        TokenCacheError::Issuance {
            status,
            detail: detail.into(),
        }
    }

    /// Only issuance failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenCacheError::Issuance { .. })
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            TokenCacheError::Configuration(_) => MISCONFIGURED_MESSAGE,
            TokenCacheError::Issuance { .. } => ISSUER_UNAVAILABLE_MESSAGE,
            TokenCacheError::InvalidSubject => "subject must not be empty",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            TokenCacheError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            TokenCacheError::Issuance { .. } => StatusCode::BAD_GATEWAY,
            TokenCacheError::InvalidSubject => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenCacheError::Configuration(_) => "configuration",
            TokenCacheError::Issuance { status: Some(_), .. } => "status",
            TokenCacheError::Issuance { status: None, .. } => "transport",
            TokenCacheError::InvalidSubject => "invalid_subject",
        }
    }
}

fn display_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_owned())
}
