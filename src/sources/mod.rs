//! Credential sources
//!
//! The seam between the cache and whatever mints bearer tokens, plus the
//! client-credentials HTTP implementation used in production.

pub mod client_credentials;

use std::future::Future;

use serde::Deserialize;

use crate::error::TokenCacheError;

/// Mints a fresh bearer token on behalf of a subject.
pub trait IssueCredential: Send + Sync + 'static {
    fn issue(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<IssuedToken, TokenCacheError>> + Send;
}

/// Success body of a client-credentials token response.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// seconds
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl IssuedToken {
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in,
            scope: None,
        }
    }

    /// Rejects responses that would break the cache invariants.
    pub fn validate(self) -> Result<Self, TokenCacheError> {
        if self.access_token.is_empty() {
            return Err(TokenCacheError::issuance(None, "issuer returned an empty access_token"));
        }
        if self.expires_in == 0 {
            return Err(TokenCacheError::issuance(None, "issuer returned expires_in = 0"));
        }
        Ok(self)
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}
