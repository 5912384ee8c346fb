use serde::Serialize;

/// Tokens are treated as stale this long before they actually expire.
pub const SAFETY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// One cached bearer token for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedCredential {
    pub subject: String,
    pub token: String,
    /// epoch millis
    pub issued_at: i64,
    /// epoch millis, always > issued_at
    pub expires_at: i64,
}

impl CachedCredential {
    pub fn new(subject: String, token: String, issued_at: i64, expires_in_secs: u64) -> Self {
        let ttl_ms = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        Self {
            subject,
            token,
            issued_at,
            expires_at: issued_at.saturating_add(ttl_ms),
        }
    }

    /// Point in time from which the token must be refreshed.
    pub fn refresh_at(&self) -> i64 {
        self.expires_at.saturating_sub(SAFETY_BUFFER_MS)
    }

    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        now_ms < self.refresh_at()
    }
}
