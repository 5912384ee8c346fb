use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::credential::CachedCredential;
use crate::error::TokenCacheError;
use crate::helpers::time::{get_instant, Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::sources::IssueCredential;

type SubjectGuards = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Subject-keyed cache of issued bearer tokens.
///
/// Cloning is cheap and every clone shares the same map, so one instance
/// built at start-up can be handed to every caller.
pub struct TokenCache<I, C = SystemClock> {
    inner: Arc<RwLock<HashMap<String, CachedCredential>>>,
    issuer: Arc<I>,
    clock: Arc<C>,
    /// per-subject refresh guards, only when single-flight is enabled
    in_flight: Option<SubjectGuards>,
}

impl<I, C> Clone for TokenCache<I, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            issuer: self.issuer.clone(),
            clock: self.clock.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<I: IssueCredential> TokenCache<I, SystemClock> {
    pub fn new(issuer: I) -> Self {
        Self::with_clock(issuer, Arc::new(SystemClock))
    }
}

impl<I: IssueCredential, C: Clock> TokenCache<I, C> {
    pub fn with_clock(issuer: I, clock: Arc<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            issuer: Arc::new(issuer),
            clock,
            in_flight: None,
        }
    }

    /// Make concurrent refreshes of one subject wait for a single issuance.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(SubjectGuards::default);
        self
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    /// Return a usable token for `subject`, minting a new one when the cached
    /// entry is missing or inside the safety buffer.
    ///
    /// A failed issuance leaves whatever was cached before untouched. No retry
    /// happens here.
    pub async fn get_valid_token(&self, subject: &str) -> Result<String, TokenCacheError> {
        if subject.is_empty() {
            return Err(TokenCacheError::InvalidSubject);
        }
        if let Some(token) = self.fresh_token(subject).await {
            return Ok(token);
        }

        match &self.in_flight {
            Some(guards) => {
                let guard = guards
                    .lock()
                    .await
                    .entry(subject.to_owned())
                    .or_default()
                    .clone();
                let _refreshing = guard.lock().await;
                // another caller may have refreshed while we waited
                if let Some(token) = self.fresh_token(subject).await {
                    return Ok(token);
                }
                self.refresh(subject).await
            }
            None => self.refresh(subject).await,
        }
    }

    pub async fn has_valid_token(&self, subject: &str) -> bool {
        let now = self.clock.now_ms();
        self.inner
            .read()
            .await
            .get(subject)
            .is_some_and(|credential| credential.is_fresh_at(now))
    }

    /// Raw cached entry, fresh or not.
    pub async fn get_token_info(&self, subject: &str) -> Option<CachedCredential> {
        self.inner.read().await.get(subject).cloned()
    }

    pub async fn clear_token(&self, subject: &str) {
        let metrics = get_metrics().await;
        let mut map = self.inner.write().await;
        if map.remove(subject).is_some() {
            info!(subject = %subject, "cached token cleared");
        }
        metrics.token_clears.with_label_values(&["subject"]).inc();
        metrics.cached_subjects.set(map.len() as i64);
        drop(map);

        if let Some(guards) = &self.in_flight {
            guards.lock().await.remove(subject);
        }
    }

    pub async fn clear_all_tokens(&self) {
        let metrics = get_metrics().await;
        let mut map = self.inner.write().await;
        let cleared = map.len();
        map.clear();
        metrics.token_clears.with_label_values(&["all"]).inc();
        metrics.cached_subjects.set(0);
        drop(map);

        if let Some(guards) = &self.in_flight {
            guards.lock().await.clear();
        }
        info!(cleared, "all cached tokens cleared");
    }

    async fn fresh_token(&self, subject: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let token = self
            .inner
            .read()
            .await
            .get(subject)
            .filter(|credential| credential.is_fresh_at(now))
            .map(|credential| credential.token.clone());

        if token.is_some() {
            get_metrics().await.cache_hits.inc();
            debug!(subject = %subject, "serving cached token");
        }
        token
    }

    async fn refresh(&self, subject: &str) -> Result<String, TokenCacheError> {
        let metrics = get_metrics().await;
        metrics.cache_misses.inc();
        metrics.issuance_requests.inc();

        let start = get_instant();
        let issued = self
            .issuer
            .issue(subject)
            .await
            .and_then(|issued| issued.validate());
        metrics.issuance_duration.observe(start.elapsed().as_secs_f64());

        let issued = issued.inspect_err(|e| {
            metrics.issuance_failures.with_label_values(&[e.reason()]).inc();
            warn!(subject = %subject, error = %e, "token issuance failed");
        })?;

        let credential = CachedCredential::new(
            subject.to_owned(),
            issued.access_token,
            self.clock.now_ms(),
            issued.expires_in,
        );
        let token = credential.token.clone();
        let expires_at = credential.expires_at;

        let mut map = self.inner.write().await;
        map.insert(subject.to_owned(), credential);
        metrics.cached_subjects.set(map.len() as i64);
        drop(map);

        info!(subject = %subject, expires_at, "token issued and cached");
        Ok(token)
    }
}
