#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cache::credential::SAFETY_BUFFER_MS;
    use crate::cache::token_cache::TokenCache;
    use crate::error::TokenCacheError;
    use crate::helpers::time::{now_ms, Clock, ManualClock};
    use crate::sources::IssuedToken;
    use crate::tests::common::{ScriptedIssuer, T0};

    fn manual_cache(issuer: ScriptedIssuer) -> (TokenCache<ScriptedIssuer, ManualClock>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (TokenCache::with_clock(issuer, clock.clone()), clock)
    }

    #[tokio::test]
    async fn token_is_fresh_right_after_issuance() {
        let (cache, clock) = manual_cache(ScriptedIssuer::new(3600));

        let token = cache.get_valid_token("u1").await.unwrap();

        assert_eq!(token, "tok-1");
        assert!(cache.has_valid_token("u1").await);
        let info = cache.get_token_info("u1").await.unwrap();
        assert_eq!(info.subject, "u1");
        assert_eq!(info.issued_at, T0);
        assert!(info.expires_at > clock.now_ms() + SAFETY_BUFFER_MS);
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_second_issuance() {
        let (cache, clock) = manual_cache(ScriptedIssuer::new(3600));

        let first = cache.get_valid_token("u1").await.unwrap();
        clock.advance_secs(30 * 60);
        let second = cache.get_valid_token("u1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.issuer().call_count(), 1);
    }

    #[tokio::test]
    async fn entry_inside_safety_buffer_is_stale_and_refreshed() {
        let (cache, clock) = manual_cache(ScriptedIssuer::new(3600));
        cache.get_valid_token("u1").await.unwrap();
        let expires_at = cache.get_token_info("u1").await.unwrap().expires_at;

        // six minutes left: still fresh
        clock.set(expires_at - 6 * 60 * 1000);
        assert!(cache.has_valid_token("u1").await);

        // four minutes left: stale
        clock.set(expires_at - 4 * 60 * 1000);
        assert!(!cache.has_valid_token("u1").await);
        // stale entries are still reported raw
        assert_eq!(cache.get_token_info("u1").await.unwrap().token, "tok-1");

        let refreshed = cache.get_valid_token("u1").await.unwrap();
        assert_eq!(refreshed, "tok-2");
        assert_eq!(cache.issuer().call_count(), 2);

        let info = cache.get_token_info("u1").await.unwrap();
        assert_eq!(info.issued_at, expires_at - 4 * 60 * 1000);
        assert!(cache.has_valid_token("u1").await);
    }

    #[tokio::test]
    async fn cleared_subject_has_no_token() {
        let (cache, _) = manual_cache(ScriptedIssuer::new(3600));
        cache.get_valid_token("u1").await.unwrap();

        cache.clear_token("u1").await;

        assert!(!cache.has_valid_token("u1").await);
        assert!(cache.get_token_info("u1").await.is_none());

        // no-op for unknown subjects
        cache.clear_token("nobody").await;

        // next lookup issues again
        assert_eq!(cache.get_valid_token("u1").await.unwrap(), "tok-2");
    }

    #[tokio::test]
    async fn subjects_are_isolated() {
        let (cache, _) = manual_cache(ScriptedIssuer::new(3600));
        cache.get_valid_token("a").await.unwrap();
        cache.get_valid_token("b").await.unwrap();
        let b_before = cache.get_token_info("b").await.unwrap();

        cache.clear_token("a").await;
        assert_eq!(cache.get_token_info("b").await.unwrap(), b_before);

        assert_eq!(cache.get_valid_token("a").await.unwrap(), "tok-3");
        assert_eq!(cache.get_token_info("b").await.unwrap(), b_before);
        assert!(cache.has_valid_token("b").await);
    }

    #[tokio::test]
    async fn issued_token_expiry_follows_expires_in() {
        let issuer = ScriptedIssuer::new(60).then(Ok(IssuedToken::new("tok1", 3600)));
        let cache = TokenCache::new(issuer);

        let token = cache.get_valid_token("u1").await.unwrap();
        let now = now_ms();

        assert_eq!(token, "tok1");
        let info = cache.get_token_info("u1").await.unwrap();
        assert!((info.expires_at - (now + 3_600_000)).abs() <= 1000, "expires_at {} vs now {}", info.expires_at, now);
    }

    #[tokio::test]
    async fn rejected_issuance_leaves_subject_without_token() {
        let issuer = ScriptedIssuer::new(3600).then(Err(TokenCacheError::issuance(Some(401), "unauthorized")));
        let (cache, _) = manual_cache(issuer);

        let err = cache.get_valid_token("u2").await.unwrap_err();

        assert_eq!(err, TokenCacheError::issuance(Some(401), "unauthorized"));
        assert!(!cache.has_valid_token("u2").await);
        assert!(cache.get_token_info("u2").await.is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_entry() {
        let (cache, clock) = manual_cache(ScriptedIssuer::new(3600));
        cache.get_valid_token("u1").await.unwrap();
        let before = cache.get_token_info("u1").await.unwrap();

        clock.set(before.expires_at - 60 * 1000);
        cache.issuer().push(Err(TokenCacheError::issuance(None, "connection refused")));

        let err = cache.get_valid_token("u1").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(cache.get_token_info("u1").await.unwrap(), before);

        // caller retries and succeeds
        assert_eq!(cache.get_valid_token("u1").await.unwrap(), "tok-3");
    }

    #[tokio::test]
    async fn zero_ttl_response_is_not_cached() {
        let issuer = ScriptedIssuer::new(3600).then(Ok(IssuedToken::new("bad", 0)));
        let (cache, _) = manual_cache(issuer);

        let err = cache.get_valid_token("u1").await.unwrap_err();

        assert!(matches!(err, TokenCacheError::Issuance { .. }));
        assert!(cache.get_token_info("u1").await.is_none());
    }

    #[tokio::test]
    async fn empty_subject_is_rejected_without_issuance() {
        let (cache, _) = manual_cache(ScriptedIssuer::new(3600));

        assert_eq!(cache.get_valid_token("").await.unwrap_err(), TokenCacheError::InvalidSubject);
        assert_eq!(cache.issuer().call_count(), 0);
    }

    #[tokio::test]
    async fn clear_all_tokens_empties_cache() {
        let (cache, _) = manual_cache(ScriptedIssuer::new(3600));
        cache.get_valid_token("u1").await.unwrap();
        cache.get_valid_token("u2").await.unwrap();

        cache.clear_all_tokens().await;

        assert!(!cache.has_valid_token("u1").await);
        assert!(!cache.has_valid_token("u2").await);
        assert!(cache.get_token_info("u1").await.is_none());
    }

    #[tokio::test]
    async fn clones_share_one_map() {
        let (cache, _) = manual_cache(ScriptedIssuer::new(3600));
        let handle = cache.clone();

        handle.get_valid_token("u1").await.unwrap();

        assert!(cache.has_valid_token("u1").await);
        assert_eq!(cache.get_valid_token("u1").await.unwrap(), "tok-1");
        assert_eq!(cache.issuer().call_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_flight_collapses_concurrent_refreshes() {
        let issuer = ScriptedIssuer::new(3600).with_delay(Duration::from_millis(200));
        let (cache, _) = manual_cache(issuer);
        let cache = cache.with_single_flight(true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_valid_token("u1").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "tok-1");
        }
        assert_eq!(cache.issuer().call_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_without_single_flight_are_last_writer_wins() {
        let issuer = ScriptedIssuer::new(3600).with_delay(Duration::from_millis(200));
        let (cache, _) = manual_cache(issuer);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_valid_token("u1").await })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }

        assert!(cache.issuer().call_count() > 1);
        let stored = cache.get_token_info("u1").await.unwrap().token;
        assert!(tokens.contains(&stored));
        assert!(cache.has_valid_token("u1").await);
    }
}
