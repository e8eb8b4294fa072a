use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::models::AccessToken;

/// Tokens are considered stale this long before PayPal would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Upper bound on how long a token is reused, whatever `expires_in` claims.
const MAX_CACHED_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// A freshly issued credential and its reported lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: AccessToken,
    pub expires_in: Option<Duration>,
}

struct CachedToken {
    token: AccessToken,
    expires_at: Instant,
}

/// Process-wide cache of bearer credentials keyed by client id.
///
/// The lock is held across a refresh, so concurrent callers for an expired
/// entry wait for one token request instead of each issuing their own.
/// Failed refreshes leave the cache untouched.
#[derive(Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_refresh<F, Fut, E>(&self, client_id: &str, refresh: F) -> Result<AccessToken, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, E>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(cached) = entries.get(client_id) {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
            entries.remove(client_id);
        }

        let issued = refresh().await?;

        // Without a lifetime there is nothing to track, so the token is used once.
        if let Some(lifetime) = issued.expires_in {
            let expires_at = lifetime
                .checked_sub(EXPIRY_MARGIN)
                .map(|usable| usable.min(MAX_CACHED_LIFETIME))
                .and_then(|usable| Instant::now().checked_add(usable));
            if let Some(expires_at) = expires_at {
                entries.insert(
                    client_id.to_string(),
                    CachedToken {
                        token: issued.token.clone(),
                        expires_at,
                    },
                );
            }
        }

        Ok(issued.token)
    }

    pub async fn invalidate(&self, client_id: &str) {
        self.entries.lock().await.remove(client_id);
    }

    pub async fn contains(&self, client_id: &str) -> bool {
        self.entries.lock().await.contains_key(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn issued(token: &str, secs: Option<u64>) -> IssuedToken {
        IssuedToken {
            token: AccessToken::new(token),
            expires_in: secs.map(Duration::from_secs),
        }
    }

    #[tokio::test]
    async fn test_reuses_unexpired_token() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let token = cache
                .get_or_refresh("client", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(issued("tok-abc", Some(3600)))
                })
                .await
                .unwrap();
            assert_eq!(token.expose(), "tok-abc");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_not_cached() {
        let cache = TokenCache::new();

        let result = cache
            .get_or_refresh("client", || async { Err::<IssuedToken, _>("denied") })
            .await;
        assert_eq!(result.unwrap_err(), "denied");
        assert!(!cache.contains("client").await);
    }

    #[tokio::test]
    async fn test_short_lived_and_unbounded_tokens_are_not_cached() {
        let cache = TokenCache::new();

        cache
            .get_or_refresh("client", || async { Ok::<_, ()>(issued("short", Some(30))) })
            .await
            .unwrap();
        assert!(!cache.contains("client").await);

        cache
            .get_or_refresh("client", || async { Ok::<_, ()>(issued("unbounded", None)) })
            .await
            .unwrap();
        assert!(!cache.contains("client").await);
    }

    #[tokio::test]
    async fn test_oversized_expiry_is_capped() {
        let cache = TokenCache::new();

        let token = cache
            .get_or_refresh("client", || async { Ok::<_, ()>(issued("tok-abc", Some(u64::MAX))) })
            .await
            .unwrap();

        assert_eq!(token.expose(), "tok-abc");
        let entries = cache.entries.lock().await;
        let cached = entries.get("client").unwrap();
        assert!(cached.expires_at <= Instant::now() + MAX_CACHED_LIFETIME);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let cache = TokenCache::new();
        cache
            .get_or_refresh("client", || async { Ok::<_, ()>(issued("first", Some(3600))) })
            .await
            .unwrap();

        cache.invalidate("client").await;

        let token = cache
            .get_or_refresh("client", || async { Ok::<_, ()>(issued("second", Some(3600))) })
            .await
            .unwrap();
        assert_eq!(token.expose(), "second");
    }

    #[tokio::test]
    async fn test_entries_are_keyed_by_client_id() {
        let cache = TokenCache::new();
        cache
            .get_or_refresh("a", || async { Ok::<_, ()>(issued("tok-a", Some(3600))) })
            .await
            .unwrap();

        let token = cache
            .get_or_refresh("b", || async { Ok::<_, ()>(issued("tok-b", Some(3600))) })
            .await
            .unwrap();
        assert_eq!(token.expose(), "tok-b");
    }
}
