//! Cached developer/access token with double-checked refresh — spec.md
//! §4.7: "refreshing when expiry − 5min ≤ now under a single-writer lock
//! (double-check after lock acquisition)".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hub_store::types::CloudToken;
use hub_store::Store;
use tokio::sync::Mutex;

use crate::error::Result;

const REFRESH_MARGIN: Duration = Duration::minutes(5);

/// Fetches a fresh token from a vendor (Sonos Cloud, Apple, Spotify). The
/// only thing `TokenManager` needs from the outside world.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, provider: &str, current: Option<&CloudToken>) -> Result<CloudToken>;
}

fn needs_refresh(token: &CloudToken, now: chrono::DateTime<Utc>) -> bool {
    token.expires_at - REFRESH_MARGIN <= now
}

/// `GetToken()` — the narrow contract external callers (the cloud webhook
/// path) actually depend on; `TokenManager` is the only implementation.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, provider: &str) -> Result<CloudToken>;
}

pub struct TokenManager {
    store: Arc<Store>,
    refresher: Arc<dyn TokenRefresher>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(store: Arc<Store>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn provider_lock(&self, provider: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(provider.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

}

#[async_trait]
impl TokenProvider for TokenManager {
    /// Always returns a token valid for at least `REFRESH_MARGIN` — spec.md
    /// §4.7's single external contract for token freshness.
    async fn get_token(&self, provider: &str) -> Result<CloudToken> {
        let now = Utc::now();
        if let Ok(cached) = self.store.get_token(provider) {
            if !needs_refresh(&cached, now) {
                return Ok(cached);
            }
        }

        let lock = self.provider_lock(provider).await;
        let _guard = lock.lock().await;

        // Double-check: another caller may have refreshed while we waited.
        let current = self.store.get_token(provider).ok();
        if let Some(cached) = &current {
            if !needs_refresh(cached, Utc::now()) {
                return Ok(cached.clone());
            }
        }

        let refreshed = self.refresher.refresh(provider, current.as_ref()).await?;
        self.store.upsert_token(&refreshed)?;
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRefresher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, provider: &str, _current: Option<&CloudToken>) -> Result<CloudToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CloudToken {
                provider: provider.to_string(),
                access_token: "fresh".into(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    #[tokio::test]
    async fn refreshes_when_expiry_within_margin() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .upsert_token(&CloudToken {
                provider: "sonos-cloud".into(),
                access_token: "stale".into(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::minutes(1),
            })
            .unwrap();
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0) });
        let manager = TokenManager::new(store, refresher.clone());

        let token = manager.get_token("sonos-cloud").await.unwrap();
        assert_eq!(token.access_token, "fresh");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skips_refresh_when_far_from_expiry() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .upsert_token(&CloudToken {
                provider: "sonos-cloud".into(),
                access_token: "valid".into(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .unwrap();
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0) });
        let manager = TokenManager::new(store, refresher.clone());

        let token = manager.get_token("sonos-cloud").await.unwrap();
        assert_eq!(token.access_token, "valid");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_only_refresh_once() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .upsert_token(&CloudToken {
                provider: "sonos-cloud".into(),
                access_token: "stale".into(),
                refresh_token: None,
                expires_at: Utc::now(),
            })
            .unwrap();
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0) });
        let manager = Arc::new(TokenManager::new(store, refresher.clone()));

        let (a, b) = tokio::join!(manager.get_token("sonos-cloud"), manager.get_token("sonos-cloud"));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }
}
