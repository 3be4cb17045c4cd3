//! Opaque OAuth state tokens for vendor-redirect flows — spec.md §4.7:
//! 32-byte opaque values, 10-minute TTL, one-shot consume-on-match
//! validation, cleaned by a background ticker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tokio::sync::Mutex;

const STATE_TTL: Duration = Duration::minutes(10);
const JANITOR_TICK: StdDuration = StdDuration::from_secs(60);

fn new_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Default)]
pub struct OAuthStateStore {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl OAuthStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Issues a new state token, valid for `STATE_TTL`.
    pub async fn issue(&self) -> String {
        let token = new_opaque_token();
        self.entries.lock().await.insert(token.clone(), Utc::now() + STATE_TTL);
        token
    }

    /// One-shot validation: the token is removed regardless of outcome, so
    /// a replayed value never validates twice.
    pub async fn consume(&self, token: &str) -> bool {
        let expires_at = self.entries.lock().await.remove(token);
        match expires_at {
            Some(expires_at) => expires_at > Utc::now(),
            None => false,
        }
    }

    async fn sweep_expired(&self) {
        let now = Utc::now();
        self.entries.lock().await.retain(|_, expires_at| *expires_at > now);
    }
}

/// Long-lived background task: periodically drops expired, never-consumed
/// state tokens so the map doesn't grow unbounded.
pub async fn run_janitor(store: Arc<OAuthStateStore>) {
    let mut interval = tokio::time::interval(JANITOR_TICK);
    loop {
        interval.tick().await;
        store.sweep_expired().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_token_validates_exactly_once() {
        let store = OAuthStateStore::new();
        let token = store.issue().await;
        assert!(store.consume(&token).await);
        assert!(!store.consume(&token).await);
    }

    #[tokio::test]
    async fn unknown_token_never_validates() {
        let store = OAuthStateStore::new();
        assert!(!store.consume("not-a-real-token").await);
    }

    #[tokio::test]
    async fn sweep_drops_expired_entries() {
        let store = OAuthStateStore::new();
        {
            let mut entries = store.entries.lock().await;
            entries.insert("expired".into(), Utc::now() - Duration::minutes(1));
        }
        store.sweep_expired().await;
        assert!(!store.consume("expired").await);
    }
}
