//! The IP-keyed cache itself.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Duration;

use crate::types::{PlaybackState, PlaybackStatePatch, Source};

/// Thread-safe `IP → PlaybackState` cache. Readers take a snapshot clone
/// under a shared lock; the single writer path merges patches in place,
/// matching `StateCache`'s `Arc<RwLock<HashMap<...>>>` shape.
#[derive(Clone)]
pub struct StateCache {
    entries: Arc<RwLock<HashMap<String, PlaybackState>>>,
    ttl: Duration,
}

impl StateCache {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Snapshot read. Stale entries are still returned — `source` stays
    /// intact so callers can decide whether to refresh, per spec.md §4.4.
    pub fn get(&self, ip: &str) -> Option<PlaybackState> {
        self.entries.read().ok()?.get(ip).cloned()
    }

    pub fn is_stale(&self, ip: &str) -> bool {
        self.get(ip).map(|s| s.is_stale(self.ttl)).unwrap_or(true)
    }

    /// Apply a patch, creating the entry if absent. Returns the merged
    /// state. Last-write-wins within one IP by `patch.updated_at`; writes
    /// to different IPs never contend.
    pub fn apply(&self, udn: &str, ip: &str, patch: PlaybackStatePatch) -> Option<PlaybackState> {
        let mut entries = self.entries.write().ok()?;
        let entry = entries
            .entry(ip.to_string())
            .or_insert_with(|| PlaybackState::empty(udn, ip, patch.source));

        if patch.updated_at < entry.updated_at {
            tracing::debug!(ip, "dropping out-of-order patch");
            return Some(entry.clone());
        }

        entry.merge(patch);
        Some(entry.clone())
    }

    pub fn remove(&self, ip: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(ip);
        }
    }

    /// Drop entries the janitor decides have aged past usefulness (distinct
    /// from `is_stale`, which just flags staleness to readers).
    pub fn evict_older_than(&self, max_age: Duration) {
        let cutoff = chrono::Utc::now() - max_age;
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, state| state.updated_at >= cutoff);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransportState;

    #[test]
    fn apply_creates_then_merges() {
        let cache = StateCache::new(30);
        let mut patch = PlaybackStatePatch::new(chrono::Utc::now(), Source::Event);
        patch.volume = Some(40);
        cache.apply("RINCON_1", "10.0.0.1", patch);

        let mut patch2 = PlaybackStatePatch::new(chrono::Utc::now(), Source::Event);
        patch2.transport_state = Some(TransportState::Playing);
        cache.apply("RINCON_1", "10.0.0.1", patch2);

        let state = cache.get("10.0.0.1").unwrap();
        assert_eq!(state.volume, Some(40));
        assert_eq!(state.transport_state, TransportState::Playing);
    }

    #[test]
    fn out_of_order_patch_is_dropped() {
        let cache = StateCache::new(30);
        let now = chrono::Utc::now();
        let mut newer = PlaybackStatePatch::new(now, Source::Event);
        newer.volume = Some(99);
        cache.apply("RINCON_1", "10.0.0.1", newer);

        let mut older = PlaybackStatePatch::new(now - chrono::Duration::seconds(5), Source::Poll);
        older.volume = Some(1);
        cache.apply("RINCON_1", "10.0.0.1", older);

        assert_eq!(cache.get("10.0.0.1").unwrap().volume, Some(99));
    }

    #[test]
    fn independent_ips_do_not_interfere() {
        let cache = StateCache::new(30);
        cache.apply("RINCON_1", "10.0.0.1", PlaybackStatePatch::new(chrono::Utc::now(), Source::Event));
        cache.apply("RINCON_2", "10.0.0.2", PlaybackStatePatch::new(chrono::Utc::now(), Source::Event));
        assert_eq!(cache.len(), 2);
    }
}
