//! Adapter traits that break the cache ↔ command-client dependency cycle
//! called out in spec.md §9: the command client (SOAP pull-path in
//! `hub-scene-engine`) depends on `StateProvider`; the cache implements it
//! directly rather than the other way around.

use crate::types::{PlaybackState, PlaybackStatePatch};

/// The read side. Implemented directly by `StateCache`.
pub trait StateProvider: Send + Sync {
    fn get(&self, ip: &str) -> Option<PlaybackState>;
    fn is_stale(&self, ip: &str) -> bool;
}

/// The write side, used by event ingress and the scene engine's
/// verification pull-path.
pub trait StateSink: Send + Sync {
    fn apply(&self, udn: &str, ip: &str, patch: PlaybackStatePatch) -> Option<PlaybackState>;
}

impl StateProvider for crate::cache::StateCache {
    fn get(&self, ip: &str) -> Option<PlaybackState> {
        crate::cache::StateCache::get(self, ip)
    }

    fn is_stale(&self, ip: &str) -> bool {
        crate::cache::StateCache::is_stale(self, ip)
    }
}

impl StateSink for crate::cache::StateCache {
    fn apply(&self, udn: &str, ip: &str, patch: PlaybackStatePatch) -> Option<PlaybackState> {
        crate::cache::StateCache::apply(self, udn, ip, patch)
    }
}
