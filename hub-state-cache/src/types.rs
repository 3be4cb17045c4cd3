//! Cache entry type — spec.md §3 `PlaybackState`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
    Transitioning,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Event,
    Cloud,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub udn: String,
    pub ip: String,
    pub transport_state: TransportState,
    pub transport_status: Option<String>,
    pub current_track_uri: Option<String>,
    pub duration_ms: Option<u64>,
    pub relative_time_ms: Option<u64>,
    pub track_metadata: Option<String>,
    pub volume: Option<u8>,
    pub muted: Option<bool>,
    pub updated_at: DateTime<Utc>,
    pub source: Source,
}

impl PlaybackState {
    pub fn empty(udn: impl Into<String>, ip: impl Into<String>, source: Source) -> Self {
        Self {
            udn: udn.into(),
            ip: ip.into(),
            transport_state: TransportState::Other,
            transport_status: None,
            current_track_uri: None,
            duration_ms: None,
            relative_time_ms: None,
            track_metadata: None,
            volume: None,
            muted: None,
            updated_at: Utc::now(),
            source,
        }
    }

    pub fn is_stale(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.updated_at > ttl
    }

    /// Merge non-null fields from `patch` into `self`, matching the
    /// "merges non-null fields" rule in spec.md §4.4. `patch.updated_at`
    /// always wins since callers only build a patch for newer data.
    pub fn merge(&mut self, patch: PlaybackStatePatch) {
        if let Some(v) = patch.transport_state {
            self.transport_state = v;
        }
        if patch.transport_status.is_some() {
            self.transport_status = patch.transport_status;
        }
        if patch.current_track_uri.is_some() {
            self.current_track_uri = patch.current_track_uri;
        }
        if patch.duration_ms.is_some() {
            self.duration_ms = patch.duration_ms;
        }
        if patch.relative_time_ms.is_some() {
            self.relative_time_ms = patch.relative_time_ms;
        }
        if patch.track_metadata.is_some() {
            self.track_metadata = patch.track_metadata;
        }
        if patch.volume.is_some() {
            self.volume = patch.volume;
        }
        if patch.muted.is_some() {
            self.muted = patch.muted;
        }
        self.updated_at = patch.updated_at;
        self.source = patch.source;
    }
}

/// A partial update merged into an existing `PlaybackState`. `None`
/// fields are left untouched rather than overwritten.
#[derive(Debug, Clone)]
pub struct PlaybackStatePatch {
    pub transport_state: Option<TransportState>,
    pub transport_status: Option<String>,
    pub current_track_uri: Option<String>,
    pub duration_ms: Option<u64>,
    pub relative_time_ms: Option<u64>,
    pub track_metadata: Option<String>,
    pub volume: Option<u8>,
    pub muted: Option<bool>,
    pub updated_at: DateTime<Utc>,
    pub source: Source,
}

impl PlaybackStatePatch {
    pub fn new(updated_at: DateTime<Utc>, source: Source) -> Self {
        Self {
            transport_state: None,
            transport_status: None,
            current_track_uri: None,
            duration_ms: None,
            relative_time_ms: None,
            track_metadata: None,
            volume: None,
            muted: None,
            updated_at,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_leaves_unset_fields_untouched() {
        let mut state = PlaybackState::empty("RINCON_1", "10.0.0.1", Source::Poll);
        state.volume = Some(20);
        let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Event);
        patch.muted = Some(true);
        state.merge(patch);
        assert_eq!(state.volume, Some(20));
        assert_eq!(state.muted, Some(true));
        assert_eq!(state.source, Source::Event);
    }
}
