//! Cloud webhook ingress — Sonos's cloud push events arrive as JSON
//! rather than UPnP NOTIFY, keyed by group rather than by player IP, per
//! spec.md §4.4.

use std::sync::Arc;

use chrono::Utc;
use hub_state_cache::{PlaybackStatePatch, Source, StateSink, TransportState};
use serde::Deserialize;
use warp::Filter;

/// Resolves a cloud group ID to the coordinator's (UDN, IP). Implemented
/// downstream by the hub binary using hub-topology, so this crate never
/// depends on it directly — the same adapter boundary `StateSink` uses.
pub trait GroupToIpResolver: Send + Sync {
    fn resolve(&self, group_id: &str) -> Option<(String, String)>;
}

#[derive(Debug, Deserialize)]
struct CloudEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "groupId")]
    group_id: String,
    #[allow(dead_code)]
    #[serde(rename = "householdId")]
    household_id: String,
    data: serde_json::Value,
}

fn playback_status_patch(data: &serde_json::Value) -> PlaybackStatePatch {
    let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Cloud);
    if let Some(state) = data.get("playbackState").and_then(|v| v.as_str()) {
        patch.transport_state = Some(match state {
            "PLAYBACK_STATE_PLAYING" => TransportState::Playing,
            "PLAYBACK_STATE_PAUSED" => TransportState::Paused,
            "PLAYBACK_STATE_STOPPED" | "PLAYBACK_STATE_IDLE" => TransportState::Stopped,
            "PLAYBACK_STATE_BUFFERING" => TransportState::Transitioning,
            _ => TransportState::Other,
        });
    }
    patch
}

fn volume_patch(data: &serde_json::Value) -> PlaybackStatePatch {
    let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Cloud);
    patch.volume = data.get("volume").and_then(|v| v.as_u64()).map(|v| v as u8);
    patch.muted = data.get("muted").and_then(|v| v.as_bool());
    patch
}

fn metadata_status_patch(data: &serde_json::Value) -> PlaybackStatePatch {
    let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Cloud);
    patch.current_track_uri = data
        .get("container")
        .and_then(|c| c.get("id"))
        .and_then(|i| i.get("objectId"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    patch.track_metadata = Some(data.to_string());
    patch
}

fn patch_for_event(event: &CloudEvent) -> Option<PlaybackStatePatch> {
    match event.event_type.as_str() {
        "playbackStatus" => Some(playback_status_patch(&event.data)),
        "volume" => Some(volume_patch(&event.data)),
        "metadataStatus" => Some(metadata_status_patch(&event.data)),
        _ => None,
    }
}

pub fn webhook_route(
    resolver: Arc<dyn GroupToIpResolver>,
    sink: Arc<dyn StateSink>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::body::json())
        .map(move |event: CloudEvent| {
            let Some(patch) = patch_for_event(&event) else {
                tracing::debug!(event_type = %event.event_type, "ignoring unrecognized cloud event type");
                return warp::reply::with_status("", warp::http::StatusCode::OK);
            };

            match resolver.resolve(&event.group_id) {
                Some((udn, ip)) => {
                    sink.apply(&udn, &ip, patch);
                }
                None => {
                    tracing::warn!(group_id = %event.group_id, "cloud event for unresolved group, dropping");
                }
            }
            warp::reply::with_status("", warp::http::StatusCode::OK)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_playback_status() {
        let data = json!({ "playbackState": "PLAYBACK_STATE_PLAYING" });
        let patch = playback_status_patch(&data);
        assert_eq!(patch.transport_state, Some(TransportState::Playing));
    }

    #[test]
    fn maps_volume_and_mute() {
        let data = json!({ "volume": 22, "muted": false });
        let patch = volume_patch(&data);
        assert_eq!(patch.volume, Some(22));
        assert_eq!(patch.muted, Some(false));
    }

    #[test]
    fn unrecognized_event_type_yields_none() {
        let event = CloudEvent {
            event_type: "somethingElse".into(),
            group_id: "RINCON_G1".into(),
            household_id: "Sonos_1".into(),
            data: json!({}),
        };
        assert!(patch_for_event(&event).is_none());
    }
}
