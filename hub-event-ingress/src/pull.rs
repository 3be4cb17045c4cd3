//! Pull-path verification: synchronous `GetTransportInfo` + `GetPositionInfo`
//! used by the scene engine's `verify_playback` step, merged into the same
//! cache under the same lock as event-sourced patches.

use chrono::Utc;
use hub_api::{PlayerActions, TransportState as ApiTransportState};
use hub_state_cache::{PlaybackStatePatch, Source, StateSink, TransportState};

fn map_transport_state(state: ApiTransportState) -> TransportState {
    match state {
        ApiTransportState::Playing => TransportState::Playing,
        ApiTransportState::Paused => TransportState::Paused,
        ApiTransportState::Stopped => TransportState::Stopped,
        ApiTransportState::Transitioning => TransportState::Transitioning,
        _ => TransportState::Other,
    }
}

fn parse_rel_time_ms(rel_time: &str) -> Option<u64> {
    let parts: Vec<&str> = rel_time.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let h: u64 = parts[0].parse().ok()?;
    let m: u64 = parts[1].parse().ok()?;
    let s: u64 = parts[2].parse().ok()?;
    Some(((h * 60 + m) * 60 + s) * 1000)
}

/// Polls a single player's transport + position over SOAP and folds the
/// result into the cache as a `Source::Poll` patch. Used when the scene
/// engine needs a confirmed read rather than waiting on an event that may
/// never arrive.
pub async fn poll_and_apply(
    actions: &PlayerActions,
    sink: &dyn StateSink,
    udn: &str,
    ip: &str,
) -> hub_api::Result<()> {
    let transport = actions.get_transport_info(ip).await?;
    let position = actions.get_position_info(ip).await?;

    let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Poll);
    patch.transport_state = Some(map_transport_state(transport.state));
    patch.transport_status = Some(transport.status);
    if !position.track_uri.is_empty() {
        patch.current_track_uri = Some(position.track_uri);
    }
    patch.relative_time_ms = parse_rel_time_ms(&position.rel_time);
    patch.duration_ms = parse_rel_time_ms(&position.duration);

    sink.apply(udn, ip, patch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rel_time() {
        assert_eq!(parse_rel_time_ms("0:03:45"), Some(225_000));
        assert_eq!(parse_rel_time_ms("bad"), None);
    }

    #[test]
    fn maps_known_transport_states() {
        assert_eq!(map_transport_state(ApiTransportState::Playing), TransportState::Playing);
        assert_eq!(map_transport_state(ApiTransportState::Paused), TransportState::Paused);
    }
}
