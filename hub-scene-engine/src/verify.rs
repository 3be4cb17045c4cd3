//! Step 7: `verify_playback` — spec.md §4.5.

use std::time::Duration;

use hub_api::PlayerActions;
use hub_state_cache::{StateProvider, TransportState};
use hub_store::types::VerificationRecord;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn uri_matches(observed: &str, expected: &str) -> bool {
    observed == expected || observed.starts_with(expected) || expected.starts_with(observed)
}

/// Polls the state cache every 200ms up to `verify_timeout`. Falls back to
/// a single direct SOAP poll if the cache never produced an entry for this
/// IP, per spec.md §4.5 step 7.
pub async fn verify_playback(
    actions: &PlayerActions,
    state: &dyn StateProvider,
    coordinator_ip: &str,
    expected_uri: &str,
    verify_timeout: Duration,
) -> VerificationRecord {
    let deadline = tokio::time::Instant::now() + verify_timeout;
    let mut saw_any_entry = false;

    loop {
        if let Some(snapshot) = state.get(coordinator_ip) {
            saw_any_entry = true;
            let playing = snapshot.transport_state == TransportState::Playing;
            let uri_ok = snapshot
                .current_track_uri
                .as_deref()
                .map(|uri| uri_matches(uri, expected_uri))
                .unwrap_or(false);
            if playing && uri_ok {
                return VerificationRecord {
                    confirmed: true,
                    verification_unavailable: false,
                    observed_track_uri: snapshot.current_track_uri,
                };
            }
        }

        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    if saw_any_entry {
        return VerificationRecord {
            confirmed: false,
            verification_unavailable: false,
            observed_track_uri: state.get(coordinator_ip).and_then(|s| s.current_track_uri),
        };
    }

    match actions.get_transport_info(coordinator_ip).await {
        Ok(info) => VerificationRecord {
            confirmed: info.state == hub_api::TransportState::Playing,
            verification_unavailable: true,
            observed_track_uri: None,
        },
        Err(_) => VerificationRecord {
            confirmed: false,
            verification_unavailable: true,
            observed_track_uri: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_covers_station_like_uris() {
        assert!(uri_matches("x-sonosapi-stream:s1234?sid=9", "x-sonosapi-stream:s1234"));
        assert!(!uri_matches("x-file-cifs://a", "x-file-cifs://b"));
    }
}
