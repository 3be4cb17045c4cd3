//! Step 6: `start_playback` — spec.md §4.5. UPnP fault 701 ("transition
//! not available") gets exactly one retry after a short delay; anything
//! else is fatal immediately.

use std::time::Duration;

use hub_api::{ApiError, PlayerActions};

use crate::error::{EngineError, Result};

const RETRY_DELAY: Duration = Duration::from_millis(300);

pub async fn start_playback(actions: &PlayerActions, coordinator_ip: &str) -> Result<()> {
    match actions.play(coordinator_ip).await {
        Ok(()) => Ok(()),
        Err(err) if is_transition_not_available(&err) => {
            tokio::time::sleep(RETRY_DELAY).await;
            actions.play(coordinator_ip).await.map_err(EngineError::from)
        }
        Err(err) => Err(EngineError::from(err)),
    }
}

fn is_transition_not_available(err: &ApiError) -> bool {
    err.is_transition_not_available()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_701_is_detected_as_retryable() {
        assert!(is_transition_not_available(&ApiError::Fault(701)));
        assert!(!is_transition_not_available(&ApiError::Fault(500)));
    }
}
