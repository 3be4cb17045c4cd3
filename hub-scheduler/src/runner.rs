//! Claims and executes due `Job`s — spec.md §4.6.
//!
//! The claim CAS (`Store::claim_job`) is the only synchronization point
//! between this loop and the expander; everything else about a job is owned
//! by whichever worker claimed it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hub_scene_engine::{Engine, ExecuteOptions};
use hub_store::Store;

use crate::error::Result;

pub const RUNNER_TICK: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LATE_TOLERANCE: chrono::Duration = chrono::Duration::minutes(10);
pub const DEFAULT_STALE_CLAIM_TIMEOUT: chrono::Duration = chrono::Duration::minutes(10);
const MAX_CLAIMS_PER_TICK: u32 = 20;
const MAX_BACKOFF: chrono::Duration = chrono::Duration::minutes(5);

/// Transient failures are retried; anything else fails the job outright.
fn is_transient(code: &str) -> bool {
    matches!(
        code,
        "scene-lock-held" | "sonos-unreachable" | "sonos-topology-changed" | "scene-coordinator-unavailable"
    )
}

fn backoff_for(attempt_count: u32) -> chrono::Duration {
    let exp = attempt_count.saturating_sub(1).min(10);
    let minutes = 1i64.checked_shl(exp).unwrap_or(i64::MAX);
    chrono::Duration::minutes(minutes).min(MAX_BACKOFF)
}

/// Runs one claimed job to completion, applying the routine's scene and
/// music policy as an `ExecuteOptions` override.
async fn run_job(store: &Store, engine: &Engine, job_id: &str) -> Result<()> {
    let job = store.get_job(job_id)?;
    let routine = store.get_routine(&job.routine_id)?;

    store.mark_running(job_id)?;

    let opts = ExecuteOptions {
        music_policy_override: Some(routine.music_policy.clone()),
        ..ExecuteOptions::default()
    };

    match engine.execute(&routine.scene_id, None, opts).await {
        Ok(_) => {
            store.mark_succeeded(job_id)?;
        }
        Err(e) => {
            let code = e.code();
            if is_transient(code) {
                store.retry_or_fail_with_backoff(job_id, &e.to_string(), DEFAULT_MAX_ATTEMPTS, backoff_for(job.attempt_count + 1))?;
            } else {
                store.mark_failed(job_id, &format!("{code}: {e}"))?;
            }
        }
    }
    Ok(())
}

/// One tick: claim up to `MAX_CLAIMS_PER_TICK` due jobs, skipping any whose
/// window is more than `late_tolerance` stale, and run the rest.
pub async fn tick(store: Arc<Store>, engine: Arc<Engine>, late_tolerance: chrono::Duration) -> Result<()> {
    let now = Utc::now();
    let due = store.due_jobs(now, MAX_CLAIMS_PER_TICK)?;

    for job in due {
        if now - job.scheduled_for > late_tolerance {
            if store.claim_job(&job.id)? {
                store.mark_skipped(&job.id, "late")?;
            }
            continue;
        }
        if !store.claim_job(&job.id)? {
            continue;
        }
        let store = store.clone();
        let engine = engine.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            if let Err(e) = run_job(&store, &engine, &job_id).await {
                tracing::warn!(error = %e, job_id, "job execution failed");
            }
        });
    }
    Ok(())
}

/// Long-lived background task: recovers stale claims once on startup, then
/// ticks every [`RUNNER_TICK`].
pub async fn run(store: Arc<Store>, engine: Arc<Engine>) {
    if let Err(e) = store.recover_stale_claims(Utc::now(), DEFAULT_STALE_CLAIM_TIMEOUT) {
        tracing::warn!(error = %e, "stale-claim recovery sweep failed");
    }

    let mut interval = tokio::time::interval(RUNNER_TICK);
    loop {
        interval.tick().await;
        if let Err(e) = tick(store.clone(), engine.clone(), DEFAULT_LATE_TOLERANCE).await {
            tracing::warn!(error = %e, "runner tick failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retried() {
        assert!(is_transient("scene-lock-held"));
        assert!(is_transient("sonos-unreachable"));
        assert!(!is_transient("scene-not-found"));
        assert!(!is_transient("internal-error"));
    }

    #[test]
    fn backoff_doubles_and_caps_at_five_minutes() {
        assert_eq!(backoff_for(1), chrono::Duration::minutes(1));
        assert_eq!(backoff_for(2), chrono::Duration::minutes(2));
        assert_eq!(backoff_for(3), chrono::Duration::minutes(4));
        assert_eq!(backoff_for(10), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn late_job_is_marked_skipped_not_run() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        use hub_store::types::{HolidayBehavior, MusicPolicy, MusicPolicyKind, Routine, Schedule};
        let routine = Routine {
            id: "r1".into(),
            name: "late".into(),
            scene_id: "s1".into(),
            timezone: "UTC".into(),
            schedule: Schedule::Cron { expr: "0 9 * * *".into() },
            holiday_behavior: HolidayBehavior::Run,
            enabled: true,
            snooze_until: None,
            skip_next: false,
            music_policy: MusicPolicy {
                kind: MusicPolicyKind::Fixed,
                favorite_id: None,
                music_set_id: None,
                direct_content: None,
                no_repeat_window_minutes: 10_080,
            },
            template_id: None,
        };
        store.upsert_routine(&routine).unwrap();
        let old = Utc::now() - chrono::Duration::minutes(30);
        store.create_pending_job("r1", old).unwrap();

        let engine = Arc::new(hub_scene_engine::Engine::new(
            Arc::new(hub_api::PlayerActions::new(Arc::new(hub_soap_client::SoapClient::new()))),
            store.clone(),
            Arc::new(hub_state_cache::StateCache::new(30)),
            Arc::new(NullTopology),
        ));

        tick(store.clone(), engine, DEFAULT_LATE_TOLERANCE).await.unwrap();

        let due = store.due_jobs(Utc::now(), 10).unwrap();
        assert!(due.is_empty());
    }

    struct NullTopology;
    impl hub_scene_engine::TopologySource for NullTopology {
        fn snapshot(&self) -> hub_topology::DeviceTopology {
            hub_topology::DeviceTopology::empty()
        }
    }
}
