//! `Execute`/`StopScene` — the 8-step pipeline orchestrator, spec.md §4.5.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hub_api::PlayerActions;
use hub_state_cache::StateProvider;
use hub_store::types::{
    ExecutionError, ExecutionStatus, MusicPolicy, Scene, SceneExecution, StepName, StepRecord, StepStatus,
};
use hub_store::Store;
use hub_topology::DeviceTopology;
use uuid::Uuid;

use crate::cancellation::CancellationRegistry;
use crate::coordinator::choose_coordinator;
use crate::error::{EngineError, Result};
use crate::lock::CoordinatorLockMap;
use crate::topology_source::TopologySource;
use crate::{content, grouping, playback, verify, volume};

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub lock_timeout_ms: u64,
    pub verify_timeout_ms: u64,
    pub boot_seq: u32,
    pub music_policy_override: Option<MusicPolicy>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
            verify_timeout_ms: 3000,
            boot_seq: 1,
            music_policy_override: None,
        }
    }
}

pub struct ExecuteOutcome {
    pub execution: SceneExecution,
    pub idempotent: bool,
}

#[derive(Debug, Clone)]
pub struct MemberStopResult {
    pub udn: String,
    pub ok: bool,
}

pub struct StopOutcome {
    pub results: Vec<MemberStopResult>,
    pub all_succeeded: bool,
}

pub struct Engine {
    actions: Arc<PlayerActions>,
    store: Arc<Store>,
    state: Arc<dyn StateProvider>,
    topology: Arc<dyn TopologySource>,
    locks: Arc<CoordinatorLockMap>,
    cancellations: Arc<CancellationRegistry>,
}

fn set_step(steps: &mut [StepRecord], name: StepName, status: StepStatus, details: Option<String>, error: Option<String>) {
    if let Some(step) = steps.iter_mut().find(|s| s.name == name) {
        let now = Utc::now();
        if step.started_at.is_none() {
            step.started_at = Some(now);
        }
        step.status = status;
        step.details = details;
        step.error = error;
        if matches!(status, StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped) {
            step.ended_at = Some(now);
        }
    }
}

fn member_ip(topology: &DeviceTopology, udn: &str) -> Option<String> {
    topology.logical.iter().find(|d| d.udn == udn).map(|d| d.ip.clone())
}

impl Engine {
    pub fn new(
        actions: Arc<PlayerActions>,
        store: Arc<Store>,
        state: Arc<dyn StateProvider>,
        topology: Arc<dyn TopologySource>,
    ) -> Self {
        Self {
            actions,
            store,
            state,
            topology,
            locks: Arc::new(CoordinatorLockMap::new()),
            cancellations: CancellationRegistry::new(),
        }
    }

    pub async fn execute(
        &self,
        scene_id: &str,
        idempotency_key: Option<String>,
        opts: ExecuteOptions,
    ) -> Result<ExecuteOutcome> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_non_terminal_by_idempotency_key(key)? {
                return Ok(ExecuteOutcome {
                    execution: existing,
                    idempotent: true,
                });
            }
            // A terminal execution under the same key is replayed by
            // reference rather than re-run (spec.md §4.5 step 1).
            if let Some(existing) = self.store.find_latest_by_idempotency_key(key)? {
                return Ok(ExecuteOutcome {
                    execution: existing,
                    idempotent: true,
                });
            }
        }

        let scene = self
            .store
            .get_scene(scene_id)
            .map_err(|_| EngineError::SceneNotFound(scene_id.to_string()))?;

        let mut execution = SceneExecution {
            id: Uuid::new_v4().to_string(),
            scene_id: scene_id.to_string(),
            idempotency_key,
            status: ExecutionStatus::Starting,
            coordinator_used: None,
            started_at: Utc::now(),
            ended_at: None,
            verification: None,
            error: None,
            steps: StepRecord::initial_steps(),
        };
        self.store.insert_execution(&execution)?;

        let cancel_guard = self.cancellations.register(&execution.id);
        let outcome = self.run_pipeline(&scene, &mut execution, &opts, &cancel_guard).await;
        execution.ended_at = Some(Utc::now());

        match outcome {
            Ok(()) => {}
            Err(err) => {
                execution.status = ExecutionStatus::Failed;
                execution.error = Some(ExecutionError {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            }
        }
        self.store.update_execution(&execution)?;

        Ok(ExecuteOutcome {
            execution,
            idempotent: false,
        })
    }

    async fn run_pipeline(
        &self,
        scene: &Scene,
        execution: &mut SceneExecution,
        opts: &ExecuteOptions,
        cancel: &crate::cancellation::CancellationGuard,
    ) -> Result<()> {
        let topology = self.topology.snapshot();

        // choose_coordinator has no side effects, so it's resolved before
        // the lock is taken even though it's recorded second in step order
        // — the lock must be keyed on the coordinator it protects.
        let coordinator_udn = match choose_coordinator(scene, &topology, &*self.state) {
            Ok(udn) => {
                set_step(&mut execution.steps, StepName::ChooseCoordinator, StepStatus::Succeeded, Some(udn.clone()), None);
                udn
            }
            Err(err) => {
                set_step(&mut execution.steps, StepName::ChooseCoordinator, StepStatus::Failed, None, Some(err.to_string()));
                set_step(&mut execution.steps, StepName::AcquireLock, StepStatus::Skipped, None, None);
                set_step(&mut execution.steps, StepName::ReleaseLock, StepStatus::Skipped, None, None);
                return Err(err);
            }
        };
        execution.coordinator_used = Some(coordinator_udn.clone());
        execution.status = ExecutionStatus::Grouping;

        let lock = match self
            .locks
            .acquire(&coordinator_udn, Duration::from_millis(opts.lock_timeout_ms))
            .await
        {
            Ok(lock) => {
                set_step(&mut execution.steps, StepName::AcquireLock, StepStatus::Succeeded, None, None);
                lock
            }
            Err(err) => {
                set_step(&mut execution.steps, StepName::AcquireLock, StepStatus::Failed, None, Some(err.to_string()));
                set_step(&mut execution.steps, StepName::ReleaseLock, StepStatus::Skipped, None, None);
                return Err(err);
            }
        };

        // Guaranteed-release block: every exit past this point runs
        // release_lock, even on a fatal step failure.
        let result = self.run_locked_steps(scene, execution, opts, &coordinator_udn, &topology, cancel).await;

        set_step(&mut execution.steps, StepName::ReleaseLock, StepStatus::Succeeded, None, None);
        drop(lock);

        if result.is_ok() {
            execution.status = match execution.verification.as_ref() {
                Some(v) if v.confirmed => ExecutionStatus::PlayingConfirmed,
                _ => ExecutionStatus::PlayingUnverified,
            };
        }
        result
    }

    async fn run_locked_steps(
        &self,
        scene: &Scene,
        execution: &mut SceneExecution,
        opts: &ExecuteOptions,
        coordinator_udn: &str,
        topology: &DeviceTopology,
        cancel: &crate::cancellation::CancellationGuard,
    ) -> Result<()> {
        let coordinator_ip = member_ip(topology, coordinator_udn)
            .ok_or_else(|| EngineError::CoordinatorUnavailable)?;

        if cancel.is_canceled() {
            execution.status = ExecutionStatus::Canceled;
            return Err(EngineError::Internal("canceled before group_members".into()));
        }

        set_step(&mut execution.steps, StepName::GroupMembers, StepStatus::Running, None, None);
        let member_udns: Vec<String> = scene.members.iter().map(|m| m.udn.clone()).collect();
        match grouping::group_members(&self.actions, &coordinator_ip, coordinator_udn, &member_udns, opts.boot_seq).await {
            Ok(_) => set_step(&mut execution.steps, StepName::GroupMembers, StepStatus::Succeeded, None, None),
            Err(err) => {
                set_step(&mut execution.steps, StepName::GroupMembers, StepStatus::Failed, None, Some(err.to_string()));
                return Err(err);
            }
        }

        if cancel.is_canceled() {
            execution.status = ExecutionStatus::Canceled;
            return Err(EngineError::Internal("canceled before set_volume".into()));
        }

        set_step(&mut execution.steps, StepName::SetVolume, StepStatus::Running, None, None);
        let members_with_ip: Vec<_> = scene
            .members
            .iter()
            .filter_map(|m| member_ip(topology, &m.udn).map(|ip| (m.clone(), ip)))
            .collect();
        let volume_results = volume::set_volume(&self.actions, &members_with_ip, &scene.volume_ramp).await;
        let volume_failures = volume_results.iter().filter(|(_, ok, _)| !ok).count();
        // Per-member volume failures are recorded but never fail this step
        // (spec.md §4.5 step 4).
        set_step(
            &mut execution.steps,
            StepName::SetVolume,
            StepStatus::Succeeded,
            Some(format!("{} member updates, {volume_failures} failed", volume_results.len())),
            None,
        );

        if cancel.is_canceled() {
            execution.status = ExecutionStatus::Canceled;
            return Err(EngineError::Internal("canceled before load_content".into()));
        }

        set_step(&mut execution.steps, StepName::LoadContent, StepStatus::Running, None, None);
        let policy = opts
            .music_policy_override
            .clone()
            .ok_or_else(|| EngineError::SonosRejected("no music policy provided".into()))?;
        let resolved = match content::resolve_content(&self.store, &policy) {
            Ok(r) => r,
            Err(err) => {
                set_step(&mut execution.steps, StepName::LoadContent, StepStatus::Failed, None, Some(err.to_string()));
                return Err(err);
            }
        };

        match self
            .actions
            .set_av_transport_uri(&coordinator_ip, &resolved.uri, &resolved.metadata)
            .await
        {
            Ok(()) => {
                set_step(&mut execution.steps, StepName::LoadContent, StepStatus::Succeeded, Some(resolved.uri.clone()), None);
            }
            Err(err) => {
                let err = EngineError::from(err);
                set_step(&mut execution.steps, StepName::LoadContent, StepStatus::Failed, None, Some(err.to_string()));
                return Err(err);
            }
        }

        if cancel.is_canceled() {
            execution.status = ExecutionStatus::Canceled;
            return Err(EngineError::Internal("canceled before start_playback".into()));
        }

        set_step(&mut execution.steps, StepName::StartPlayback, StepStatus::Running, None, None);
        match playback::start_playback(&self.actions, &coordinator_ip).await {
            Ok(()) => set_step(&mut execution.steps, StepName::StartPlayback, StepStatus::Succeeded, None, None),
            Err(err) => {
                set_step(&mut execution.steps, StepName::StartPlayback, StepStatus::Failed, None, Some(err.to_string()));
                return Err(err);
            }
        }

        set_step(&mut execution.steps, StepName::VerifyPlayback, StepStatus::Running, None, None);
        let verification = verify::verify_playback(
            &self.actions,
            &*self.state,
            &coordinator_ip,
            &resolved.uri,
            Duration::from_millis(opts.verify_timeout_ms),
        )
        .await;
        let step_status = if verification.confirmed { StepStatus::Succeeded } else { StepStatus::Skipped };
        set_step(
            &mut execution.steps,
            StepName::VerifyPlayback,
            step_status,
            Some(format!("confirmed={}", verification.confirmed)),
            None,
        );
        execution.verification = Some(verification);

        Ok(())
    }

    /// `StopScene` — spec.md §4.5. Signals any in-flight executions of this
    /// scene to cancel at their next cooperative point, then directly
    /// pauses/stops every current member.
    pub async fn stop_scene(
        &self,
        scene_id: &str,
        in_flight_execution_ids: &[String],
        use_stop_action: bool,
    ) -> Result<StopOutcome> {
        self.cancellations.cancel_all(in_flight_execution_ids);

        let scene = self
            .store
            .get_scene(scene_id)
            .map_err(|_| EngineError::SceneNotFound(scene_id.to_string()))?;
        let topology = self.topology.snapshot();

        let mut results = Vec::new();
        for member in &scene.members {
            let Some(ip) = member_ip(&topology, &member.udn) else {
                results.push(MemberStopResult { udn: member.udn.clone(), ok: false });
                continue;
            };
            let outcome = if use_stop_action {
                self.actions.stop(&ip).await
            } else {
                self.actions.pause(&ip).await
            };
            results.push(MemberStopResult { udn: member.udn.clone(), ok: outcome.is_ok() });
        }

        let all_succeeded = results.iter().all(|r| r.ok);
        Ok(StopOutcome { results, all_succeeded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_state_cache::StateCache;
    use hub_store::types::{CoordinatorPreference, FallbackPolicy, SceneMember, Teardown, VolumeRamp};

    struct EmptyTopology;
    impl TopologySource for EmptyTopology {
        fn snapshot(&self) -> DeviceTopology {
            DeviceTopology::empty()
        }
    }

    fn test_engine() -> Engine {
        Engine::new(
            Arc::new(PlayerActions::new(Arc::new(hub_soap_client::SoapClient::new()))),
            Arc::new(Store::open_in_memory().unwrap()),
            Arc::new(StateCache::new(30)),
            Arc::new(EmptyTopology),
        )
    }

    fn sample_scene(id: &str) -> Scene {
        Scene {
            id: id.to_string(),
            name: "Movie Night".into(),
            description: None,
            members: vec![SceneMember {
                udn: "RINCON_1".into(),
                target_volume: Some(30),
                mute: None,
                room_name: None,
            }],
            coordinator_preference: CoordinatorPreference::ArcFirst,
            fallback_policy: FallbackPolicy::PlaybaseIfArcTvActive,
            volume_ramp: VolumeRamp::default(),
            teardown: Teardown::default(),
        }
    }

    #[tokio::test]
    async fn execute_fails_fast_for_unknown_scene() {
        let engine = test_engine();
        let result = engine.execute("missing", None, ExecuteOptions::default()).await;
        assert!(matches!(result, Err(EngineError::SceneNotFound(_))));
    }

    #[tokio::test]
    async fn execute_fails_coordinator_unavailable_with_no_topology() {
        let engine = test_engine();
        engine.store.upsert_scene(&sample_scene("s1")).unwrap();
        let result = engine.execute("s1", None, ExecuteOptions::default()).await.unwrap();
        assert_eq!(result.execution.status, ExecutionStatus::Failed);
        assert_eq!(result.execution.error.unwrap().code, "scene-coordinator-unavailable");
    }

    #[tokio::test]
    async fn second_call_with_same_idempotency_key_is_flagged() {
        let engine = test_engine();
        engine.store.upsert_scene(&sample_scene("s1")).unwrap();
        let key = Some("K-1".to_string());

        let first = engine.execute("s1", key.clone(), ExecuteOptions::default()).await.unwrap();
        assert!(!first.idempotent);

        let second = engine.execute("s1", key, ExecuteOptions::default()).await.unwrap();
        assert!(second.idempotent);
        assert_eq!(second.execution.id, first.execution.id);
    }
}
