//! The routine expander and job runner — spec.md §4.6: two cooperating,
//! independent background loops over the same `hub-store` job queue.

mod clock;
mod error;
mod expander;
mod runner;

pub use clock::{next_occurrence, occurrences_within};
pub use error::{Result, SchedulerError};
pub use expander::{expand_all, expand_routine, EXPANDER_TICK, EXPANSION_HORIZON};
pub use runner::{
    run as run_runner, tick as runner_tick, DEFAULT_LATE_TOLERANCE, DEFAULT_MAX_ATTEMPTS, DEFAULT_STALE_CLAIM_TIMEOUT,
    RUNNER_TICK,
};

use std::sync::Arc;

use hub_scene_engine::Engine;
use hub_store::Store;

/// Spawns both background loops. Returns their join handles so a caller
/// (the `hub` binary) can cancel them on shutdown.
pub fn spawn(store: Arc<Store>, engine: Arc<Engine>) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
    let expander_handle = tokio::spawn(expander::run(store.clone()));
    let runner_handle = tokio::spawn(runner::run(store, engine));
    (expander_handle, runner_handle)
}
