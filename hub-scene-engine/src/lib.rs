//! The 8-step scene execution pipeline — spec.md §4.5.

mod cancellation;
mod content;
mod coordinator;
mod engine;
mod error;
mod grouping;
mod lock;
mod playback;
mod topology_source;
mod verify;
mod volume;

pub use engine::{Engine, ExecuteOptions, ExecuteOutcome, MemberStopResult, StopOutcome};
pub use error::{EngineError, Result};
pub use lock::CoordinatorLockMap;
pub use topology_source::TopologySource;
