//! Error codes — spec.md §7's scene-engine rows of the error table.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("scene not found: {0}")]
    SceneNotFound(String),

    #[error("coordinator lock held")]
    SceneLockHeld,

    #[error("no suitable coordinator available")]
    CoordinatorUnavailable,

    #[error("zone-group membership did not match after regrouping")]
    TopologyChanged,

    #[error("player rejected the requested content")]
    SonosRejected(String),

    #[error("player unreachable: {0}")]
    SonosUnreachable(String),

    #[error("player did not confirm playback in time")]
    VerificationFailed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable `code` string recorded on the execution row, matching
    /// spec.md §7's code column.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SceneNotFound(_) => "scene-not-found",
            EngineError::SceneLockHeld => "scene-lock-held",
            EngineError::CoordinatorUnavailable => "scene-coordinator-unavailable",
            EngineError::TopologyChanged => "sonos-topology-changed",
            EngineError::SonosRejected(_) => "sonos-rejected",
            EngineError::SonosUnreachable(_) => "sonos-unreachable",
            EngineError::VerificationFailed => "sonos-verification-failed",
            EngineError::Internal(_) => "internal-error",
        }
    }
}

impl From<hub_api::ApiError> for EngineError {
    fn from(err: hub_api::ApiError) -> Self {
        match err {
            hub_api::ApiError::Unreachable(msg) => EngineError::SonosUnreachable(msg),
            hub_api::ApiError::Fault(code) => EngineError::SonosRejected(format!("fault {code}")),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<hub_store::StoreError> for EngineError {
    fn from(err: hub_store::StoreError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
