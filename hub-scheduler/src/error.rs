use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] hub_store::StoreError),
    #[error(transparent)]
    Engine(#[from] hub_scene_engine::EngineError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
