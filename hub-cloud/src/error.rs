use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error(transparent)]
    Store(#[from] hub_store::StoreError),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

pub type Result<T> = std::result::Result<T, CloudError>;
