use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("no available port in range {0}-{1}")]
    NoAvailablePort(u16, u16),

    #[error("could not detect local IP address")]
    LocalIpUnavailable,

    #[error("subscription error: {0}")]
    Subscription(#[from] hub_api::ApiError),
}

pub type Result<T> = std::result::Result<T, IngressError>;
