//! Error types for typed player actions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("device unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Soap(#[from] hub_soap_client::SoapError),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("soap fault: error code {0}")]
    Fault(u16),
}

impl ApiError {
    /// UPnP errorCode 701 ("Transition not available") — the one spec.md
    /// names explicitly as worth a single retry in `start_playback`.
    pub fn is_transition_not_available(&self) -> bool {
        matches!(
            self,
            ApiError::Fault(701) | ApiError::Soap(hub_soap_client::SoapError::Fault(701))
        )
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
