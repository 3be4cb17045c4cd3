//! Error types for the SOAP client.

use thiserror::Error;

/// Errors that can occur during SOAP communication with a player.
#[derive(Debug, Error)]
pub enum SoapError {
    /// The device did not respond, or the transport itself failed.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The call timed out before the configured per-call deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// XML parsing error on the response body.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A SOAP fault was returned by the device, carrying a UPnP error code.
    #[error("soap fault: error code {0}")]
    Fault(u16),
}

pub type Result<T> = std::result::Result<T, SoapError>;
