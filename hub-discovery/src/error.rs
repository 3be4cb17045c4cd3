//! Error types for discovery.

use thiserror::Error;

/// Errors that can escape discovery. Per spec.md §4.1, per-host probe
/// failures never reach here — they're swallowed and logged so partial
/// discovery still succeeds; only multicast-socket or cancellation
/// failures are reported.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("could not open multicast socket: {0}")]
    SocketError(String),

    #[error("discovery was canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
