//! Multicast discovery and per-device descriptor probing of players.
//!
//! This crate knows nothing about groups or stereo pairs — it produces a
//! flat `Vec<RawDevice>` per run; `hub-topology` does the merge into a
//! `DeviceTopology`.

mod device;
mod discovery;
mod error;
mod ssdp;

pub use device::{capabilities_for_model, extract_host_from_url, DeviceDescription, ModelCapabilities, RawDevice};
pub use discovery::{discover, DiscoveryConfig};
pub use error::{DiscoveryError, Result};
