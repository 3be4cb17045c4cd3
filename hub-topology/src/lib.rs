//! Pure merge of discovered devices and zone-group state into a topology.
//!
//! `merge` is a free function, not a service — callers own the
//! previous/next `DeviceTopology` and decide when to re-run it (typically
//! after every discovery rescan).

mod ids;
mod merge;
mod types;
pub mod zone_group;

pub use ids::{deterministic_id, normalize_udn};
pub use merge::merge;
pub use types::{
    clean_room_name, DeviceTopology, Health, HomeTheaterGroup, LogicalDevice, PhysicalDevice,
    Role, StereoPair,
};
