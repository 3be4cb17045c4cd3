//! Topology data model — spec.md §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Normal,
    HomeTheaterMaster,
    Surround,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Ok,
    Degraded,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalDevice {
    pub udn: String,
    pub ip: String,
    pub model_name: String,
    pub model_number: Option<String>,
    pub room_name: String,
    pub role: Role,
    pub coordinator_capable: bool,
    pub airplay_supported: bool,
    pub last_seen: DateTime<Utc>,
    pub health: Health,
    pub missed_scans: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalDevice {
    pub udn: String,
    pub room_name: String,
    pub role: Role,
    pub ip: String,
    pub is_targetable: bool,
    pub physical_udns: Vec<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StereoPair {
    pub pair_id: String,
    pub left_udn: String,
    pub right_udn: String,
    pub coordinator_udn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeTheaterGroup {
    pub group_id: String,
    pub master_udn: String,
    pub surround_udns: Vec<String>,
    pub sub_udns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTopology {
    pub physical: Vec<PhysicalDevice>,
    pub logical: Vec<LogicalDevice>,
    pub home_theater_groups: Vec<HomeTheaterGroup>,
    pub stereo_pairs: Vec<StereoPair>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceTopology {
    pub fn empty() -> Self {
        Self {
            physical: Vec::new(),
            logical: Vec::new(),
            home_theater_groups: Vec::new(),
            stereo_pairs: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// `GetTargetableDevices` — spec.md §4.2.
    pub fn targetable_devices(&self) -> Vec<&LogicalDevice> {
        self.logical.iter().filter(|d| d.is_targetable).collect()
    }
}

/// Strips stereo/home-theater room-name suffixes, per spec.md §3.
pub fn clean_room_name(room: &str) -> String {
    const SUFFIXES: &[&str] = &["(L)", "(R)", "(LF,RF)", "(LR)", "(RR)", "(SW)"];
    let mut cleaned = room.trim();
    for suffix in SUFFIXES {
        if let Some(stripped) = cleaned.strip_suffix(suffix) {
            cleaned = stripped.trim();
            break;
        }
    }
    cleaned.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        assert_eq!(clean_room_name("Living Room (L)"), "Living Room");
        assert_eq!(clean_room_name("Living Room (LF,RF)"), "Living Room");
        assert_eq!(clean_room_name("Kitchen"), "Kitchen");
    }
}
