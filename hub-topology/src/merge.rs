//! The pure `merge(prev, raw) -> DeviceTopology` function — spec.md §4.2.

use std::collections::HashMap;

use chrono::Utc;
use hub_discovery::RawDevice;

use crate::ids::{deterministic_id, normalize_udn};
use crate::types::{
    clean_room_name, DeviceTopology, Health, HomeTheaterGroup, LogicalDevice, PhysicalDevice,
    Role, StereoPair,
};
use crate::zone_group::{parse_channel_map, ZoneGroupState};

const DEGRADED_THRESHOLD: u32 = 1;
const OFFLINE_THRESHOLD: u32 = 3;
const REMOVED_THRESHOLD: u32 = 1440;

/// Merge a fresh discovery scan with the previous topology, applying the
/// health state machine and re-deriving logical devices, stereo pairs,
/// and home theater groups from scratch each time.
pub fn merge(prev: &DeviceTopology, raw: &[RawDevice]) -> DeviceTopology {
    let now = Utc::now();

    let scanned: HashMap<String, &RawDevice> = raw
        .iter()
        .map(|d| (normalize_udn(&d.udn), d))
        .collect();

    let mut physical: Vec<PhysicalDevice> = Vec::new();

    for (udn, device) in &scanned {
        let caps = device.capabilities();
        physical.push(PhysicalDevice {
            udn: udn.clone(),
            ip: device.ip.clone(),
            model_name: device.model_name.clone(),
            model_number: device.model_number.clone(),
            room_name: device.room_name.clone(),
            role: Role::Normal,
            coordinator_capable: caps.coordinator_capable,
            airplay_supported: caps.airplay_supported,
            last_seen: now,
            health: Health::Ok,
            missed_scans: 0,
        });
    }

    for prev_device in &prev.physical {
        if scanned.contains_key(&prev_device.udn) {
            continue;
        }
        let missed_scans = prev_device.missed_scans + 1;
        let health = if missed_scans >= OFFLINE_THRESHOLD {
            Health::Offline
        } else if missed_scans >= DEGRADED_THRESHOLD {
            Health::Degraded
        } else {
            Health::Ok
        };
        if missed_scans >= REMOVED_THRESHOLD {
            continue; // removed: dropped from the topology entirely
        }
        physical.push(PhysicalDevice {
            missed_scans,
            health,
            ..prev_device.clone()
        });
    }

    let (stereo_pairs, ht_groups, role_overrides) = derive_groups(&scanned, &physical);

    for dev in &mut physical {
        if let Some(role) = role_overrides.get(&dev.udn) {
            dev.role = *role;
        }
    }

    let logical = derive_logical_devices(&physical, &stereo_pairs, &ht_groups);

    DeviceTopology {
        physical,
        logical,
        home_theater_groups: ht_groups,
        stereo_pairs,
        updated_at: now,
    }
}

type RoleOverrides = HashMap<String, Role>;

fn derive_groups(
    scanned: &HashMap<String, &RawDevice>,
    physical: &[PhysicalDevice],
) -> (Vec<StereoPair>, Vec<HomeTheaterGroup>, RoleOverrides) {
    let mut stereo_pairs = Vec::new();
    let mut ht_groups = Vec::new();
    let mut roles: RoleOverrides = HashMap::new();

    // Zone-group based detection: each device's own zone_group_xml carries
    // the ZoneGroupState for the whole household, so any one device's XML
    // is representative; parse the first one available.
    let zone_state = scanned
        .values()
        .find_map(|d| d.zone_group_xml.as_deref().and_then(ZoneGroupState::from_xml));

    let mut paired_udns: std::collections::HashSet<String> = std::collections::HashSet::new();

    if let Some(state) = &zone_state {
        for group in &state.zone_groups.groups {
            for member in &group.members {
                let member_udn = normalize_udn(&member.uuid);

                if !member.satellites.is_empty() {
                    let mut surrounds = Vec::new();
                    let mut subs = Vec::new();
                    for sat in &member.satellites {
                        let sat_udn = normalize_udn(&sat.uuid);
                        let is_sub = physical
                            .iter()
                            .find(|p| p.udn == sat_udn)
                            .map(|p| p.model_name.to_lowercase().contains("sub"))
                            .unwrap_or(false);
                        if is_sub {
                            subs.push(sat_udn.clone());
                            roles.insert(sat_udn, Role::Sub);
                        } else {
                            surrounds.push(sat_udn.clone());
                            roles.insert(sat_udn, Role::Surround);
                        }
                    }
                    roles.insert(member_udn.clone(), Role::HomeTheaterMaster);
                    ht_groups.push(HomeTheaterGroup {
                        group_id: deterministic_id("group", &member_udn),
                        master_udn: member_udn.clone(),
                        surround_udns: surrounds,
                        sub_udns: subs,
                    });
                }

                if let Some(map_raw) = &member.ht_sat_chan_map_set {
                    if let Some(pair) = stereo_pair_from_channel_map(map_raw, group.coordinator.as_str()) {
                        if paired_udns.insert(pair.left_udn.clone()) && paired_udns.insert(pair.right_udn.clone()) {
                            stereo_pairs.push(pair);
                        }
                    }
                }
            }
        }
    }

    // Fallback: pair remaining devices by room-name suffix `(L)`/`(R)`.
    let mut by_base_room: HashMap<String, Vec<&PhysicalDevice>> = HashMap::new();
    for dev in physical {
        if paired_udns.contains(&dev.udn) {
            continue;
        }
        if dev.room_name.ends_with("(L)") || dev.room_name.ends_with("(R)") {
            let base = clean_room_name(&dev.room_name);
            by_base_room.entry(base).or_default().push(dev);
        }
    }
    for (_, members) in by_base_room {
        let left = members.iter().find(|d| d.room_name.ends_with("(L)"));
        let right = members.iter().find(|d| d.room_name.ends_with("(R)"));
        if let (Some(left), Some(right)) = (left, right) {
            stereo_pairs.push(StereoPair {
                pair_id: deterministic_id("pair", &left.udn),
                left_udn: left.udn.clone(),
                right_udn: right.udn.clone(),
                coordinator_udn: left.udn.clone(),
            });
            paired_udns.insert(left.udn.clone());
            paired_udns.insert(right.udn.clone());
        }
    }

    (stereo_pairs, ht_groups, roles)
}

/// Normalizes a `ChannelMapSet` UDN entry, logging whenever the `uuid:`
/// prefix fallback (rather than an already-bare UDN) is what made the
/// entry match — spec.md §9's instruction to log when that fallback
/// fires, since most devices report bare UDNs in this field and a
/// prefixed one is the less common shape.
fn normalize_channel_map_udn(udn: &str) -> String {
    if udn.starts_with("uuid:") {
        tracing::debug!(raw_udn = udn, "stereo pair lookup resolved via uuid: prefix fallback");
    }
    normalize_udn(udn)
}

/// A two-member group with no `ChannelMapSet` pattern is NOT a stereo
/// pair — this only fires when the map names exactly the coordinator and
/// one other member with `LF,LF`/`RF,RF` channel labels.
fn stereo_pair_from_channel_map(raw: &str, zone_coordinator: &str) -> Option<StereoPair> {
    let entries = parse_channel_map(raw);
    let mut left = None;
    let mut right = None;
    for (udn, channels) in &entries {
        let normalized = normalize_channel_map_udn(udn);
        if channels == "LF,LF" {
            left = Some(normalized);
        } else if channels == "RF,RF" {
            right = Some(normalized);
        }
    }
    let (left, right) = (left?, right?);
    let zone_coordinator = normalize_channel_map_udn(zone_coordinator);
    let coordinator = if zone_coordinator == left || zone_coordinator == right {
        zone_coordinator
    } else {
        left.clone()
    };
    Some(StereoPair {
        pair_id: deterministic_id("pair", &left),
        left_udn: left,
        right_udn: right,
        coordinator_udn: coordinator,
    })
}

fn derive_logical_devices(
    physical: &[PhysicalDevice],
    stereo_pairs: &[StereoPair],
    ht_groups: &[HomeTheaterGroup],
) -> Vec<LogicalDevice> {
    let mut member_of_composite: HashMap<String, String> = HashMap::new();
    for pair in stereo_pairs {
        member_of_composite.insert(pair.left_udn.clone(), pair.coordinator_udn.clone());
        member_of_composite.insert(pair.right_udn.clone(), pair.coordinator_udn.clone());
    }
    for group in ht_groups {
        for udn in group.surround_udns.iter().chain(group.sub_udns.iter()) {
            member_of_composite.insert(udn.clone(), group.master_udn.clone());
        }
    }

    let mut logical = Vec::new();

    for dev in physical {
        // Satellites/subs and the non-primary half of a stereo pair are
        // represented only through their owning logical device.
        if let Some(primary_udn) = member_of_composite.get(&dev.udn) {
            if primary_udn != &dev.udn {
                continue;
            }
        }

        let pair = stereo_pairs.iter().find(|p| p.coordinator_udn == dev.udn);
        let ht = ht_groups.iter().find(|g| g.master_udn == dev.udn);

        let physical_udns = if let Some(pair) = pair {
            vec![pair.left_udn.clone(), pair.right_udn.clone()]
        } else if let Some(ht) = ht {
            let mut v = vec![ht.master_udn.clone()];
            v.extend(ht.surround_udns.iter().cloned());
            v.extend(ht.sub_udns.iter().cloned());
            v
        } else {
            vec![dev.udn.clone()]
        };

        let is_targetable = match dev.role {
            Role::Sub | Role::Surround => false,
            Role::HomeTheaterMaster => true,
            Role::Normal => pair.is_some() || dev.coordinator_capable,
        };

        let room_name = clean_room_name(&dev.room_name);
        let group_id = pair
            .map(|p| p.pair_id.clone())
            .or_else(|| ht.map(|h| h.group_id.clone()));

        logical.push(LogicalDevice {
            udn: dev.udn.clone(),
            room_name,
            role: dev.role,
            ip: dev.ip.clone(),
            is_targetable,
            physical_udns,
            group_id,
        });
    }

    logical
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;

    fn device(udn: &str, model: &str, room: &str, xml: Option<&str>) -> RawDevice {
        RawDevice {
            udn: udn.to_string(),
            ip: "10.0.0.1".to_string(),
            model_name: model.to_string(),
            model_number: None,
            serial_number: None,
            software_version: None,
            hardware_version: None,
            room_name: room.to_string(),
            airplay_hint: false,
            zone_group_xml: xml.map(str::to_string),
            discovered_at: ChronoUtc::now(),
        }
    }

    #[test]
    fn standalone_normal_device_is_targetable() {
        let raw = vec![device("RINCON_1", "Sonos One", "Kitchen", None)];
        let topo = merge(&DeviceTopology::empty(), &raw);
        assert_eq!(topo.logical.len(), 1);
        assert!(topo.logical[0].is_targetable);
    }

    #[test]
    fn missing_device_degrades_then_offline() {
        let raw = vec![device("RINCON_1", "Sonos One", "Kitchen", None)];
        let topo1 = merge(&DeviceTopology::empty(), &raw);
        let topo2 = merge(&topo1, &[]);
        assert_eq!(topo2.physical[0].missed_scans, 1);
        assert!(matches!(topo2.physical[0].health, Health::Degraded));
        let topo3 = merge(&topo2, &[]);
        let topo4 = merge(&topo3, &[]);
        assert!(matches!(topo4.physical[0].health, Health::Offline));
    }

    #[test]
    fn stereo_pair_detected_from_channel_map() {
        let xml = r#"<ZoneGroupState><ZoneGroups><ZoneGroup Coordinator="RINCON_1" ID="RINCON_1:0"><ZoneGroupMember UUID="RINCON_1" ZoneName="Living Room (L)" HTSatChanMapSet="RINCON_1:LF,LF;RINCON_2:RF,RF"/><ZoneGroupMember UUID="RINCON_2" ZoneName="Living Room (R)"/></ZoneGroup></ZoneGroups></ZoneGroupState>"#;
        let raw = vec![
            device("RINCON_1", "Sonos One", "Living Room (L)", Some(xml)),
            device("RINCON_2", "Sonos One", "Living Room (R)", Some(xml)),
        ];
        let topo = merge(&DeviceTopology::empty(), &raw);
        assert_eq!(topo.stereo_pairs.len(), 1);
        assert_eq!(topo.logical.len(), 1);
        assert_eq!(topo.logical[0].room_name, "Living Room");
    }

    #[test]
    fn two_member_zone_without_channel_map_is_not_a_pair() {
        let xml = r#"<ZoneGroupState><ZoneGroups><ZoneGroup Coordinator="RINCON_1" ID="RINCON_1:0"><ZoneGroupMember UUID="RINCON_1" ZoneName="Living Room"/><ZoneGroupMember UUID="RINCON_2" ZoneName="Kitchen"/></ZoneGroup></ZoneGroups></ZoneGroupState>"#;
        let raw = vec![
            device("RINCON_1", "Sonos One", "Living Room", Some(xml)),
            device("RINCON_2", "Sonos One", "Kitchen", Some(xml)),
        ];
        let topo = merge(&DeviceTopology::empty(), &raw);
        assert!(topo.stereo_pairs.is_empty());
        assert_eq!(topo.logical.len(), 2);
    }

    #[test]
    fn targetable_devices_excludes_subs_and_surrounds() {
        let xml = r#"<ZoneGroupState><ZoneGroups><ZoneGroup Coordinator="RINCON_1" ID="RINCON_1:0"><ZoneGroupMember UUID="RINCON_1" ZoneName="Theater"><Satellite UUID="RINCON_2" ZoneName="Theater"/><Satellite UUID="RINCON_3" ZoneName="Theater"/></ZoneGroupMember></ZoneGroup></ZoneGroups></ZoneGroupState>"#;
        let raw = vec![
            device("RINCON_1", "Sonos Arc", "Theater", Some(xml)),
            device("RINCON_2", "Sonos Sub", "Theater", Some(xml)),
            device("RINCON_3", "Sonos One Surround", "Theater", Some(xml)),
        ];
        let topo = merge(&DeviceTopology::empty(), &raw);
        let targetable = topo.targetable_devices();
        assert_eq!(targetable.len(), 1);
        assert_eq!(targetable[0].udn, "RINCON_1");
        assert_eq!(targetable[0].physical_udns.len(), 3);
    }
}
