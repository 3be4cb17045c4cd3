//! Step 2: `choose_coordinator` — spec.md §4.5.
//!
//! `coordinator_preference` only has the `ARC_FIRST` value in this model
//! (spec.md §9 closed-sum-type guidance); `fallback_policy` carries the
//! TV-active override spec.md describes as a variant of the same choice.

use hub_state_cache::StateProvider;
use hub_store::types::{FallbackPolicy, Scene};
use hub_topology::{DeviceTopology, Health, LogicalDevice, Role};

use crate::error::{EngineError, Result};

const TV_INPUT_SCHEMES: &[&str] = &["x-sonos-htastream", "x-rincon-stream"];

fn is_online(udn: &str, topology: &DeviceTopology) -> bool {
    topology
        .physical
        .iter()
        .find(|p| p.udn == udn)
        .map(|p| !matches!(p.health, Health::Offline))
        .unwrap_or(false)
}

fn member_device<'a>(topology: &'a DeviceTopology, udn: &str) -> Option<&'a LogicalDevice> {
    topology.logical.iter().find(|d| d.udn == udn)
}

fn first_coordinator_capable<'a>(
    topology: &'a DeviceTopology,
    member_udns: &[String],
    exclude: Option<&str>,
) -> Option<&'a LogicalDevice> {
    member_udns.iter().find_map(|udn| {
        if Some(udn.as_str()) == exclude {
            return None;
        }
        let device = member_device(topology, udn)?;
        let physical = topology.physical.iter().find(|p| p.udn == device.udn)?;
        if physical.coordinator_capable && is_online(&device.udn, topology) {
            Some(device)
        } else {
            None
        }
    })
}

fn home_theater_master<'a>(topology: &'a DeviceTopology, member_udns: &[String]) -> Option<&'a LogicalDevice> {
    member_udns.iter().find_map(|udn| {
        let device = member_device(topology, udn)?;
        if device.role == Role::HomeTheaterMaster && is_online(&device.udn, topology) {
            Some(device)
        } else {
            None
        }
    })
}

fn arc_active_on_tv(arc: &LogicalDevice, state: &dyn StateProvider) -> bool {
    state
        .get(&arc.ip)
        .and_then(|s| s.current_track_uri)
        .map(|uri| TV_INPUT_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)))
        .unwrap_or(false)
}

/// Chooses the coordinator UDN for this scene. Returns
/// `scene-coordinator-unavailable` if no member qualifies.
pub fn choose_coordinator(
    scene: &Scene,
    topology: &DeviceTopology,
    state: &dyn StateProvider,
) -> Result<String> {
    let member_udns: Vec<String> = scene.members.iter().map(|m| m.udn.clone()).collect();
    let arc = home_theater_master(topology, &member_udns);

    if scene.fallback_policy == FallbackPolicy::PlaybaseIfArcTvActive {
        if let Some(arc) = arc {
            if arc_active_on_tv(arc, state) {
                return first_coordinator_capable(topology, &member_udns, Some(&arc.udn))
                    .map(|d| d.udn.clone())
                    .ok_or(EngineError::CoordinatorUnavailable);
            }
        }
    }

    arc.or_else(|| first_coordinator_capable(topology, &member_udns, None))
        .map(|d| d.udn.clone())
        .ok_or(EngineError::CoordinatorUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hub_state_cache::{PlaybackStatePatch, Source, StateCache};
    use hub_store::types::{CoordinatorPreference, SceneMember, Teardown, VolumeRamp};
    use hub_topology::PhysicalDevice;

    fn physical(udn: &str, role: Role, coordinator_capable: bool) -> PhysicalDevice {
        PhysicalDevice {
            udn: udn.to_string(),
            ip: format!("10.0.0.{}", udn.len()),
            model_name: "Sonos Arc".into(),
            model_number: None,
            room_name: "Living Room".into(),
            role,
            coordinator_capable,
            airplay_supported: true,
            last_seen: Utc::now(),
            health: Health::Ok,
            missed_scans: 0,
        }
    }

    fn logical(udn: &str, role: Role, ip: &str) -> LogicalDevice {
        LogicalDevice {
            udn: udn.to_string(),
            room_name: "Living Room".into(),
            role,
            ip: ip.to_string(),
            is_targetable: true,
            physical_udns: vec![udn.to_string()],
            group_id: None,
        }
    }

    fn scene(members: Vec<&str>, fallback: FallbackPolicy) -> Scene {
        Scene {
            id: "s1".into(),
            name: "Movie Night".into(),
            description: None,
            members: members
                .into_iter()
                .map(|udn| SceneMember {
                    udn: udn.to_string(),
                    target_volume: None,
                    mute: None,
                    room_name: None,
                })
                .collect(),
            coordinator_preference: CoordinatorPreference::ArcFirst,
            fallback_policy: fallback,
            volume_ramp: VolumeRamp::default(),
            teardown: Teardown::default(),
        }
    }

    #[test]
    fn arc_first_prefers_home_theater_master() {
        let mut topology = DeviceTopology::empty();
        topology.physical.push(physical("ARC", Role::HomeTheaterMaster, true));
        topology.physical.push(physical("NORMAL", Role::Normal, true));
        topology.logical.push(logical("ARC", Role::HomeTheaterMaster, "10.0.0.3"));
        topology.logical.push(logical("NORMAL", Role::Normal, "10.0.0.6"));

        let scene = scene(vec!["ARC", "NORMAL"], FallbackPolicy::PlaybaseIfArcTvActive);
        let cache = StateCache::new(30);
        let chosen = choose_coordinator(&scene, &topology, &cache).unwrap();
        assert_eq!(chosen, "ARC");
    }

    #[test]
    fn playbase_fallback_skips_arc_when_tv_active() {
        let mut topology = DeviceTopology::empty();
        topology.physical.push(physical("ARC", Role::HomeTheaterMaster, true));
        topology.physical.push(physical("PLAYBASE", Role::Normal, true));
        topology.logical.push(logical("ARC", Role::HomeTheaterMaster, "10.0.0.3"));
        topology.logical.push(logical("PLAYBASE", Role::Normal, "10.0.0.8"));

        let scene = scene(vec!["ARC", "PLAYBASE"], FallbackPolicy::PlaybaseIfArcTvActive);
        let cache = StateCache::new(30);
        let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Event);
        patch.current_track_uri = Some("x-sonos-htastream:RINCON_ARC:spdif".into());
        cache.apply("ARC", "10.0.0.3", patch);

        let chosen = choose_coordinator(&scene, &topology, &cache).unwrap();
        assert_eq!(chosen, "PLAYBASE");
    }

    #[test]
    fn no_coordinator_capable_member_fails() {
        let mut topology = DeviceTopology::empty();
        topology.physical.push(physical("SUB", Role::Sub, false));
        topology.logical.push(logical("SUB", Role::Sub, "10.0.0.3"));
        let scene = scene(vec!["SUB"], FallbackPolicy::PlaybaseIfArcTvActive);
        let cache = StateCache::new(30);
        assert!(matches!(
            choose_coordinator(&scene, &topology, &cache),
            Err(EngineError::CoordinatorUnavailable)
        ));
    }
}
