//! Step 3: `group_members` — spec.md §4.5.
//!
//! The coordinator's own `ZoneGroupState` is the source of truth for
//! "current membership"; `AddMember`/`RemoveMember` are issued serially
//! since the vendor API has no bulk-group call.

use std::collections::HashSet;

use hub_api::PlayerActions;
use hub_topology::normalize_udn;

use crate::error::{EngineError, Result};

/// Per-member outcome, recorded on the execution's step details. A
/// `device-offline` failure on a non-coordinator member is recorded here
/// but does not fail the step (spec.md §4.5 step 3).
#[derive(Debug, Clone)]
pub struct MemberResult {
    pub udn: String,
    pub ok: bool,
    pub error: Option<String>,
}

pub struct GroupingOutcome {
    pub results: Vec<MemberResult>,
    pub coordinator_ok: bool,
}

fn current_member_udns(zone_group_xml: &str) -> HashSet<String> {
    hub_topology::zone_group::ZoneGroupState::from_xml(zone_group_xml)
        .map(|state| {
            state
                .zone_groups
                .groups
                .into_iter()
                .flat_map(|g| g.members)
                .map(|m| normalize_udn(&m.uuid))
                .collect()
        })
        .unwrap_or_default()
}

async fn apply_membership(
    actions: &PlayerActions,
    coordinator_ip: &str,
    coordinator_udn: &str,
    to_add: &HashSet<String>,
    to_remove: &HashSet<String>,
    boot_seq: u32,
) -> GroupingOutcome {
    let mut results = Vec::new();
    let mut coordinator_ok = true;

    for udn in to_add {
        let outcome = actions.add_member(coordinator_ip, udn, boot_seq).await;
        let is_coordinator = udn.as_str() == coordinator_udn;
        let ok = outcome.is_ok();
        if is_coordinator && !ok {
            coordinator_ok = false;
        }
        results.push(MemberResult {
            udn: udn.clone(),
            ok,
            error: outcome.err().map(|e| e.to_string()),
        });
    }

    for udn in to_remove {
        let outcome = actions.remove_member(coordinator_ip, udn).await;
        let is_coordinator = udn.as_str() == coordinator_udn;
        let ok = outcome.is_ok();
        if is_coordinator && !ok {
            coordinator_ok = false;
        }
        results.push(MemberResult {
            udn: udn.clone(),
            ok,
            error: outcome.err().map(|e| e.to_string()),
        });
    }

    GroupingOutcome { results, coordinator_ok }
}

/// Regroups the coordinator's zone to match `desired_member_udns`, then
/// re-reads zone-group state to confirm membership. A mismatch after the
/// single retry is `sonos-topology-changed`.
pub async fn group_members(
    actions: &PlayerActions,
    coordinator_ip: &str,
    coordinator_udn: &str,
    desired_member_udns: &[String],
    boot_seq: u32,
) -> Result<GroupingOutcome> {
    let desired: HashSet<String> = desired_member_udns.iter().map(|u| normalize_udn(u)).collect();

    for attempt in 0..2 {
        let current_xml = actions
            .get_zone_group_state(coordinator_ip)
            .await
            .map_err(EngineError::from)?;
        let current = current_member_udns(&current_xml);

        let to_add: HashSet<String> = desired.difference(&current).cloned().collect();
        let to_remove: HashSet<String> = current.difference(&desired).cloned().collect();

        if to_add.is_empty() && to_remove.is_empty() {
            return Ok(GroupingOutcome {
                results: Vec::new(),
                coordinator_ok: true,
            });
        }

        let outcome = apply_membership(actions, coordinator_ip, coordinator_udn, &to_add, &to_remove, boot_seq).await;
        if !outcome.coordinator_ok {
            return Err(EngineError::Internal("coordinator failed to join its own group".into()));
        }

        let confirm_xml = actions
            .get_zone_group_state(coordinator_ip)
            .await
            .map_err(EngineError::from)?;
        let confirmed = current_member_udns(&confirm_xml);
        if confirmed == desired {
            return Ok(outcome);
        }
        if attempt == 1 {
            return Err(EngineError::TopologyChanged);
        }
    }

    Err(EngineError::TopologyChanged)
}
