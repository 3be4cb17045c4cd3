//! Concrete implementations of the narrow trait boundaries the library
//! crates declare so they don't need to depend on each other directly —
//! `TopologySource`, `SidResolver`, and the two `GroupToIpResolver`s all
//! resolve against the one shared topology snapshot this binary owns.

use std::sync::{Arc, RwLock};

use hub_topology::DeviceTopology;

/// Shared, periodically-refreshed topology snapshot, matching
/// `hub-state-cache`'s own `Arc<RwLock<...>>` shape rather than
/// introducing a second concurrency primitive for the same job.
pub struct TopologyHandle {
    inner: RwLock<DeviceTopology>,
}

impl TopologyHandle {
    pub fn new(initial: DeviceTopology) -> Arc<Self> {
        Arc::new(Self { inner: RwLock::new(initial) })
    }

    pub fn set(&self, topology: DeviceTopology) {
        *self.inner.write().unwrap() = topology;
    }

    pub fn get(&self) -> DeviceTopology {
        self.inner.read().unwrap().clone()
    }
}

fn find_by_ip(topology: &DeviceTopology, ip: &str) -> Option<(String, String)> {
    topology.physical.iter().find(|d| d.ip == ip).map(|d| (d.udn.clone(), d.ip.clone()))
}

fn find_by_group(topology: &DeviceTopology, group_id: &str) -> Option<(String, String)> {
    let logical = topology.logical.iter().find(|d| d.group_id.as_deref() == Some(group_id))?;
    Some((logical.udn.clone(), logical.ip.clone()))
}

/// Bridges `TopologyHandle` to the scene engine's synchronous contract.
pub struct SyncTopologySource {
    handle: Arc<TopologyHandle>,
}

impl SyncTopologySource {
    pub fn new(handle: Arc<TopologyHandle>) -> Self {
        Self { handle }
    }
}

impl hub_scene_engine::TopologySource for SyncTopologySource {
    fn snapshot(&self) -> DeviceTopology {
        self.handle.get()
    }
}

/// `SidResolver` — maps a notified SID to the (UDN, IP) it was
/// subscribed against, via the registry's own bookkeeping.
pub struct SubscriptionSidResolver {
    topology: Arc<TopologyHandle>,
    registry: Arc<hub_event_ingress::SubscriptionRegistry>,
}

impl SubscriptionSidResolver {
    pub fn new(topology: Arc<TopologyHandle>, registry: Arc<hub_event_ingress::SubscriptionRegistry>) -> Self {
        Self { topology, registry }
    }
}

impl hub_event_ingress::SidResolver for SubscriptionSidResolver {
    fn resolve(&self, sid: &str) -> Option<(String, String)> {
        let ip = self.registry.ip_for_sid(sid)?;
        let snapshot = self.topology.get();
        find_by_ip(&snapshot, &ip)
    }
}

/// Cloud webhook group-id resolver for `hub-event-ingress`.
pub struct IngressGroupResolver {
    topology: Arc<TopologyHandle>,
}

impl IngressGroupResolver {
    pub fn new(topology: Arc<TopologyHandle>) -> Self {
        Self { topology }
    }
}

impl hub_event_ingress::GroupToIpResolver for IngressGroupResolver {
    fn resolve(&self, group_id: &str) -> Option<(String, String)> {
        find_by_group(&self.topology.get(), group_id)
    }
}

/// Cloud webhook group-id resolver for `hub-cloud`'s narrower
/// `(groupId) -> ip` contract.
pub struct CloudGroupResolver {
    topology: Arc<TopologyHandle>,
}

impl CloudGroupResolver {
    pub fn new(topology: Arc<TopologyHandle>) -> Self {
        Self { topology }
    }
}

impl hub_cloud::GroupToIpResolver for CloudGroupResolver {
    fn resolve_group_to_ip(&self, group_id: &str) -> Option<String> {
        find_by_group(&self.topology.get(), group_id).map(|(_, ip)| ip)
    }
}
