//! `ResolveGroupToIP(groupID)` — spec.md §4.7's other external contract,
//! bridging a vendor cloud group id to the coordinator IP the scene engine
//! understands. Implemented by whatever owns topology (the `hub` binary);
//! declared here so the cloud webhook path doesn't need a dependency on
//! `hub-topology` directly.

pub trait GroupToIpResolver: Send + Sync {
    fn resolve_group_to_ip(&self, group_id: &str) -> Option<String>;
}
