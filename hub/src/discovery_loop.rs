//! Discovery → topology refresh loop, spec.md §5's "discovery" background
//! task: rescans on an interval, re-deriving the whole topology from
//! scratch via the pure `merge` function each pass.
//!
//! Each pass's unicast probe set is widened with hosts seen within the
//! last 7 days (spec.md §4.1), persisted through `hub_store::Store` so a
//! host that drops off multicast but hasn't actually left the network is
//! still dialed directly on the next rescan.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use hub_discovery::DiscoveryConfig;
use hub_store::Store;
use hub_topology::DeviceTopology;

use crate::adapters::TopologyHandle;

const REMEMBERED_HOST_WINDOW_DAYS: i64 = 7;

async fn config_with_remembered_hosts(base: &DiscoveryConfig, store: &Store) -> DiscoveryConfig {
    let mut config = base.clone();
    match store.recent_hosts(Utc::now() - ChronoDuration::days(REMEMBERED_HOST_WINDOW_DAYS)) {
        Ok(hosts) => config.remembered_hosts = hosts,
        Err(err) => tracing::warn!(%err, "failed to load remembered hosts, probing without them"),
    }
    config
}

async fn run_one_pass(store: &Store, config: &DiscoveryConfig) -> hub_discovery::Result<Vec<hub_discovery::RawDevice>> {
    let raw = hub_discovery::discover(config).await?;
    let hosts: Vec<String> = raw.iter().map(|d| d.ip.clone()).collect();
    if let Err(err) = store.record_seen_hosts(&hosts, Utc::now()) {
        tracing::warn!(%err, "failed to persist seen hosts");
    }
    Ok(raw)
}

pub async fn run(topology: Arc<TopologyHandle>, store: Arc<Store>, base_config: DiscoveryConfig, rescan_interval: std::time::Duration) {
    let mut interval = tokio::time::interval(rescan_interval);
    loop {
        interval.tick().await;
        let config = config_with_remembered_hosts(&base_config, &store).await;
        match run_one_pass(&store, &config).await {
            Ok(raw) => {
                let prev = topology.get();
                let next = hub_topology::merge(&prev, &raw);
                tracing::info!(devices = next.physical.len(), "topology refreshed");
                topology.set(next);
            }
            Err(err) => {
                tracing::warn!(%err, "discovery pass failed, keeping previous topology");
            }
        }
    }
}

/// Runs one pass synchronously before the background loop starts, so the
/// hub doesn't come up with an empty topology if it can avoid it.
pub async fn initial_scan(store: &Store, base_config: &DiscoveryConfig) -> DeviceTopology {
    let config = config_with_remembered_hosts(base_config, store).await;
    match run_one_pass(store, &config).await {
        Ok(raw) => hub_topology::merge(&DeviceTopology::empty(), &raw),
        Err(err) => {
            tracing::warn!(%err, "initial discovery pass failed, starting with an empty topology");
            DeviceTopology::empty()
        }
    }
}
