//! Orchestrates SSDP passes + unicast HTTP probing into `RawDevice`s.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;

use crate::device::{extract_host_from_url, DeviceDescription, RawDevice};
use crate::error::Result;
use crate::ssdp::{is_likely_sonos, SsdpClient};

/// Tunables for a discovery run, mapping to spec.md §6's
/// `SSDP_DISCOVERY_*` / `STATIC_DEVICE_IPS` environment variables.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub passes: u32,
    pub pass_interval: Duration,
    pub probe_timeout: Duration,
    pub dial_timeout: Duration,
    pub static_hosts: Vec<String>,
    pub remembered_hosts: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            passes: 3,
            pass_interval: Duration::from_millis(2000),
            probe_timeout: Duration::from_secs(5),
            dial_timeout: Duration::from_secs(3),
            static_hosts: Vec::new(),
            remembered_hosts: Vec::new(),
        }
    }
}

/// Run one full discovery pass set and return every reachable device.
///
/// Per-host probe failures are swallowed (logged at debug) so a handful
/// of unreachable hosts never fail the whole run; only a multicast
/// socket-open failure surfaces as `DiscoveryError`.
pub async fn discover(config: &DiscoveryConfig) -> Result<Vec<RawDevice>> {
    let client = SsdpClient::new().await?;

    let mut locations: HashSet<String> = HashSet::new();
    for pass in 0..config.passes.max(1) {
        let responses = client.search_once(Duration::from_millis(500)).await?;
        for resp in responses.into_iter().filter(is_likely_sonos) {
            locations.insert(resp.location);
        }
        if pass + 1 < config.passes {
            tokio::time::sleep(config.pass_interval).await;
        }
    }

    let multicast_hosts: HashSet<String> = locations
        .iter()
        .filter_map(|loc| extract_host_from_url(loc).map(str::to_string))
        .collect();

    let mut all_hosts: HashSet<String> = multicast_hosts;
    all_hosts.extend(config.static_hosts.iter().cloned());
    all_hosts.extend(config.remembered_hosts.iter().cloned());

    let http = reqwest::Client::builder()
        .connect_timeout(config.dial_timeout)
        .timeout(config.probe_timeout)
        .build()
        .map_err(|e| crate::error::DiscoveryError::SocketError(e.to_string()))?;

    let mut devices = Vec::new();
    let mut seen_udn = HashSet::new();
    for host in all_hosts {
        match probe_host(&http, &host).await {
            Some(device) => {
                if seen_udn.insert(device.udn.clone()) {
                    devices.push(device);
                }
            }
            None => tracing::debug!(host = %host, "probe failed, skipping"),
        }
    }

    Ok(devices)
}

async fn probe_host(http: &reqwest::Client, host: &str) -> Option<RawDevice> {
    let desc_url = format!("http://{host}:1400/xml/device_description.xml");
    let xml = http.get(&desc_url).send().await.ok()?.text().await.ok()?;
    let desc = DeviceDescription::from_xml(&xml)?;
    if !desc.is_zone_player() {
        return None;
    }

    let zone_group_xml = fetch_zone_group_xml(http, host).await;
    let airplay_hint = probe_airplay_hint(http, host).await;

    Some(RawDevice {
        udn: desc.udn.clone(),
        ip: host.to_string(),
        model_name: desc.model_name.clone(),
        model_number: desc.model_number.clone(),
        serial_number: desc.serial_num.clone(),
        software_version: desc.software_version.clone(),
        hardware_version: desc.hardware_version.clone(),
        room_name: desc.room_name(),
        airplay_hint,
        zone_group_xml,
        discovered_at: Utc::now(),
    })
}

async fn fetch_zone_group_xml(http: &reqwest::Client, host: &str) -> Option<String> {
    let url = format!("http://{host}:1400/status/zp");
    http.get(&url).send().await.ok()?.text().await.ok()
}

/// `/status/zp` also carries an `Airplay` hint on some firmware revisions;
/// failure to reach it just means no hint, not a probe failure.
async fn probe_airplay_hint(http: &reqwest::Client, host: &str) -> bool {
    let url = format!("http://{host}:1400/status/zp");
    match http.get(&url).send().await {
        Ok(resp) => match resp.text().await {
            Ok(text) => text.to_lowercase().contains("airplay"),
            Err(_) => false,
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = DiscoveryConfig::default();
        assert_eq!(cfg.passes, 3);
        assert_eq!(cfg.pass_interval, Duration::from_millis(2000));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(5));
        assert_eq!(cfg.dial_timeout, Duration::from_secs(3));
    }
}
