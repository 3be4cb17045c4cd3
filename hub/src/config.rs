//! Plain environment-variable configuration, spec.md §6. Reads raw env vars
//! with typed defaults rather than a config-parsing crate, matching the
//! rest of this codebase.

use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_sqlite_path() -> String {
    "./hub.sqlite3".to_string()
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub sqlite_db_path: String,
    pub ssdp_discovery_timeout_ms: u64,
    pub ssdp_discovery_passes: u32,
    pub ssdp_pass_interval_ms: u64,
    pub ssdp_rescan_interval_ms: u64,
    pub static_device_ips: Vec<String>,
    pub sonos_timeout_ms: u64,
    pub zone_cache_ttl_seconds: i64,
    pub upnp_events_enabled: bool,
    pub upnp_subscription_timeout: u32,
    pub upnp_state_cache_ttl_seconds: i64,
    pub allow_test_mode: bool,
}

impl Config {
    /// Loads configuration from the process environment. `JWT_SECRET` and
    /// the JWT expiry knobs from spec.md §6 aren't read here: pairing/refresh
    /// is out of scope (spec.md §1's own OUT OF SCOPE list) and this binary
    /// never issues a token that would need signing.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", &default_host()),
            port: env_parsed("PORT", default_port()),
            sqlite_db_path: env_or("SQLITE_DB_PATH", &default_sqlite_path()),
            ssdp_discovery_timeout_ms: env_parsed("SSDP_DISCOVERY_TIMEOUT_MS", 5000),
            ssdp_discovery_passes: env_parsed("SSDP_DISCOVERY_PASSES", 3),
            ssdp_pass_interval_ms: env_parsed("SSDP_PASS_INTERVAL_MS", 2000),
            ssdp_rescan_interval_ms: env_parsed("SSDP_RESCAN_INTERVAL_MS", 60_000),
            static_device_ips: std::env::var("STATIC_DEVICE_IPS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            sonos_timeout_ms: env_parsed("SONOS_TIMEOUT_MS", 5000),
            zone_cache_ttl_seconds: env_parsed("ZONE_CACHE_TTL_SECONDS", 30),
            upnp_events_enabled: env_parsed("UPNP_EVENTS_ENABLED", true),
            upnp_subscription_timeout: env_parsed("UPNP_SUBSCRIPTION_TIMEOUT", 3600),
            upnp_state_cache_ttl_seconds: env_parsed("UPNP_STATE_CACHE_TTL_SECONDS", 30),
            allow_test_mode: env_parsed("ALLOW_TEST_MODE", false),
        }
    }

    /// The base config for a discovery pass. `remembered_hosts` is left
    /// empty here — `discovery_loop` fills it in per pass from
    /// `hub_store::Store::recent_hosts` (spec.md §4.1's "seen within the
    /// last 7 days"), since that list changes between passes and this
    /// config has no store handle of its own.
    pub fn discovery_config(&self) -> hub_discovery::DiscoveryConfig {
        hub_discovery::DiscoveryConfig {
            passes: self.ssdp_discovery_passes,
            pass_interval: Duration::from_millis(self.ssdp_pass_interval_ms),
            probe_timeout: Duration::from_millis(self.ssdp_discovery_timeout_ms),
            dial_timeout: Duration::from_millis(self.sonos_timeout_ms),
            static_hosts: self.static_device_ips.clone(),
            remembered_hosts: Vec::new(),
        }
    }

    pub fn sonos_timeout(&self) -> Duration {
        Duration::from_millis(self.sonos_timeout_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.ssdp_rescan_interval_ms)
    }
}
