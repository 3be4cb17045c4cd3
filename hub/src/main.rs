//! Household hub entry point: wires discovery, topology, the scene
//! engine, the scheduler, cloud token management, and event ingress
//! together behind a minimal health/metrics HTTP surface. Full JSON API
//! routing and JWT pairing/refresh are out of scope (spec.md §1); this
//! binary only owns `/v1/health` and `/metrics`.

mod adapters;
mod config;
mod discovery_loop;
mod health;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use adapters::{CloudGroupResolver, IngressGroupResolver, SubscriptionSidResolver, SyncTopologySource, TopologyHandle};
use config::Config;
use hub_api::PlayerActions;
use hub_cloud::{HttpTokenRefresher, OAuthStateStore, TokenManager, VendorEndpoint};
use hub_event_ingress::{IngressServer, SubscriptionRegistry};
use hub_scene_engine::Engine;
use hub_soap_client::SoapClient;
use hub_state_cache::StateCache;
use hub_store::Store;

const EVENT_INGRESS_PORT_RANGE: (u16, u16) = (3500, 3600);

/// Vendor OAuth endpoints, read from the environment by convention:
/// `{PROVIDER}_TOKEN_URL` / `{PROVIDER}_CLIENT_ID` / `{PROVIDER}_CLIENT_SECRET`.
/// Providers with no endpoint configured simply never refresh — `GetToken`
/// then surfaces whatever was last persisted, or an error if nothing was.
fn vendor_endpoints() -> Vec<VendorEndpoint> {
    ["sonos-cloud", "apple-music", "spotify"]
        .iter()
        .filter_map(|provider| {
            let prefix = provider.to_uppercase().replace('-', "_");
            let token_url = std::env::var(format!("{prefix}_TOKEN_URL")).ok()?;
            let client_id = std::env::var(format!("{prefix}_CLIENT_ID")).unwrap_or_default();
            let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default();
            Some(VendorEndpoint { provider: provider.to_string(), token_url, client_id, client_secret })
        })
        .collect()
}

#[tokio::main]
async fn main() {
    logging::init();
    let config = Config::from_env();

    let store = match Store::open(std::path::Path::new(&config.sqlite_db_path)) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(%err, "failed to open store");
            std::process::exit(1);
        }
    };

    let discovery_config = config.discovery_config();
    let initial_topology = discovery_loop::initial_scan(&store, &discovery_config).await;
    let topology = TopologyHandle::new(initial_topology);

    let soap_client = Arc::new(SoapClient::with_timeout(config.sonos_timeout()));
    let actions = Arc::new(PlayerActions::new(soap_client));
    let state_cache = Arc::new(StateCache::new(config.upnp_state_cache_ttl_seconds));

    let engine = Arc::new(Engine::new(
        actions.clone(),
        store.clone(),
        state_cache.clone(),
        Arc::new(SyncTopologySource::new(topology.clone())),
    ));

    let (expander_handle, runner_handle) = hub_scheduler::spawn(store.clone(), engine.clone());

    // `GetToken()`/`ResolveGroupToIP()` are the two contracts spec.md §4.7
    // says the rest of the system depends on; no caller in this binary's
    // in-scope surface (UPnP NOTIFY + cloud webhook ingress) invokes them
    // yet, so both are held ready rather than wired to a route.
    let _token_manager = Arc::new(TokenManager::new(store.clone(), Arc::new(HttpTokenRefresher::new(vendor_endpoints()))));
    let _cloud_group_resolver: Arc<CloudGroupResolver> = Arc::new(CloudGroupResolver::new(topology.clone()));
    let oauth_states = OAuthStateStore::new();
    let oauth_janitor_handle = tokio::spawn(hub_cloud::run_oauth_janitor(oauth_states.clone()));

    let registry = Arc::new(SubscriptionRegistry::start((*actions).clone(), Duration::from_secs(60)));
    let sid_resolver = Arc::new(SubscriptionSidResolver::new(topology.clone(), registry.clone()));
    let ingress_group_resolver = Arc::new(IngressGroupResolver::new(topology.clone()));

    let ingress = if config.upnp_events_enabled {
        match IngressServer::start(
            EVENT_INGRESS_PORT_RANGE,
            registry.clone(),
            sid_resolver,
            ingress_group_resolver,
            state_cache.clone(),
        )
        .await
        {
            Ok(server) => Some(server),
            Err(err) => {
                tracing::error!(%err, "failed to start event ingress server");
                None
            }
        }
    } else {
        None
    };

    let discovery_rescan_handle = {
        let topology = topology.clone();
        let store = store.clone();
        tokio::spawn(discovery_loop::run(topology, store, discovery_config, config.rescan_interval()))
    };

    let health_server =
        health::HealthServer::start(health::parse_host(&config.host), config.port, topology.clone()).await;

    shutdown_signal().await;
    tracing::info!("shutdown signal received, winding down");

    discovery_rescan_handle.abort();
    expander_handle.abort();
    runner_handle.abort();
    oauth_janitor_handle.abort();
    health_server.shutdown().await;
    if let Some(ingress) = ingress {
        ingress.shutdown().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
